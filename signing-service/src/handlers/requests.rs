//! Signing request lifecycle endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{CreateSigningRequestDto, NotificationLogResponse, SigningRequestResponse};
use crate::models::{RequestStatus, Signer, SignerStatus, SigningRequest};
use crate::startup::AppState;
use service_core::error::AppError;

/// Create a request with its signer roster. Signing order follows the roster
/// order. By default the request is sent immediately; `send_immediately:
/// false` leaves it as a draft.
pub async fn create_request(
    State(state): State<AppState>,
    Json(dto): Json<CreateSigningRequestDto>,
) -> Result<(StatusCode, Json<SigningRequestResponse>), AppError> {
    dto.validate()?;

    if let Some(expires_utc) = dto.expires_utc {
        if expires_utc <= Utc::now() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Expiry must be in the future"
            )));
        }
    }

    let mut emails: Vec<String> = dto
        .signers
        .iter()
        .map(|s| s.email.to_ascii_lowercase())
        .collect();
    emails.sort();
    emails.dedup();
    if emails.len() != dto.signers.len() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Duplicate signer emails"
        )));
    }

    let now = Utc::now();
    let request_id = Uuid::new_v4();
    let request = SigningRequest {
        request_id,
        organization_id: dto.organization_id,
        owner_email: dto.owner_email.clone(),
        title: dto.title.clone(),
        status: RequestStatus::Draft.as_str().to_string(),
        signing_mode: dto.signing_mode.as_str().to_string(),
        requires_second_factor: dto.requires_second_factor,
        expires_utc: dto.expires_utc,
        last_reminder_sent_utc: None,
        completed_utc: None,
        declined_utc: None,
        decline_reason: None,
        declined_by: None,
        created_utc: now,
        updated_utc: now,
    };
    let signers: Vec<Signer> = dto
        .signers
        .iter()
        .enumerate()
        .map(|(i, input)| Signer {
            signer_id: Uuid::new_v4(),
            request_id,
            email: input.email.clone(),
            user_id: input.user_id,
            signing_order: i as i32 + 1,
            status: SignerStatus::Pending.as_str().to_string(),
            viewed_utc: None,
            signed_utc: None,
            declined_utc: None,
            decline_reason: None,
            second_factor_verified_utc: None,
            ip_address: None,
            user_agent: None,
            created_utc: now,
            updated_utc: now,
        })
        .collect();

    state.db.create_request(&request, &signers).await?;
    tracing::info!(
        request_id = %request_id,
        signers = signers.len(),
        signing_mode = %request.signing_mode,
        "Signing request created"
    );

    let request = if dto.send_immediately {
        state.workflow.send_request(request_id, Utc::now()).await?
    } else {
        request
    };
    let signers = state.db.signers_for_request(request_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(SigningRequestResponse::from_parts(&request, &signers)),
    ))
}

/// Send a draft out to its signers.
pub async fn send_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<SigningRequestResponse>, AppError> {
    let request = state.workflow.send_request(request_id, Utc::now()).await?;
    let signers = state.db.signers_for_request(request_id).await?;
    Ok(Json(SigningRequestResponse::from_parts(&request, &signers)))
}

pub async fn get_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<SigningRequestResponse>, AppError> {
    let request = state
        .db
        .find_request(request_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Signing request not found")))?;
    let signers = state.db.signers_for_request(request_id).await?;
    Ok(Json(SigningRequestResponse::from_parts(&request, &signers)))
}

/// Delivery audit trail for a request.
pub async fn list_notifications(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<Vec<NotificationLogResponse>>, AppError> {
    state
        .db
        .find_request(request_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Signing request not found")))?;
    let logs = state.db.notifications_for_request(request_id).await?;
    Ok(Json(logs.iter().map(NotificationLogResponse::from).collect()))
}
