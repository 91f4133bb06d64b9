//! Second-factor exemption administration.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{ExemptionResponse, GrantExemptionDto, RevokeExemptionDto};
use crate::startup::AppState;
use service_core::error::AppError;

pub async fn grant_exemption(
    State(state): State<AppState>,
    Json(dto): Json<GrantExemptionDto>,
) -> Result<(StatusCode, Json<ExemptionResponse>), AppError> {
    dto.validate()?;

    if dto.expires_utc <= chrono::Utc::now() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Exemption expiry must be in the future"
        )));
    }

    let exemption = state
        .gate
        .grant_exemption(
            dto.user_id,
            dto.organization_id,
            dto.scope,
            dto.expires_utc,
            dto.granted_by,
            &dto.reason,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ExemptionResponse::from(&exemption))))
}

pub async fn revoke_exemption(
    State(state): State<AppState>,
    Path(exemption_id): Path<Uuid>,
    Json(dto): Json<RevokeExemptionDto>,
) -> Result<StatusCode, AppError> {
    dto.validate()?;
    state
        .gate
        .revoke_exemption(exemption_id, dto.revoked_by, &dto.reason)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
