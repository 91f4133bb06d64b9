//! Signer action endpoint: view, sign, decline.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{SubmitActionDto, TransitionResponse};
use crate::services::transition::TransitionContext;
use crate::startup::AppState;
use service_core::error::AppError;

/// Submit one action for one signer. The response carries the authoritative
/// post-transition state, including any cascaded signers.
pub async fn submit_action(
    State(state): State<AppState>,
    Path((request_id, signer_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    Json(dto): Json<SubmitActionDto>,
) -> Result<Json<TransitionResponse>, AppError> {
    dto.validate()?;

    let ctx = TransitionContext {
        now: Utc::now(),
        code: dto.code,
        reason: dto.reason,
        ip_address: client_ip(&headers),
        user_agent: header_string(&headers, "user-agent"),
    };

    let result = state
        .workflow
        .attempt_transition(request_id, signer_id, dto.action, &ctx)
        .await?;
    Ok(Json(result.into()))
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    header_string(headers, "x-forwarded-for")
        .map(|v| v.split(',').next().unwrap_or("").trim().to_string())
        .filter(|v| !v.is_empty())
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}
