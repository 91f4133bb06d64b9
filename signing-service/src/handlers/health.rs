//! Liveness, readiness and metrics endpoints.

use axum::extract::State;
use axum::http::StatusCode;

use crate::services::metrics;
use crate::startup::AppState;
use service_core::error::AppError;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Ready only when the database answers.
pub async fn ready(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state
        .db
        .health_check()
        .await
        .map_err(|_| AppError::ServiceUnavailable)?;
    Ok(StatusCode::OK)
}

pub async fn metrics() -> String {
    metrics::get_metrics()
}
