//! Manual trigger for the reconciliation sweeps.

use axum::extract::State;
use axum::Json;
use chrono::Utc;

use crate::services::SweepReport;
use crate::startup::AppState;

/// Run all three sweeps now and report what happened. Safe to call at any
/// time; repeats are absorbed by the reminder stamp and the notification
/// log.
pub async fn run_sweep(State(state): State<AppState>) -> Json<SweepReport> {
    Json(state.scheduler.run_sweep(Utc::now()).await)
}
