//! Audit trail for exemption grants and revocations.
//!
//! Every grant/revoke writes one of these rows in the same transaction as
//! the exemption change itself; the write is not skippable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExemptionAuditAction {
    Granted,
    Revoked,
}

impl ExemptionAuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Revoked => "revoked",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ExemptionAuditEvent {
    pub audit_id: Uuid,
    pub exemption_id: Uuid,
    pub action: String,
    pub actor_id: Uuid,
    pub reason: String,
    pub created_utc: DateTime<Utc>,
}

impl ExemptionAuditEvent {
    pub fn new(
        exemption_id: Uuid,
        action: ExemptionAuditAction,
        actor_id: Uuid,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            audit_id: Uuid::new_v4(),
            exemption_id,
            action: action.as_str().to_string(),
            actor_id,
            reason: reason.into(),
            created_utc: Utc::now(),
        }
    }
}
