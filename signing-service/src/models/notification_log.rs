//! Append-only notification log: one row per dispatch attempt.
//!
//! Doubles as the audit trail and the idempotency source for retries: a
//! `sent` or `delivered` row for (request, recipient, type, trigger) blocks
//! re-dispatch of the same logical event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// The relay accepted the message; delivery is not yet confirmed.
    Sent,
    Delivered,
    Failed,
    Bounced,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Bounced => "bounced",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    SignerInvitation,
    SigningReminder,
    ExpiryWarning,
    RequestCompleted,
    RequestDeclined,
    RequestExpired,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignerInvitation => "signer_invitation",
            Self::SigningReminder => "signing_reminder",
            Self::ExpiryWarning => "expiry_warning",
            Self::RequestCompleted => "request_completed",
            Self::RequestDeclined => "request_declined",
            Self::RequestExpired => "request_expired",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct NotificationLog {
    pub notification_id: Uuid,
    pub request_id: Uuid,
    pub recipient: String,
    pub notification_type: String,
    /// Distinguishes semantically different firings of the same type, e.g.
    /// reminders for different reminder windows.
    pub trigger_fingerprint: String,
    pub status: String,
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub created_utc: DateTime<Utc>,
}
