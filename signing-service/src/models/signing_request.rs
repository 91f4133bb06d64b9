//! Signing request entity and its status/mode codes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle states of a signing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Draft,
    Pending,
    InProgress,
    Completed,
    Declined,
    Expired,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Declined => "declined",
            Self::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "draft" => Self::Draft,
            "pending" => Self::Pending,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            "declined" => Self::Declined,
            "expired" => Self::Expired,
            _ => Self::Draft,
        }
    }

    /// Terminal statuses admit no further transitions, for the request or
    /// any of its signers.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Declined | Self::Expired)
    }
}

/// Whether signers act in a fixed order or independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningMode {
    Sequential,
    Parallel,
}

impl SigningMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "parallel" => Self::Parallel,
            _ => Self::Sequential,
        }
    }
}

/// Signing request row. Owns its signers (cascade-deleted together).
#[derive(Debug, Clone, FromRow)]
pub struct SigningRequest {
    pub request_id: Uuid,
    pub organization_id: Uuid,
    pub owner_email: String,
    pub title: String,
    pub status: String,
    pub signing_mode: String,
    pub requires_second_factor: bool,
    pub expires_utc: Option<DateTime<Utc>>,
    pub last_reminder_sent_utc: Option<DateTime<Utc>>,
    pub completed_utc: Option<DateTime<Utc>>,
    pub declined_utc: Option<DateTime<Utc>>,
    pub decline_reason: Option<String>,
    pub declined_by: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl SigningRequest {
    pub fn status(&self) -> RequestStatus {
        RequestStatus::from_str(&self.status)
    }

    pub fn signing_mode(&self) -> SigningMode {
        SigningMode::from_str(&self.signing_mode)
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Expiry is always judged against a caller-supplied clock.
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.expires_utc.is_some_and(|e| e <= now)
    }
}
