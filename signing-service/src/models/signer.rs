//! Signer entity - one participant of a signing request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerStatus {
    Pending,
    Viewed,
    Signed,
    Declined,
}

impl SignerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Viewed => "viewed",
            Self::Signed => "signed",
            Self::Declined => "declined",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "viewed" => Self::Viewed,
            "signed" => Self::Signed,
            "declined" => Self::Declined,
            _ => Self::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Signed | Self::Declined)
    }
}

/// Signer row. `signing_order` is unique per request and only meaningful in
/// sequential mode.
#[derive(Debug, Clone, FromRow)]
pub struct Signer {
    pub signer_id: Uuid,
    pub request_id: Uuid,
    pub email: String,
    /// Set when the signer corresponds to a platform user; exemptions are
    /// keyed on this.
    pub user_id: Option<Uuid>,
    pub signing_order: i32,
    pub status: String,
    pub viewed_utc: Option<DateTime<Utc>>,
    pub signed_utc: Option<DateTime<Utc>>,
    pub declined_utc: Option<DateTime<Utc>>,
    pub decline_reason: Option<String>,
    pub second_factor_verified_utc: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Signer {
    pub fn status(&self) -> SignerStatus {
        SignerStatus::from_str(&self.status)
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_signer_statuses() {
        assert!(SignerStatus::Signed.is_terminal());
        assert!(SignerStatus::Declined.is_terminal());
        assert!(!SignerStatus::Pending.is_terminal());
        assert!(!SignerStatus::Viewed.is_terminal());
    }
}
