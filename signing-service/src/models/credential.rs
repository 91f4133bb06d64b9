//! Stored second-factor material: per-user TOTP secret and backup codes.
//!
//! The engine does not generate time-stepped codes; it only verifies
//! submitted codes against the stored secret and the hashed backup-code set.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct SecondFactorCredential {
    pub credential_id: Uuid,
    pub email: String,
    /// Base64-encoded shared secret for the time-stepped code.
    pub totp_secret: String,
    pub created_utc: DateTime<Utc>,
}

/// Single-use backup code, stored as a hex-encoded SHA-256 hash.
#[derive(Debug, Clone, FromRow)]
pub struct BackupCode {
    pub code_id: Uuid,
    pub credential_id: Uuid,
    pub code_hash: String,
    pub used_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl BackupCode {
    pub fn is_used(&self) -> bool {
        self.used_utc.is_some()
    }
}
