//! Second-factor gate for signing actions.
//!
//! One abstraction covering the three ways an action clears the gate: an
//! active administrative exemption, a time-stepped code against the stored
//! secret, or a single-use backup code. The state machine only ever sees the
//! single [`GateOutcome`].

use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use sqlx::PgConnection;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use super::database::Database;
use super::error::WorkflowError;
use crate::models::{
    ExemptionAuditAction, ExemptionAuditEvent, ExemptionScope, SecondFactorExemption, Signer,
};
use service_core::error::AppError;

/// Outcome of the gate check for one action attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// The request does not require a second factor for this action.
    NotRequired,
    /// An active exemption of matching scope bypassed verification.
    Exempt,
    VerifiedTotp,
    VerifiedBackup,
    CodeMissing,
    CodeInvalid,
}

impl GateOutcome {
    /// Whether a code was actually verified (as opposed to bypassed).
    pub fn verified_by_code(&self) -> bool {
        matches!(self, Self::VerifiedTotp | Self::VerifiedBackup)
    }

    /// Reason recorded in the audit trail.
    pub fn audit_reason(&self) -> &'static str {
        match self {
            Self::NotRequired => "not_required",
            Self::Exempt => "exemption",
            Self::VerifiedTotp => "totp",
            Self::VerifiedBackup => "backup_code",
            Self::CodeMissing => "code_missing",
            Self::CodeInvalid => "code_invalid",
        }
    }
}

/// Result of a standalone `verify` call.
#[derive(Debug, Clone, Copy)]
pub struct VerifyOutcome {
    pub ok: bool,
    pub used_backup_code: bool,
}

/// Time-stepped code parameters: 30-second window, 6 digits, one step of
/// clock skew accepted either way.
pub mod totp {
    use super::*;

    pub const STEP_SECONDS: i64 = 30;
    pub const DIGITS: u32 = 6;
    pub const SKEW_STEPS: i64 = 1;

    type HmacSha256 = Hmac<Sha256>;

    /// Code for the time step containing `unix_time`, shifted by
    /// `step_offset` steps.
    pub fn code_at(secret: &[u8], unix_time: i64, step_offset: i64) -> String {
        let counter = (unix_time / STEP_SECONDS + step_offset) as u64;
        let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
        mac.update(&counter.to_be_bytes());
        let digest = mac.finalize().into_bytes();

        // Dynamic truncation (RFC 4226 section 5.3).
        let offset = (digest[digest.len() - 1] & 0x0f) as usize;
        let binary = ((digest[offset] as u32 & 0x7f) << 24)
            | ((digest[offset + 1] as u32) << 16)
            | ((digest[offset + 2] as u32) << 8)
            | (digest[offset + 3] as u32);
        let code = binary % 10u32.pow(DIGITS);
        format!("{code:0width$}", width = DIGITS as usize)
    }

    /// Verify a submitted code against the secret at `now`, allowing
    /// `SKEW_STEPS` of drift in either direction.
    pub fn verify(secret: &[u8], code: &str, now: DateTime<Utc>) -> bool {
        if code.len() != DIGITS as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        let unix_time = now.timestamp();
        let mut matched = false;
        for offset in -SKEW_STEPS..=SKEW_STEPS {
            let expected = code_at(secret, unix_time, offset);
            // Check every window so timing does not reveal which one hit.
            matched |= bool::from(expected.as_bytes().ct_eq(code.as_bytes()));
        }
        matched
    }
}

/// Hex-encoded SHA-256 of a normalized backup code.
pub fn hash_backup_code(code: &str) -> String {
    let normalized = code.trim().to_ascii_uppercase();
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

/// Generate a fresh 8-character backup code.
pub fn generate_backup_code() -> String {
    use rand::Rng;
    // Unambiguous uppercase alphabet (no O/0, I/1).
    const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let mut rng = rand::thread_rng();
    (0..8)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

#[derive(Clone)]
pub struct SecondFactorGate {
    db: Database,
}

impl SecondFactorGate {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Gate check for one signer action, executed inside the caller's
    /// transaction so backup-code consumption commits with the transition.
    pub async fn check(
        &self,
        conn: &mut PgConnection,
        signer: &Signer,
        organization_id: Uuid,
        code: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<GateOutcome, WorkflowError> {
        if let Some(user_id) = signer.user_id {
            if Database::has_active_exemption_on(
                conn,
                user_id,
                organization_id,
                ExemptionScope::Signing,
                now,
            )
            .await?
            {
                tracing::info!(
                    signer_id = %signer.signer_id,
                    user_id = %user_id,
                    "Second factor bypassed by active exemption"
                );
                return Ok(GateOutcome::Exempt);
            }
        }

        let Some(code) = code else {
            return Ok(GateOutcome::CodeMissing);
        };

        let Some(credential) = Database::find_credential_by_email_on(conn, &signer.email).await?
        else {
            return Ok(GateOutcome::CodeInvalid);
        };

        let secret = base64::engine::general_purpose::STANDARD
            .decode(&credential.totp_secret)
            .map_err(|e| WorkflowError::Persistence(anyhow::anyhow!("corrupt totp secret: {e}")))?;

        if totp::verify(&secret, code, now) {
            return Ok(GateOutcome::VerifiedTotp);
        }

        // Fall back to the single-use backup codes.
        let hash = hash_backup_code(code);
        let codes = Database::unused_backup_codes_on(conn, credential.credential_id).await?;
        for backup in codes {
            if bool::from(hash.as_bytes().ct_eq(backup.code_hash.as_bytes())) {
                let consumed =
                    Database::consume_backup_code_on(conn, backup.code_id, now).await?;
                if consumed {
                    return Ok(GateOutcome::VerifiedBackup);
                }
            }
        }

        Ok(GateOutcome::CodeInvalid)
    }

    /// Standalone verification against the stored secret and backup codes.
    pub async fn verify(
        &self,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifyOutcome, AppError> {
        let mut tx = self.db.pool().begin().await?;
        let Some(credential) = Database::find_credential_by_email_on(&mut tx, email).await?
        else {
            return Ok(VerifyOutcome {
                ok: false,
                used_backup_code: false,
            });
        };

        let secret = base64::engine::general_purpose::STANDARD
            .decode(&credential.totp_secret)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("corrupt totp secret: {e}")))?;

        if totp::verify(&secret, code, now) {
            tx.commit().await?;
            return Ok(VerifyOutcome {
                ok: true,
                used_backup_code: false,
            });
        }

        let hash = hash_backup_code(code);
        let codes = Database::unused_backup_codes_on(&mut tx, credential.credential_id).await?;
        for backup in codes {
            if bool::from(hash.as_bytes().ct_eq(backup.code_hash.as_bytes()))
                && Database::consume_backup_code_on(&mut tx, backup.code_id, now).await?
            {
                tx.commit().await?;
                return Ok(VerifyOutcome {
                    ok: true,
                    used_backup_code: true,
                });
            }
        }

        tx.rollback().await?;
        Ok(VerifyOutcome {
            ok: false,
            used_backup_code: false,
        })
    }

    /// Whether `user_id` holds an active exemption covering `scope`.
    pub async fn has_active_exemption(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        scope: ExemptionScope,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut conn = self.db.pool().acquire().await?;
        Ok(
            Database::has_active_exemption_on(&mut conn, user_id, organization_id, scope, now)
                .await?,
        )
    }

    /// Grant an exemption. The audit row is written in the same transaction
    /// as the exemption itself; there is no path that skips it.
    #[allow(clippy::too_many_arguments)]
    pub async fn grant_exemption(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        scope: ExemptionScope,
        expires_utc: DateTime<Utc>,
        granted_by: Uuid,
        reason: &str,
    ) -> Result<SecondFactorExemption, AppError> {
        let exemption = SecondFactorExemption {
            exemption_id: Uuid::new_v4(),
            user_id,
            organization_id,
            exemption_type: scope.as_str().to_string(),
            expires_utc,
            granted_by,
            grant_reason: reason.to_string(),
            revoked_utc: None,
            created_utc: Utc::now(),
        };

        let mut tx = self.db.pool().begin().await?;
        Database::insert_exemption_on(&mut tx, &exemption).await?;
        Database::insert_exemption_audit_on(
            &mut tx,
            &ExemptionAuditEvent::new(
                exemption.exemption_id,
                ExemptionAuditAction::Granted,
                granted_by,
                reason,
            ),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            exemption_id = %exemption.exemption_id,
            user_id = %user_id,
            scope = scope.as_str(),
            "Second-factor exemption granted"
        );
        Ok(exemption)
    }

    /// Revoke an exemption before its expiry, with the mandatory audit row.
    pub async fn revoke_exemption(
        &self,
        exemption_id: Uuid,
        revoked_by: Uuid,
        reason: &str,
    ) -> Result<(), AppError> {
        let mut tx = self.db.pool().begin().await?;
        let revoked = Database::revoke_exemption_on(&mut tx, exemption_id, Utc::now()).await?;
        if !revoked {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Exemption not found or already revoked"
            )));
        }
        Database::insert_exemption_audit_on(
            &mut tx,
            &ExemptionAuditEvent::new(exemption_id, ExemptionAuditAction::Revoked, revoked_by, reason),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(exemption_id = %exemption_id, "Second-factor exemption revoked");
        Ok(())
    }
}
