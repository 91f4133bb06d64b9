//! PostgreSQL database service for signing-service.
//!
//! Pool-level methods serve handlers and sweeps; the `*_on` associated
//! functions run against a caller-owned connection so the workflow can lock,
//! check, and write as one atomic unit.

use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::PgConnection;
use uuid::Uuid;

use super::cascade::CascadePlan;
use super::error::WorkflowError;
use super::metrics;
use super::transition::{RequestUpdate, SignerUpdate};
use crate::models::{
    BackupCode, ExemptionAuditEvent, ExemptionScope, NotificationLog, RequestStatus,
    SecondFactorCredential, SecondFactorExemption, Signer, SigningRequest,
};
use service_core::error::AppError;

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(
        url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .connect(url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {e}")))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Health check - ping the database.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!("Database health check failed: {e}"))
            })?;
        Ok(())
    }

    // ==================== Request / Signer Operations ====================

    /// Insert a request together with its signers, atomically.
    pub async fn create_request(
        &self,
        request: &SigningRequest,
        signers: &[Signer],
    ) -> Result<(), AppError> {
        let timer = metrics::DB_QUERY_DURATION
            .with_label_values(&["create_request"])
            .start_timer();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO signing_requests
                (request_id, organization_id, owner_email, title, status, signing_mode,
                 requires_second_factor, expires_utc, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            "#,
        )
        .bind(request.request_id)
        .bind(request.organization_id)
        .bind(&request.owner_email)
        .bind(&request.title)
        .bind(&request.status)
        .bind(&request.signing_mode)
        .bind(request.requires_second_factor)
        .bind(request.expires_utc)
        .bind(request.created_utc)
        .execute(&mut *tx)
        .await?;

        for signer in signers {
            sqlx::query(
                r#"
                INSERT INTO signers
                    (signer_id, request_id, email, user_id, signing_order, status,
                     created_utc, updated_utc)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
                "#,
            )
            .bind(signer.signer_id)
            .bind(signer.request_id)
            .bind(&signer.email)
            .bind(signer.user_id)
            .bind(signer.signing_order)
            .bind(&signer.status)
            .bind(signer.created_utc)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        timer.observe_duration();
        Ok(())
    }

    pub async fn find_request(&self, request_id: Uuid) -> Result<Option<SigningRequest>, AppError> {
        sqlx::query_as::<_, SigningRequest>(
            "SELECT * FROM signing_requests WHERE request_id = $1",
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    pub async fn signers_for_request(&self, request_id: Uuid) -> Result<Vec<Signer>, AppError> {
        sqlx::query_as::<_, Signer>(
            "SELECT * FROM signers WHERE request_id = $1 ORDER BY signing_order",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    /// Move a draft to `pending`. Returns false when the request was not a
    /// draft (already sent, or terminal).
    pub async fn mark_request_sent(
        &self,
        request_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE signing_requests
            SET status = $1, updated_utc = $2
            WHERE request_id = $3 AND status = $4
            "#,
        )
        .bind(RequestStatus::Pending.as_str())
        .bind(now)
        .bind(request_id)
        .bind(RequestStatus::Draft.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    // ==================== Locked Transition Unit ====================

    /// Lock the request row for the duration of the caller's transaction.
    pub async fn lock_request_on(
        conn: &mut PgConnection,
        request_id: Uuid,
    ) -> Result<Option<SigningRequest>, WorkflowError> {
        let request = sqlx::query_as::<_, SigningRequest>(
            "SELECT * FROM signing_requests WHERE request_id = $1 FOR UPDATE",
        )
        .bind(request_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(request)
    }

    pub async fn signers_for_update_on(
        conn: &mut PgConnection,
        request_id: Uuid,
    ) -> Result<Vec<Signer>, WorkflowError> {
        let signers = sqlx::query_as::<_, Signer>(
            "SELECT * FROM signers WHERE request_id = $1 ORDER BY signing_order FOR UPDATE",
        )
        .bind(request_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(signers)
    }

    pub async fn apply_signer_update_on(
        conn: &mut PgConnection,
        update: &SignerUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        sqlx::query(
            r#"
            UPDATE signers
            SET status = $1,
                viewed_utc = COALESCE($2, viewed_utc),
                signed_utc = COALESCE($3, signed_utc),
                declined_utc = COALESCE($4, declined_utc),
                decline_reason = COALESCE($5, decline_reason),
                second_factor_verified_utc = COALESCE($6, second_factor_verified_utc),
                ip_address = COALESCE($7, ip_address),
                user_agent = COALESCE($8, user_agent),
                updated_utc = $9
            WHERE signer_id = $10
            "#,
        )
        .bind(update.status.as_str())
        .bind(update.viewed_utc)
        .bind(update.signed_utc)
        .bind(update.declined_utc)
        .bind(&update.decline_reason)
        .bind(update.second_factor_verified_utc)
        .bind(&update.ip_address)
        .bind(&update.user_agent)
        .bind(now)
        .bind(update.signer_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn apply_request_update_on(
        conn: &mut PgConnection,
        request_id: Uuid,
        update: &RequestUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        sqlx::query(
            r#"
            UPDATE signing_requests
            SET status = $1,
                completed_utc = COALESCE($2, completed_utc),
                declined_utc = COALESCE($3, declined_utc),
                declined_by = COALESCE($4, declined_by),
                decline_reason = COALESCE($5, decline_reason),
                updated_utc = $6
            WHERE request_id = $7
            "#,
        )
        .bind(update.status.as_str())
        .bind(update.completed_utc)
        .bind(update.declined_utc)
        .bind(update.declined_by)
        .bind(&update.decline_reason)
        .bind(now)
        .bind(request_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Apply every forced signer transition of a cascade in the caller's
    /// transaction.
    pub async fn apply_cascade_on(
        conn: &mut PgConnection,
        plan: &CascadePlan,
    ) -> Result<(), WorkflowError> {
        for forced in &plan.forced {
            sqlx::query(
                r#"
                UPDATE signers
                SET status = $1, declined_utc = $2, decline_reason = $3, updated_utc = $2
                WHERE signer_id = $4 AND status NOT IN ('signed', 'declined')
                "#,
            )
            .bind(forced.status.as_str())
            .bind(forced.declined_utc)
            .bind(&forced.reason)
            .bind(forced.signer_id)
            .execute(&mut *conn)
            .await?;
        }
        metrics::CASCADES
            .with_label_values(&[plan.kind.as_str()])
            .inc_by(plan.forced.len() as f64);
        Ok(())
    }

    // ==================== Sweep Queries ====================

    /// Requests due a reminder: live, created before the interval cutoff,
    /// and not reminded within the interval.
    pub async fn requests_needing_reminder(
        &self,
        now: DateTime<Utc>,
        interval: Duration,
    ) -> Result<Vec<SigningRequest>, AppError> {
        let cutoff = now - interval;
        sqlx::query_as::<_, SigningRequest>(
            r#"
            SELECT * FROM signing_requests
            WHERE status IN ('pending', 'in_progress')
              AND created_utc < $1
              AND (last_reminder_sent_utc IS NULL OR last_reminder_sent_utc < $1)
              AND (expires_utc IS NULL OR expires_utc > $2)
            ORDER BY created_utc
            "#,
        )
        .bind(cutoff)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    /// Guarded reminder stamp: returns false when another sweep got there
    /// first.
    pub async fn touch_reminder_stamp(
        &self,
        request_id: Uuid,
        now: DateTime<Utc>,
        interval: Duration,
    ) -> Result<bool, AppError> {
        let cutoff = now - interval;
        let result = sqlx::query(
            r#"
            UPDATE signing_requests
            SET last_reminder_sent_utc = $1, updated_utc = $1
            WHERE request_id = $2
              AND (last_reminder_sent_utc IS NULL OR last_reminder_sent_utc < $3)
            "#,
        )
        .bind(now)
        .bind(request_id)
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Live requests expiring within the lookahead window.
    pub async fn requests_expiring_within(
        &self,
        now: DateTime<Utc>,
        lookahead: Duration,
    ) -> Result<Vec<SigningRequest>, AppError> {
        sqlx::query_as::<_, SigningRequest>(
            r#"
            SELECT * FROM signing_requests
            WHERE status IN ('pending', 'in_progress')
              AND expires_utc IS NOT NULL
              AND expires_utc > $1
              AND expires_utc <= $2
            ORDER BY expires_utc
            "#,
        )
        .bind(now)
        .bind(now + lookahead)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    /// Non-terminal requests whose expiry has passed.
    pub async fn expired_requests(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<SigningRequest>, AppError> {
        sqlx::query_as::<_, SigningRequest>(
            r#"
            SELECT * FROM signing_requests
            WHERE status IN ('draft', 'pending', 'in_progress')
              AND expires_utc IS NOT NULL
              AND expires_utc <= $1
            ORDER BY expires_utc
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    // ==================== Second-Factor Material ====================

    pub async fn find_credential_by_email_on(
        conn: &mut PgConnection,
        email: &str,
    ) -> Result<Option<SecondFactorCredential>, WorkflowError> {
        let credential = sqlx::query_as::<_, SecondFactorCredential>(
            "SELECT * FROM second_factor_credentials WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(credential)
    }

    pub async fn insert_credential(
        &self,
        credential: &SecondFactorCredential,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO second_factor_credentials (credential_id, email, totp_secret, created_utc)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(credential.credential_id)
        .bind(&credential.email)
        .bind(&credential.totp_secret)
        .bind(credential.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_backup_code(&self, code: &BackupCode) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO backup_codes (code_id, credential_id, code_hash, created_utc)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(code.code_id)
        .bind(code.credential_id)
        .bind(&code.code_hash)
        .bind(code.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn unused_backup_codes_on(
        conn: &mut PgConnection,
        credential_id: Uuid,
    ) -> Result<Vec<BackupCode>, WorkflowError> {
        let codes = sqlx::query_as::<_, BackupCode>(
            "SELECT * FROM backup_codes WHERE credential_id = $1 AND used_utc IS NULL",
        )
        .bind(credential_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(codes)
    }

    /// Consume a backup code. Returns false when it was already used (two
    /// racing verifications cannot both succeed).
    pub async fn consume_backup_code_on(
        conn: &mut PgConnection,
        code_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, WorkflowError> {
        let result = sqlx::query(
            "UPDATE backup_codes SET used_utc = $1 WHERE code_id = $2 AND used_utc IS NULL",
        )
        .bind(now)
        .bind(code_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    // ==================== Exemptions ====================

    pub async fn has_active_exemption_on(
        conn: &mut PgConnection,
        user_id: Uuid,
        organization_id: Uuid,
        scope: ExemptionScope,
        now: DateTime<Utc>,
    ) -> Result<bool, WorkflowError> {
        let exemption = sqlx::query_as::<_, SecondFactorExemption>(
            r#"
            SELECT * FROM second_factor_exemptions
            WHERE user_id = $1 AND organization_id = $2
              AND revoked_utc IS NULL AND expires_utc > $3
            "#,
        )
        .bind(user_id)
        .bind(organization_id)
        .bind(now)
        .fetch_all(&mut *conn)
        .await?;
        Ok(exemption.iter().any(|e| e.scope().covers(scope)))
    }

    pub async fn insert_exemption_on(
        conn: &mut PgConnection,
        exemption: &SecondFactorExemption,
    ) -> Result<(), WorkflowError> {
        sqlx::query(
            r#"
            INSERT INTO second_factor_exemptions
                (exemption_id, user_id, organization_id, exemption_type, expires_utc,
                 granted_by, grant_reason, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(exemption.exemption_id)
        .bind(exemption.user_id)
        .bind(exemption.organization_id)
        .bind(&exemption.exemption_type)
        .bind(exemption.expires_utc)
        .bind(exemption.granted_by)
        .bind(&exemption.grant_reason)
        .bind(exemption.created_utc)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn revoke_exemption_on(
        conn: &mut PgConnection,
        exemption_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, WorkflowError> {
        let result = sqlx::query(
            r#"
            UPDATE second_factor_exemptions
            SET revoked_utc = $1
            WHERE exemption_id = $2 AND revoked_utc IS NULL
            "#,
        )
        .bind(now)
        .bind(exemption_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn insert_exemption_audit_on(
        conn: &mut PgConnection,
        event: &ExemptionAuditEvent,
    ) -> Result<(), WorkflowError> {
        sqlx::query(
            r#"
            INSERT INTO exemption_audit_events
                (audit_id, exemption_id, action, actor_id, reason, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.audit_id)
        .bind(event.exemption_id)
        .bind(&event.action)
        .bind(event.actor_id)
        .bind(&event.reason)
        .bind(event.created_utc)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    // ==================== Notification Log ====================

    /// True when this logical event already reached the recipient: a `sent`
    /// row (relay accepted) counts the same as a confirmed `delivered` one.
    pub async fn notification_already_delivered(
        &self,
        request_id: Uuid,
        recipient: &str,
        notification_type: &str,
        trigger_fingerprint: &str,
    ) -> Result<bool, AppError> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT notification_id FROM notification_log
            WHERE request_id = $1 AND recipient = $2
              AND notification_type = $3 AND trigger_fingerprint = $4
              AND status IN ('sent', 'delivered')
            LIMIT 1
            "#,
        )
        .bind(request_id)
        .bind(recipient)
        .bind(notification_type)
        .bind(trigger_fingerprint)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    /// Append one dispatch-attempt row. The log is never updated in place.
    pub async fn insert_notification_attempt(
        &self,
        log: &NotificationLog,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO notification_log
                (notification_id, request_id, recipient, notification_type,
                 trigger_fingerprint, status, retry_count, error_message, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(log.notification_id)
        .bind(log.request_id)
        .bind(&log.recipient)
        .bind(&log.notification_type)
        .bind(&log.trigger_fingerprint)
        .bind(&log.status)
        .bind(log.retry_count)
        .bind(&log.error_message)
        .bind(log.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn notifications_for_request(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<NotificationLog>, AppError> {
        sqlx::query_as::<_, NotificationLog>(
            "SELECT * FROM notification_log WHERE request_id = $1 ORDER BY created_utc",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }
}
