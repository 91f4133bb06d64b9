//! Reconciliation sweeps.
//!
//! Three periodic passes keep the workflow converged with wall-clock time:
//! reminders for stalled requests, warnings ahead of an expiry deadline, and
//! forced expiry of requests whose deadline has passed. Each sweep processes
//! requests independently; one bad row is recorded and skipped, never fatal
//! to the run. Sweeps are safe to re-run: the reminder stamp and the
//! notification log absorb repeats.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::cascade::{self, CascadeKind};
use super::database::Database;
use super::dispatcher::{NotificationDispatcher, WorkflowEvent};
use super::metrics;
use super::transition::RequestUpdate;
use crate::config::WorkflowConfig;
use crate::models::{RequestStatus, Signer, SignerStatus, SigningRequest};

#[derive(Debug, Clone, Serialize)]
pub struct SweepError {
    pub request_id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepStats {
    pub processed: u64,
    pub actioned: u64,
    pub errors: Vec<SweepError>,
}

/// Outcome of one full reconciliation pass.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub started_utc: DateTime<Utc>,
    pub reminders: SweepStats,
    pub expiry_warnings: SweepStats,
    pub forced_expiries: SweepStats,
}

#[derive(Clone)]
pub struct ReconciliationScheduler {
    db: Database,
    dispatcher: NotificationDispatcher,
    config: WorkflowConfig,
}

impl ReconciliationScheduler {
    pub fn new(db: Database, dispatcher: NotificationDispatcher, config: WorkflowConfig) -> Self {
        Self {
            db,
            dispatcher,
            config,
        }
    }

    /// Run all three sweeps once against the given clock reading.
    #[tracing::instrument(skip(self))]
    pub async fn run_sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let report = SweepReport {
            started_utc: now,
            reminders: self.reminder_sweep(now).await,
            expiry_warnings: self.expiry_warning_sweep(now).await,
            forced_expiries: self.forced_expiry_sweep(now).await,
        };
        tracing::info!(
            reminders = report.reminders.actioned,
            expiry_warnings = report.expiry_warnings.actioned,
            forced_expiries = report.forced_expiries.actioned,
            errors = report.reminders.errors.len()
                + report.expiry_warnings.errors.len()
                + report.forced_expiries.errors.len(),
            "Reconciliation sweep finished"
        );
        report
    }

    /// Periodic loop driven by the configured interval until shutdown.
    pub async fn run_loop(self, shutdown: CancellationToken) {
        let period = std::time::Duration::from_secs(self.config.sweep_interval_seconds);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tracing::info!(interval_seconds = self.config.sweep_interval_seconds, "Scheduler started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Scheduler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_sweep(Utc::now()).await;
                }
            }
        }
    }

    /// Remind every signer still able to act on a stalled live request.
    async fn reminder_sweep(&self, now: DateTime<Utc>) -> SweepStats {
        let mut stats = SweepStats::default();
        let interval = Duration::hours(self.config.reminder_interval_hours);
        let requests = match self.db.requests_needing_reminder(now, interval).await {
            Ok(requests) => requests,
            Err(e) => {
                record_sweep_error(&mut stats, "reminder", Uuid::nil(), &e.to_string());
                return stats;
            }
        };

        for request in requests {
            stats.processed += 1;
            match self.remind_request(&request, now, interval).await {
                Ok(true) => {
                    stats.actioned += 1;
                    metrics::SWEEP_RUNS
                        .with_label_values(&["reminder", "sent"])
                        .inc();
                }
                Ok(false) => {
                    metrics::SWEEP_RUNS
                        .with_label_values(&["reminder", "skipped"])
                        .inc();
                }
                Err(e) => record_sweep_error(&mut stats, "reminder", request.request_id, &e),
            }
        }
        stats
    }

    async fn remind_request(
        &self,
        request: &SigningRequest,
        now: DateTime<Utc>,
        interval: Duration,
    ) -> Result<bool, String> {
        let signers = self
            .db
            .signers_for_request(request.request_id)
            .await
            .map_err(|e| e.to_string())?;
        let recipients = actionable_signer_emails(&signers);
        if recipients.is_empty() {
            return Ok(false);
        }

        // The stamp is the concurrency guard: a racing sweep loses here and
        // sends nothing.
        let stamped = self
            .db
            .touch_reminder_stamp(request.request_id, now, interval)
            .await
            .map_err(|e| e.to_string())?;
        if !stamped {
            return Ok(false);
        }

        self.dispatcher.dispatch(WorkflowEvent::ReminderDue {
            request_id: request.request_id,
            title: request.title.clone(),
            recipients,
            window_label: now.format("%Y-%m-%d").to_string(),
        });
        Ok(true)
    }

    /// Warn owner and pending signers about an approaching deadline. Pure
    /// side effect; never mutates request state.
    async fn expiry_warning_sweep(&self, now: DateTime<Utc>) -> SweepStats {
        let mut stats = SweepStats::default();
        let lookahead = Duration::hours(self.config.expiry_warning_hours);
        let requests = match self.db.requests_expiring_within(now, lookahead).await {
            Ok(requests) => requests,
            Err(e) => {
                record_sweep_error(&mut stats, "expiry_warning", Uuid::nil(), &e.to_string());
                return stats;
            }
        };

        for request in requests {
            stats.processed += 1;
            let Some(expires_utc) = request.expires_utc else {
                continue;
            };
            match self.db.signers_for_request(request.request_id).await {
                Ok(signers) => {
                    self.dispatcher.dispatch(WorkflowEvent::ExpiryWarning {
                        request_id: request.request_id,
                        title: request.title.clone(),
                        owner_email: request.owner_email.clone(),
                        recipients: actionable_signer_emails(&signers),
                        expires_utc,
                    });
                    stats.actioned += 1;
                    metrics::SWEEP_RUNS
                        .with_label_values(&["expiry_warning", "sent"])
                        .inc();
                }
                Err(e) => {
                    record_sweep_error(&mut stats, "expiry_warning", request.request_id, &e.to_string())
                }
            }
        }
        stats
    }

    /// Force past-deadline requests into `expired`, cascading their
    /// non-terminal signers.
    async fn forced_expiry_sweep(&self, now: DateTime<Utc>) -> SweepStats {
        let mut stats = SweepStats::default();
        let requests = match self.db.expired_requests(now).await {
            Ok(requests) => requests,
            Err(e) => {
                record_sweep_error(&mut stats, "forced_expiry", Uuid::nil(), &e.to_string());
                return stats;
            }
        };

        for request in requests {
            stats.processed += 1;
            match self.expire_request(request.request_id, now).await {
                Ok(Some(event)) => {
                    self.dispatcher.dispatch(event);
                    stats.actioned += 1;
                    metrics::SWEEP_RUNS
                        .with_label_values(&["forced_expiry", "expired"])
                        .inc();
                }
                // A concurrent actor completed or declined it first.
                Ok(None) => {
                    metrics::SWEEP_RUNS
                        .with_label_values(&["forced_expiry", "skipped"])
                        .inc();
                }
                Err(e) => record_sweep_error(&mut stats, "forced_expiry", request.request_id, &e),
            }
        }
        stats
    }

    /// Expire one request in its own transaction, re-checking state under
    /// the row lock.
    async fn expire_request(
        &self,
        request_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<WorkflowEvent>, String> {
        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| e.to_string())?;

        let Some(request) = Database::lock_request_on(&mut tx, request_id)
            .await
            .map_err(|e| e.to_string())?
        else {
            return Ok(None);
        };
        if request.is_terminal() || !request.is_past_expiry(now) {
            return Ok(None);
        }

        let signers = Database::signers_for_update_on(&mut tx, request_id)
            .await
            .map_err(|e| e.to_string())?;
        let cascade = cascade::plan(CascadeKind::Expired, &signers, None, now);
        Database::apply_cascade_on(&mut tx, &cascade)
            .await
            .map_err(|e| e.to_string())?;
        Database::apply_request_update_on(
            &mut tx,
            request_id,
            &RequestUpdate {
                status: RequestStatus::Expired,
                completed_utc: None,
                declined_utc: Some(now),
                declined_by: None,
                decline_reason: Some("request expired".to_string()),
            },
            now,
        )
        .await
        .map_err(|e| e.to_string())?;

        tx.commit().await.map_err(|e| e.to_string())?;

        tracing::info!(
            request_id = %request_id,
            cascaded = cascade.forced.len(),
            "Request force-expired"
        );
        Ok(Some(WorkflowEvent::RequestExpired {
            request_id,
            title: request.title.clone(),
            owner_email: request.owner_email.clone(),
        }))
    }
}

/// Signers who could still act: not signed, not declined.
fn actionable_signer_emails(signers: &[Signer]) -> Vec<String> {
    signers
        .iter()
        .filter(|s| !matches!(s.status(), SignerStatus::Signed | SignerStatus::Declined))
        .map(|s| s.email.clone())
        .collect()
}

fn record_sweep_error(stats: &mut SweepStats, sweep: &str, request_id: Uuid, error: &str) {
    metrics::SWEEP_RUNS.with_label_values(&[sweep, "error"]).inc();
    metrics::ERRORS.with_label_values(&["sweep"]).inc();
    tracing::error!(sweep, request_id = %request_id, error, "Sweep item failed");
    stats.errors.push(SweepError {
        request_id,
        error: error.to_string(),
    });
}
