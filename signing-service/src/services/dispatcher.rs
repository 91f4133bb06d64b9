//! Idempotent notification fan-out.
//!
//! Workflow transitions hand events to the dispatcher and move on; a worker
//! task expands each event into outbound messages, consults the notification
//! log so an already-sent logical event is never re-dispatched, and retries
//! transient transport failures a bounded number of times.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::database::Database;
use super::email::{EmailError, EmailService, SendOutcome};
use super::metrics;
use crate::models::{DeliveryStatus, NotificationLog, NotificationType};

/// Retry budget per message, counting the first attempt.
pub const MAX_SEND_ATTEMPTS: u32 = 3;

/// One workflow occurrence worth notifying someone about.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    /// A draft was sent out to its signers.
    RequestSent {
        request_id: Uuid,
        title: String,
        recipients: Vec<String>,
    },
    /// Sequential mode: a signature unblocked the next signer.
    SignerTurn {
        request_id: Uuid,
        title: String,
        recipient: String,
        signing_order: i32,
    },
    RequestCompleted {
        request_id: Uuid,
        title: String,
        owner_email: String,
        recipients: Vec<String>,
    },
    RequestDeclined {
        request_id: Uuid,
        title: String,
        owner_email: String,
        declined_by_email: String,
        reason: String,
        recipients: Vec<String>,
    },
    /// Forced expiry notifies the owner only.
    RequestExpired {
        request_id: Uuid,
        title: String,
        owner_email: String,
    },
    ReminderDue {
        request_id: Uuid,
        title: String,
        recipients: Vec<String>,
        window_label: String,
    },
    ExpiryWarning {
        request_id: Uuid,
        title: String,
        owner_email: String,
        recipients: Vec<String>,
        expires_utc: DateTime<Utc>,
    },
}

impl WorkflowEvent {
    pub fn request_id(&self) -> Uuid {
        match self {
            Self::RequestSent { request_id, .. }
            | Self::SignerTurn { request_id, .. }
            | Self::RequestCompleted { request_id, .. }
            | Self::RequestDeclined { request_id, .. }
            | Self::RequestExpired { request_id, .. }
            | Self::ReminderDue { request_id, .. }
            | Self::ExpiryWarning { request_id, .. } => *request_id,
        }
    }
}

/// A single outbound message derived from an event.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub request_id: Uuid,
    pub recipient: String,
    pub notification_type: NotificationType,
    pub subject: String,
    pub body: String,
    /// Together with (request, recipient, type) this keys idempotency:
    /// semantically identical triggers share a fingerprint, new windows get
    /// a new one.
    pub trigger_fingerprint: String,
}

/// Expand one event into zero or more outbound messages. Pure.
pub fn expand(event: &WorkflowEvent) -> Vec<OutboundMessage> {
    match event {
        WorkflowEvent::RequestSent {
            request_id,
            title,
            recipients,
        } => recipients
            .iter()
            .map(|recipient| OutboundMessage {
                request_id: *request_id,
                recipient: recipient.clone(),
                notification_type: NotificationType::SignerInvitation,
                subject: format!("Signature requested: {title}"),
                body: format!("You have been asked to sign \"{title}\"."),
                trigger_fingerprint: "invite".to_string(),
            })
            .collect(),
        WorkflowEvent::SignerTurn {
            request_id,
            title,
            recipient,
            signing_order,
        } => vec![OutboundMessage {
            request_id: *request_id,
            recipient: recipient.clone(),
            notification_type: NotificationType::SignerInvitation,
            subject: format!("Your turn to sign: {title}"),
            body: format!("It is now your turn to sign \"{title}\"."),
            trigger_fingerprint: format!("turn-{signing_order}"),
        }],
        WorkflowEvent::RequestCompleted {
            request_id,
            title,
            owner_email,
            recipients,
        } => recipients
            .iter()
            .map(|recipient| OutboundMessage {
                request_id: *request_id,
                recipient: recipient.clone(),
                notification_type: NotificationType::RequestCompleted,
                subject: format!("Completed: {title}"),
                body: format!(
                    "All parties have signed \"{title}\" (requested by {owner_email})."
                ),
                trigger_fingerprint: "completed".to_string(),
            })
            .collect(),
        WorkflowEvent::RequestDeclined {
            request_id,
            title,
            owner_email: _,
            declined_by_email,
            reason,
            recipients,
        } => recipients
            .iter()
            .map(|recipient| OutboundMessage {
                request_id: *request_id,
                recipient: recipient.clone(),
                notification_type: NotificationType::RequestDeclined,
                subject: format!("Declined: {title}"),
                body: format!(
                    "{declined_by_email} declined to sign \"{title}\": {reason}"
                ),
                trigger_fingerprint: "declined".to_string(),
            })
            .collect(),
        WorkflowEvent::RequestExpired {
            request_id,
            title,
            owner_email,
        } => vec![OutboundMessage {
            request_id: *request_id,
            recipient: owner_email.clone(),
            notification_type: NotificationType::RequestExpired,
            subject: format!("Expired: {title}"),
            body: format!("\"{title}\" expired before all parties signed."),
            trigger_fingerprint: "expired".to_string(),
        }],
        WorkflowEvent::ReminderDue {
            request_id,
            title,
            recipients,
            window_label,
        } => recipients
            .iter()
            .map(|recipient| OutboundMessage {
                request_id: *request_id,
                recipient: recipient.clone(),
                notification_type: NotificationType::SigningReminder,
                subject: format!("Reminder: {title} awaits your signature"),
                body: format!("\"{title}\" is still waiting for your signature."),
                trigger_fingerprint: format!("reminder-{window_label}"),
            })
            .collect(),
        WorkflowEvent::ExpiryWarning {
            request_id,
            title,
            owner_email,
            recipients,
            expires_utc,
        } => {
            let fingerprint = format!("warning-{}", expires_utc.timestamp());
            let mut messages = vec![OutboundMessage {
                request_id: *request_id,
                recipient: owner_email.clone(),
                notification_type: NotificationType::ExpiryWarning,
                subject: format!("Expiring soon: {title}"),
                body: format!("\"{title}\" expires at {expires_utc}."),
                trigger_fingerprint: fingerprint.clone(),
            }];
            messages.extend(recipients.iter().map(|recipient| OutboundMessage {
                request_id: *request_id,
                recipient: recipient.clone(),
                notification_type: NotificationType::ExpiryWarning,
                subject: format!("Expiring soon: {title}"),
                body: format!("\"{title}\" expires at {expires_utc}. Please sign before then."),
                trigger_fingerprint: fingerprint.clone(),
            }));
            messages
        }
    }
}

/// Handle used by the workflow to emit events without blocking on delivery.
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<WorkflowEvent>,
}

impl NotificationDispatcher {
    /// Fire-and-forget. A full queue drops the event with a log line rather
    /// than stalling the transition that emitted it.
    pub fn dispatch(&self, event: WorkflowEvent) {
        if let Err(e) = self.tx.try_send(event) {
            metrics::ERRORS.with_label_values(&["dispatch_queue_full"]).inc();
            tracing::error!(error = %e, "Notification queue full, event dropped");
        }
    }
}

/// Background worker draining the dispatch queue.
pub struct DispatchWorker {
    db: Database,
    email: Arc<EmailService>,
    rx: mpsc::Receiver<WorkflowEvent>,
    shutdown: CancellationToken,
}

impl DispatchWorker {
    pub fn new(
        db: Database,
        email: Arc<EmailService>,
        queue_size: usize,
        shutdown: CancellationToken,
    ) -> (NotificationDispatcher, Self) {
        let (tx, rx) = mpsc::channel(queue_size);
        (
            NotificationDispatcher { tx },
            Self {
                db,
                email,
                rx,
                shutdown,
            },
        )
    }

    pub async fn run(mut self) {
        tracing::info!("Notification dispatch worker started");
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Notification dispatch worker shutting down");
                    break;
                }
                event = self.rx.recv() => {
                    match event {
                        Some(event) => self.handle_event(event).await,
                        None => break,
                    }
                }
            }
        }
    }

    async fn handle_event(&self, event: WorkflowEvent) {
        let request_id = event.request_id();
        for message in expand(&event) {
            if let Err(e) = self.process_message(&message).await {
                tracing::error!(
                    request_id = %request_id,
                    recipient = %message.recipient,
                    error = %e,
                    "Notification processing failed"
                );
            }
        }
    }

    /// Deliver one message: dedupe against the log, then send with bounded
    /// retries, appending one log row per attempt.
    async fn process_message(
        &self,
        message: &OutboundMessage,
    ) -> Result<(), service_core::error::AppError> {
        let notification_type = message.notification_type.as_str();
        if self
            .db
            .notification_already_delivered(
                message.request_id,
                &message.recipient,
                notification_type,
                &message.trigger_fingerprint,
            )
            .await?
        {
            tracing::debug!(
                request_id = %message.request_id,
                recipient = %message.recipient,
                notification_type,
                "Already delivered, skipping"
            );
            metrics::NOTIFICATIONS
                .with_label_values(&[notification_type, "deduplicated"])
                .inc();
            return Ok(());
        }

        let mut backoff = backoff::ExponentialBackoff {
            initial_interval: std::time::Duration::from_millis(200),
            max_elapsed_time: None,
            ..Default::default()
        };

        for attempt in 0..MAX_SEND_ATTEMPTS {
            let result = self
                .email
                .send(&message.recipient, &message.subject, &message.body)
                .await;

            match result {
                Ok(outcome) => {
                    let status = match outcome {
                        SendOutcome::Delivered => DeliveryStatus::Delivered,
                        SendOutcome::Accepted => DeliveryStatus::Sent,
                    };
                    self.record_attempt(message, status, attempt, None).await?;
                    metrics::NOTIFICATIONS
                        .with_label_values(&[notification_type, status.as_str()])
                        .inc();
                    return Ok(());
                }
                Err(EmailError::Permanent(reason)) => {
                    self.record_attempt(
                        message,
                        DeliveryStatus::Bounced,
                        attempt,
                        Some(reason.clone()),
                    )
                    .await?;
                    metrics::NOTIFICATIONS
                        .with_label_values(&[notification_type, "bounced"])
                        .inc();
                    tracing::warn!(
                        recipient = %message.recipient,
                        reason,
                        "Permanent delivery failure, not retrying"
                    );
                    return Ok(());
                }
                Err(EmailError::Transient(reason)) => {
                    self.record_attempt(
                        message,
                        DeliveryStatus::Failed,
                        attempt,
                        Some(reason.clone()),
                    )
                    .await?;
                    if attempt + 1 < MAX_SEND_ATTEMPTS {
                        use backoff::backoff::Backoff;
                        let delay = backoff
                            .next_backoff()
                            .unwrap_or(std::time::Duration::from_secs(1));
                        tracing::warn!(
                            recipient = %message.recipient,
                            attempt,
                            reason,
                            "Transient delivery failure, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        metrics::NOTIFICATIONS
                            .with_label_values(&[notification_type, "failed"])
                            .inc();
                        metrics::ERRORS
                            .with_label_values(&["notification_exhausted"])
                            .inc();
                        tracing::error!(
                            request_id = %message.request_id,
                            recipient = %message.recipient,
                            notification_type,
                            "Delivery failed after {MAX_SEND_ATTEMPTS} attempts"
                        );
                    }
                }
            }
        }
        Ok(())
    }

    async fn record_attempt(
        &self,
        message: &OutboundMessage,
        status: DeliveryStatus,
        retry_count: u32,
        error_message: Option<String>,
    ) -> Result<(), service_core::error::AppError> {
        let log = NotificationLog {
            notification_id: Uuid::new_v4(),
            request_id: message.request_id,
            recipient: message.recipient.clone(),
            notification_type: message.notification_type.as_str().to_string(),
            trigger_fingerprint: message.trigger_fingerprint.clone(),
            status: status.as_str().to_string(),
            retry_count: retry_count as i32,
            error_message,
            created_utc: Utc::now(),
        };
        self.db.insert_notification_attempt(&log).await
    }
}
