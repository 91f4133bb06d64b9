//! SMTP transport for workflow notifications.
//!
//! Runs disabled outside production configurations: sends are logged and
//! treated as successful, which keeps the dispatch pipeline exercisable in
//! tests without a relay.

use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;

use crate::config::SmtpConfig;
use service_core::error::AppError;

/// What a successful hand-off means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The message reached the recipient (log-only mode: the log line is
    /// the delivery).
    Delivered,
    /// The relay accepted the message; delivery is not yet confirmed.
    Accepted,
}

#[derive(Debug, Error)]
pub enum EmailError {
    /// Retrying cannot help (bad address, malformed message).
    #[error("permanent email failure: {0}")]
    Permanent(String),
    /// Worth retrying (relay unreachable, transient SMTP error).
    #[error("transient email failure: {0}")]
    Transient(String),
}

pub struct EmailService {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from_mailbox: Mailbox,
}

impl EmailService {
    pub fn new(config: &SmtpConfig) -> Result<Self, AppError> {
        let from_mailbox: Mailbox = format!("{} <{}>", config.from_name, config.from_email)
            .parse()
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Invalid from address: {e}"))
            })?;

        if !config.enabled {
            tracing::info!("Email transport disabled, sends will be logged only");
            return Ok(Self {
                transport: None,
                from_mailbox,
            });
        }

        let creds = Credentials::new(config.user.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Failed to create SMTP relay: {e}"))
            })?
            .port(config.port)
            .credentials(creds)
            .build();

        tracing::info!(host = %config.host, "Email transport initialized");
        Ok(Self {
            transport: Some(transport),
            from_mailbox,
        })
    }

    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<SendOutcome, EmailError> {
        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e| EmailError::Permanent(format!("Invalid recipient {to}: {e}")))?;

        let Some(transport) = self.transport.as_ref() else {
            tracing::info!(to, subject, "Email transport disabled, logging send");
            return Ok(SendOutcome::Delivered);
        };

        let message = Message::builder()
            .from(self.from_mailbox.clone())
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| EmailError::Permanent(format!("Failed to build message: {e}")))?;

        transport
            .send(message)
            .await
            .map(|_| SendOutcome::Accepted)
            .map_err(|e| {
                if e.is_permanent() {
                    EmailError::Permanent(e.to_string())
                } else {
                    EmailError::Transient(e.to_string())
                }
            })
    }
}
