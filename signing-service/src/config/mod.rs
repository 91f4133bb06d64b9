//! Environment-driven configuration for signing-service.

use service_core::error::AppError;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from_name: String,
    pub from_email: String,
}

/// Tunables for the reconciliation sweeps and the dispatch queue.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Minimum hours between reminders for one request.
    pub reminder_interval_hours: i64,
    /// Lookahead window for expiry warnings.
    pub expiry_warning_hours: i64,
    pub sweep_interval_seconds: u64,
    pub dispatch_queue_size: usize,
}

#[derive(Debug, Clone)]
pub struct SigningConfig {
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub smtp: SmtpConfig,
    pub workflow: WorkflowConfig,
}

impl SigningConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let common = service_core::config::Config::load()?;

        Ok(Self {
            service_name: env_or("SERVICE_NAME", "signing-service"),
            service_version: env_or("SERVICE_VERSION", env!("CARGO_PKG_VERSION")),
            log_level: common.log_level,
            port: common.port,
            database: DatabaseConfig {
                url: require_env("DATABASE_URL")?,
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10)?,
                min_connections: env_parse("DATABASE_MIN_CONNECTIONS", 1)?,
            },
            smtp: SmtpConfig {
                enabled: env_parse("SMTP_ENABLED", false)?,
                host: env_or("SMTP_HOST", "localhost"),
                port: env_parse("SMTP_PORT", 587)?,
                user: env_or("SMTP_USER", ""),
                password: env_or("SMTP_PASSWORD", ""),
                from_name: env_or("SMTP_FROM_NAME", "Signing Service"),
                from_email: env_or("SMTP_FROM_EMAIL", "no-reply@example.com"),
            },
            workflow: WorkflowConfig {
                reminder_interval_hours: env_parse("REMINDER_INTERVAL_HOURS", 24)?,
                expiry_warning_hours: env_parse("EXPIRY_WARNING_HOURS", 24)?,
                sweep_interval_seconds: env_parse("SWEEP_INTERVAL_SECONDS", 300)?,
                dispatch_queue_size: env_parse("DISPATCH_QUEUE_SIZE", 256)?,
            },
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn require_env(key: &str) -> Result<String, AppError> {
    std::env::var(key).map_err(|_| AppError::ConfigError(anyhow::anyhow!("{key} must be set")))
}

fn env_parse<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid {key}: {e}"))),
        Err(_) => Ok(default),
    }
}
