//! Workflow error taxonomy.
//!
//! Every rejected action carries the specific kind so callers can render an
//! accurate message rather than a generic failure.

use service_core::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Signing request not found")]
    RequestNotFound,

    #[error("Signing request is already {status}")]
    RequestAlreadyTerminal { status: String },

    #[error("Signer not found on this request")]
    SignerNotFound,

    #[error("Signer has already {status}")]
    SignerAlreadyTerminal { status: String },

    #[error("Another signer must act first")]
    OutOfOrder,

    #[error("A second-factor code is required for this action")]
    SecondFactorRequired,

    #[error("The supplied second-factor code is invalid")]
    SecondFactorInvalid,

    #[error("Concurrent update conflict, retry the action")]
    ConcurrentConflict,

    #[error("Persistence failure: {0}")]
    Persistence(#[source] anyhow::Error),
}

impl WorkflowError {
    /// Stable kind code, used in responses and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RequestNotFound => "REQUEST_NOT_FOUND",
            Self::RequestAlreadyTerminal { .. } => "REQUEST_ALREADY_TERMINAL",
            Self::SignerNotFound => "SIGNER_NOT_FOUND",
            Self::SignerAlreadyTerminal { .. } => "SIGNER_ALREADY_TERMINAL",
            Self::OutOfOrder => "OUT_OF_ORDER",
            Self::SecondFactorRequired => "SECOND_FACTOR_REQUIRED",
            Self::SecondFactorInvalid => "SECOND_FACTOR_INVALID",
            Self::ConcurrentConflict => "CONCURRENT_CONFLICT",
            Self::Persistence(_) => "PERSISTENCE_FAILURE",
        }
    }

    /// Conflicts are retried internally a bounded number of times before
    /// surfacing.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentConflict)
    }
}

impl From<sqlx::Error> for WorkflowError {
    fn from(err: sqlx::Error) -> Self {
        // Postgres serialization/deadlock failures are retried as conflicts.
        if let Some(db_err) = err.as_database_error() {
            if let Some(code) = db_err.code() {
                if code == "40001" || code == "40P01" {
                    return WorkflowError::ConcurrentConflict;
                }
            }
        }
        WorkflowError::Persistence(anyhow::Error::new(err))
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        let message = format!("{}: {}", err.kind(), err);
        match err {
            WorkflowError::RequestNotFound | WorkflowError::SignerNotFound => {
                AppError::NotFound(anyhow::anyhow!(message))
            }
            WorkflowError::RequestAlreadyTerminal { .. }
            | WorkflowError::SignerAlreadyTerminal { .. }
            | WorkflowError::ConcurrentConflict => AppError::Conflict(anyhow::anyhow!(message)),
            WorkflowError::OutOfOrder => {
                AppError::UnprocessableEntity(anyhow::anyhow!(message))
            }
            WorkflowError::SecondFactorRequired | WorkflowError::SecondFactorInvalid => {
                AppError::Unauthorized(anyhow::anyhow!(message))
            }
            WorkflowError::Persistence(e) => AppError::DatabaseError(e),
        }
    }
}
