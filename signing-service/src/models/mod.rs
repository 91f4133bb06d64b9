//! Domain models for signing-service.

pub mod audit_event;
pub mod credential;
pub mod exemption;
pub mod notification_log;
pub mod signer;
pub mod signing_request;

pub use audit_event::{ExemptionAuditAction, ExemptionAuditEvent};
pub use credential::{BackupCode, SecondFactorCredential};
pub use exemption::{ExemptionScope, SecondFactorExemption};
pub use notification_log::{DeliveryStatus, NotificationLog, NotificationType};
pub use signer::{Signer, SignerStatus};
pub use signing_request::{RequestStatus, SigningMode, SigningRequest};
