//! Outbound response payloads.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{NotificationLog, SecondFactorExemption, Signer, SigningRequest};
use crate::services::transition::{TransitionOutcome, TransitionResult};

#[derive(Debug, Serialize)]
pub struct SignerResponse {
    pub signer_id: Uuid,
    pub email: String,
    pub user_id: Option<Uuid>,
    pub signing_order: i32,
    pub status: String,
    pub viewed_utc: Option<DateTime<Utc>>,
    pub signed_utc: Option<DateTime<Utc>>,
    pub declined_utc: Option<DateTime<Utc>>,
    pub decline_reason: Option<String>,
    pub second_factor_verified_utc: Option<DateTime<Utc>>,
}

impl From<&Signer> for SignerResponse {
    fn from(signer: &Signer) -> Self {
        Self {
            signer_id: signer.signer_id,
            email: signer.email.clone(),
            user_id: signer.user_id,
            signing_order: signer.signing_order,
            status: signer.status.clone(),
            viewed_utc: signer.viewed_utc,
            signed_utc: signer.signed_utc,
            declined_utc: signer.declined_utc,
            decline_reason: signer.decline_reason.clone(),
            second_factor_verified_utc: signer.second_factor_verified_utc,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SigningRequestResponse {
    pub request_id: Uuid,
    pub organization_id: Uuid,
    pub owner_email: String,
    pub title: String,
    pub status: String,
    pub signing_mode: String,
    pub requires_second_factor: bool,
    pub expires_utc: Option<DateTime<Utc>>,
    pub completed_utc: Option<DateTime<Utc>>,
    pub declined_utc: Option<DateTime<Utc>>,
    pub decline_reason: Option<String>,
    pub declined_by: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
    pub signers: Vec<SignerResponse>,
}

impl SigningRequestResponse {
    pub fn from_parts(request: &SigningRequest, signers: &[Signer]) -> Self {
        Self {
            request_id: request.request_id,
            organization_id: request.organization_id,
            owner_email: request.owner_email.clone(),
            title: request.title.clone(),
            status: request.status.clone(),
            signing_mode: request.signing_mode.clone(),
            requires_second_factor: request.requires_second_factor,
            expires_utc: request.expires_utc,
            completed_utc: request.completed_utc,
            declined_utc: request.declined_utc,
            decline_reason: request.decline_reason.clone(),
            declined_by: request.declined_by,
            created_utc: request.created_utc,
            signers: signers.iter().map(SignerResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub outcome: TransitionOutcome,
    pub request_status: String,
    pub signer_status: String,
    /// Signers force-declined by a cascade this transition triggered.
    pub affected_signer_ids: Vec<Uuid>,
}

impl From<TransitionResult> for TransitionResponse {
    fn from(result: TransitionResult) -> Self {
        Self {
            outcome: result.outcome,
            request_status: result.request_status.as_str().to_string(),
            signer_status: result.signer_status.as_str().to_string(),
            affected_signer_ids: result.affected_signer_ids,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExemptionResponse {
    pub exemption_id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub scope: String,
    pub expires_utc: DateTime<Utc>,
    pub granted_by: Uuid,
    pub grant_reason: String,
    pub created_utc: DateTime<Utc>,
}

impl From<&SecondFactorExemption> for ExemptionResponse {
    fn from(exemption: &SecondFactorExemption) -> Self {
        Self {
            exemption_id: exemption.exemption_id,
            user_id: exemption.user_id,
            organization_id: exemption.organization_id,
            scope: exemption.exemption_type.clone(),
            expires_utc: exemption.expires_utc,
            granted_by: exemption.granted_by,
            grant_reason: exemption.grant_reason.clone(),
            created_utc: exemption.created_utc,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NotificationLogResponse {
    pub notification_id: Uuid,
    pub recipient: String,
    pub notification_type: String,
    pub trigger_fingerprint: String,
    pub status: String,
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl From<&NotificationLog> for NotificationLogResponse {
    fn from(log: &NotificationLog) -> Self {
        Self {
            notification_id: log.notification_id,
            recipient: log.recipient.clone(),
            notification_type: log.notification_type.clone(),
            trigger_fingerprint: log.trigger_fingerprint.clone(),
            status: log.status.clone(),
            retry_count: log.retry_count,
            error_message: log.error_message.clone(),
            created_utc: log.created_utc,
        }
    }
}
