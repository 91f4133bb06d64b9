//! Inbound request payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{ExemptionScope, SigningMode};
use crate::services::transition::Action;

fn default_true() -> bool {
    true
}

// The length validator on `signers` serializes the field into its error
// params, so this type carries Serialize alongside Deserialize.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SignerInputDto {
    #[validate(email(message = "Invalid signer email"))]
    pub email: String,
    /// Platform user, when known. Exemptions only apply to known users.
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSigningRequestDto {
    pub organization_id: Uuid,
    #[validate(email(message = "Invalid owner email"))]
    pub owner_email: String,
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    pub signing_mode: SigningMode,
    #[serde(default)]
    pub requires_second_factor: bool,
    pub expires_utc: Option<DateTime<Utc>>,
    /// Signing order follows the position in this list.
    #[validate(length(min = 1, message = "At least one signer is required"), nested)]
    pub signers: Vec<SignerInputDto>,
    /// Create and immediately send, skipping the draft stage.
    #[serde(default = "default_true")]
    pub send_immediately: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitActionDto {
    pub action: Action,
    /// Second-factor code, when the request demands one.
    pub code: Option<String>,
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GrantExemptionDto {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub scope: ExemptionScope,
    pub expires_utc: DateTime<Utc>,
    pub granted_by: Uuid,
    #[validate(length(min = 1, max = 500, message = "Reason must be 1-500 characters"))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RevokeExemptionDto {
    pub revoked_by: Uuid,
    #[validate(length(min = 1, max = 500, message = "Reason must be 1-500 characters"))]
    pub reason: String,
}
