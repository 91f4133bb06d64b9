//! Cascade resolution for terminal signer events.
//!
//! A decline (or forced expiry) on one signer terminates every other
//! non-terminal signer and the parent request. The plan computed here is
//! applied in the same transaction as the triggering write, so no signer is
//! ever observable as `pending` while the parent is already terminal.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Signer, SignerStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeKind {
    Declined,
    Expired,
}

impl CascadeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Declined => "declined",
            Self::Expired => "expired",
        }
    }
}

/// Forced transition of one non-terminal sibling signer.
#[derive(Debug, Clone)]
pub struct ForcedSignerUpdate {
    pub signer_id: Uuid,
    pub status: SignerStatus,
    pub reason: String,
    pub declined_utc: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CascadePlan {
    pub kind: CascadeKind,
    pub forced: Vec<ForcedSignerUpdate>,
    /// Signers left untouched because their history is immutable (`signed`)
    /// or they are the trigger itself.
    pub untouched: Vec<Uuid>,
}

impl CascadePlan {
    pub fn affected_signer_ids(&self) -> Vec<Uuid> {
        self.forced.iter().map(|f| f.signer_id).collect()
    }
}

/// Compute the effect of a terminal event on all sibling signers.
///
/// `triggering_signer` is the declining signer for `kind = Declined` and
/// absent for forced expiry.
pub fn plan(
    kind: CascadeKind,
    signers: &[Signer],
    triggering_signer: Option<&Signer>,
    now: DateTime<Utc>,
) -> CascadePlan {
    let trigger_id = triggering_signer.map(|s| s.signer_id);
    let reason = match (kind, triggering_signer) {
        (CascadeKind::Declined, Some(trigger)) => {
            format!("automatically declined: {} declined the request", trigger.email)
        }
        (CascadeKind::Declined, None) => "automatically declined".to_string(),
        (CascadeKind::Expired, _) => "automatically declined: request expired".to_string(),
    };

    let mut forced = Vec::new();
    let mut untouched = Vec::new();
    for signer in signers {
        if Some(signer.signer_id) == trigger_id || signer.is_terminal() {
            untouched.push(signer.signer_id);
            continue;
        }
        forced.push(ForcedSignerUpdate {
            signer_id: signer.signer_id,
            status: SignerStatus::Declined,
            reason: reason.clone(),
            declined_utc: now,
        });
    }

    CascadePlan {
        kind,
        forced,
        untouched,
    }
}
