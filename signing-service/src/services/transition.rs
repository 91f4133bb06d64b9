//! Pure transition evaluation for the signing workflow.
//!
//! `evaluate` computes the authoritative next state for one signer action
//! given a snapshot of the request and its signers. It never touches the
//! database or the wall clock (time comes in via the context), which keeps
//! the state machine deterministic and unit-testable. The resulting
//! [`TransitionPlan`] is applied atomically by the database layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cascade::{self, CascadeKind, CascadePlan};
use super::dispatcher::WorkflowEvent;
use super::error::WorkflowError;
use super::second_factor::GateOutcome;
use crate::models::{RequestStatus, Signer, SignerStatus, SigningMode, SigningRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Sign,
    Decline,
    View,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sign => "sign",
            Self::Decline => "decline",
            Self::View => "view",
        }
    }

    /// Second-factor gating applies to signing and declining, not viewing.
    pub fn requires_second_factor_gate(&self) -> bool {
        matches!(self, Self::Sign | Self::Decline)
    }
}

/// Caller-supplied context for one transition attempt.
#[derive(Debug, Clone)]
pub struct TransitionContext {
    pub now: DateTime<Utc>,
    pub code: Option<String>,
    pub reason: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl TransitionContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            code: None,
            reason: None,
            ip_address: None,
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionOutcome {
    Viewed,
    AlreadyViewed,
    Signed,
    Completed,
    Declined,
}

impl TransitionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewed => "viewed",
            Self::AlreadyViewed => "already_viewed",
            Self::Signed => "signed",
            Self::Completed => "completed",
            Self::Declined => "declined",
        }
    }
}

/// Field updates for the acting signer.
#[derive(Debug, Clone)]
pub struct SignerUpdate {
    pub signer_id: Uuid,
    pub status: SignerStatus,
    pub viewed_utc: Option<DateTime<Utc>>,
    pub signed_utc: Option<DateTime<Utc>>,
    pub declined_utc: Option<DateTime<Utc>>,
    pub decline_reason: Option<String>,
    pub second_factor_verified_utc: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Field updates for the parent request.
#[derive(Debug, Clone)]
pub struct RequestUpdate {
    pub status: RequestStatus,
    pub completed_utc: Option<DateTime<Utc>>,
    pub declined_utc: Option<DateTime<Utc>>,
    pub declined_by: Option<Uuid>,
    pub decline_reason: Option<String>,
}

/// Everything one successful transition writes and emits, applied together
/// or not at all.
#[derive(Debug, Clone)]
pub struct TransitionPlan {
    pub request_id: Uuid,
    pub outcome: TransitionOutcome,
    pub signer_update: Option<SignerUpdate>,
    pub request_update: Option<RequestUpdate>,
    pub cascade: Option<CascadePlan>,
    pub events: Vec<WorkflowEvent>,
    /// Gate outcome recorded in the audit trail (e.g. exemption bypass).
    pub gate_reason: &'static str,
}

/// Result surfaced to the caller once the plan has been committed.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionResult {
    pub outcome: TransitionOutcome,
    pub request_status: RequestStatus,
    pub signer_status: SignerStatus,
    pub affected_signer_ids: Vec<Uuid>,
}

impl TransitionResult {
    pub fn from_plan(plan: &TransitionPlan, request: &SigningRequest, signer: &Signer) -> Self {
        let request_status = plan
            .request_update
            .as_ref()
            .map(|u| u.status)
            .unwrap_or_else(|| request.status());
        let signer_status = plan
            .signer_update
            .as_ref()
            .map(|u| u.status)
            .unwrap_or_else(|| signer.status());
        let affected_signer_ids = plan
            .cascade
            .as_ref()
            .map(|c| c.affected_signer_ids())
            .unwrap_or_default();
        Self {
            outcome: plan.outcome,
            request_status,
            signer_status,
            affected_signer_ids,
        }
    }
}

/// Compute the legal transition for `action` by `signer_id`, or the specific
/// rejection.
///
/// Precondition order: request exists and is live, signer exists and is not
/// terminal, sequential ordering holds, second factor verified.
pub fn evaluate(
    request: &SigningRequest,
    signers: &[Signer],
    signer_id: Uuid,
    action: Action,
    gate: GateOutcome,
    ctx: &TransitionContext,
) -> Result<TransitionPlan, WorkflowError> {
    // A draft has not been sent to anyone; signers cannot act on (or see) it.
    if request.status() == RequestStatus::Draft {
        return Err(WorkflowError::RequestNotFound);
    }
    if request.is_terminal() {
        return Err(WorkflowError::RequestAlreadyTerminal {
            status: request.status.clone(),
        });
    }
    // Past-expiry requests are already terminal in effect; the forced-expiry
    // sweep records the state.
    if request.is_past_expiry(ctx.now) {
        return Err(WorkflowError::RequestAlreadyTerminal {
            status: RequestStatus::Expired.as_str().to_string(),
        });
    }

    let signer = signers
        .iter()
        .find(|s| s.signer_id == signer_id && s.request_id == request.request_id)
        .ok_or(WorkflowError::SignerNotFound)?;

    if action == Action::View {
        return Ok(evaluate_view(request, signer, ctx));
    }

    if signer.is_terminal() {
        return Err(WorkflowError::SignerAlreadyTerminal {
            status: signer.status.clone(),
        });
    }

    if action == Action::Sign && request.signing_mode() == SigningMode::Sequential {
        let blocked = signers.iter().any(|s| {
            s.signing_order < signer.signing_order && s.status() != SignerStatus::Signed
        });
        if blocked {
            return Err(WorkflowError::OutOfOrder);
        }
    }

    if request.requires_second_factor && action.requires_second_factor_gate() {
        match gate {
            GateOutcome::CodeMissing => return Err(WorkflowError::SecondFactorRequired),
            GateOutcome::CodeInvalid => return Err(WorkflowError::SecondFactorInvalid),
            GateOutcome::NotRequired
            | GateOutcome::Exempt
            | GateOutcome::VerifiedTotp
            | GateOutcome::VerifiedBackup => {}
        }
    }

    match action {
        Action::Sign => Ok(evaluate_sign(request, signers, signer, gate, ctx)),
        Action::Decline => Ok(evaluate_decline(request, signers, signer, ctx)),
        Action::View => unreachable!("view handled above"),
    }
}

fn evaluate_view(
    request: &SigningRequest,
    signer: &Signer,
    ctx: &TransitionContext,
) -> TransitionPlan {
    // Repeat views are no-ops once the signer is at or past `viewed`.
    if signer.status() != SignerStatus::Pending {
        return TransitionPlan {
            request_id: request.request_id,
            outcome: TransitionOutcome::AlreadyViewed,
            signer_update: None,
            request_update: None,
            cascade: None,
            events: Vec::new(),
            gate_reason: "not_required",
        };
    }

    TransitionPlan {
        request_id: request.request_id,
        outcome: TransitionOutcome::Viewed,
        signer_update: Some(SignerUpdate {
            signer_id: signer.signer_id,
            status: SignerStatus::Viewed,
            viewed_utc: Some(ctx.now),
            signed_utc: None,
            declined_utc: None,
            decline_reason: None,
            second_factor_verified_utc: None,
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
        }),
        request_update: in_progress_update(request),
        cascade: None,
        events: Vec::new(),
        gate_reason: "not_required",
    }
}

fn evaluate_sign(
    request: &SigningRequest,
    signers: &[Signer],
    signer: &Signer,
    gate: GateOutcome,
    ctx: &TransitionContext,
) -> TransitionPlan {
    let second_factor_verified_utc = if gate.verified_by_code() {
        Some(ctx.now)
    } else {
        None
    };

    let signer_update = SignerUpdate {
        signer_id: signer.signer_id,
        status: SignerStatus::Signed,
        viewed_utc: signer.viewed_utc.or(Some(ctx.now)),
        signed_utc: Some(ctx.now),
        declined_utc: None,
        decline_reason: None,
        second_factor_verified_utc,
        ip_address: ctx.ip_address.clone(),
        user_agent: ctx.user_agent.clone(),
    };

    let all_others_signed = signers
        .iter()
        .filter(|s| s.signer_id != signer.signer_id)
        .all(|s| s.status() == SignerStatus::Signed);

    if all_others_signed {
        let recipients = recipients_of(request, signers);
        return TransitionPlan {
            request_id: request.request_id,
            outcome: TransitionOutcome::Completed,
            signer_update: Some(signer_update),
            request_update: Some(RequestUpdate {
                status: RequestStatus::Completed,
                completed_utc: Some(ctx.now),
                declined_utc: None,
                declined_by: None,
                decline_reason: None,
            }),
            cascade: None,
            events: vec![WorkflowEvent::RequestCompleted {
                request_id: request.request_id,
                title: request.title.clone(),
                owner_email: request.owner_email.clone(),
                recipients,
            }],
            gate_reason: gate.audit_reason(),
        };
    }

    // Sequential mode: the signature unblocks the next signer in order.
    let mut events = Vec::new();
    if request.signing_mode() == SigningMode::Sequential {
        if let Some(next) = signers
            .iter()
            .filter(|s| s.signer_id != signer.signer_id && !s.is_terminal())
            .min_by_key(|s| s.signing_order)
        {
            events.push(WorkflowEvent::SignerTurn {
                request_id: request.request_id,
                title: request.title.clone(),
                recipient: next.email.clone(),
                signing_order: next.signing_order,
            });
        }
    }

    TransitionPlan {
        request_id: request.request_id,
        outcome: TransitionOutcome::Signed,
        signer_update: Some(signer_update),
        request_update: in_progress_update(request),
        cascade: None,
        events,
        gate_reason: gate.audit_reason(),
    }
}

fn evaluate_decline(
    request: &SigningRequest,
    signers: &[Signer],
    signer: &Signer,
    ctx: &TransitionContext,
) -> TransitionPlan {
    let reason = ctx
        .reason
        .clone()
        .unwrap_or_else(|| "declined by signer".to_string());

    let cascade = cascade::plan(CascadeKind::Declined, signers, Some(signer), ctx.now);
    let recipients = recipients_of(request, signers);

    TransitionPlan {
        request_id: request.request_id,
        outcome: TransitionOutcome::Declined,
        signer_update: Some(SignerUpdate {
            signer_id: signer.signer_id,
            status: SignerStatus::Declined,
            viewed_utc: signer.viewed_utc.or(Some(ctx.now)),
            signed_utc: None,
            declined_utc: Some(ctx.now),
            decline_reason: Some(reason.clone()),
            second_factor_verified_utc: None,
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
        }),
        request_update: Some(RequestUpdate {
            status: RequestStatus::Declined,
            completed_utc: None,
            declined_utc: Some(ctx.now),
            declined_by: Some(signer.signer_id),
            decline_reason: Some(reason.clone()),
        }),
        cascade: Some(cascade),
        events: vec![WorkflowEvent::RequestDeclined {
            request_id: request.request_id,
            title: request.title.clone(),
            owner_email: request.owner_email.clone(),
            declined_by_email: signer.email.clone(),
            reason,
            recipients,
        }],
        gate_reason: "not_recorded",
    }
}

/// First successful action on a freshly sent request moves it along.
fn in_progress_update(request: &SigningRequest) -> Option<RequestUpdate> {
    if request.status() == RequestStatus::Pending {
        Some(RequestUpdate {
            status: RequestStatus::InProgress,
            completed_utc: None,
            declined_utc: None,
            declined_by: None,
            decline_reason: None,
        })
    } else {
        None
    }
}

fn recipients_of(request: &SigningRequest, signers: &[Signer]) -> Vec<String> {
    let mut recipients = vec![request.owner_email.clone()];
    recipients.extend(signers.iter().map(|s| s.email.clone()));
    recipients
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn request(mode: SigningMode, status: RequestStatus) -> SigningRequest {
        let now = Utc::now();
        SigningRequest {
            request_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            owner_email: "owner@example.com".to_string(),
            title: "Master services agreement".to_string(),
            status: status.as_str().to_string(),
            signing_mode: mode.as_str().to_string(),
            requires_second_factor: false,
            expires_utc: Some(now + Duration::days(7)),
            last_reminder_sent_utc: None,
            completed_utc: None,
            declined_utc: None,
            decline_reason: None,
            declined_by: None,
            created_utc: now,
            updated_utc: now,
        }
    }

    fn signer(request_id: Uuid, order: i32, status: SignerStatus) -> Signer {
        let now = Utc::now();
        Signer {
            signer_id: Uuid::new_v4(),
            request_id,
            email: format!("signer{order}@example.com"),
            user_id: None,
            signing_order: order,
            status: status.as_str().to_string(),
            viewed_utc: None,
            signed_utc: None,
            declined_utc: None,
            decline_reason: None,
            second_factor_verified_utc: None,
            ip_address: None,
            user_agent: None,
            created_utc: now,
            updated_utc: now,
        }
    }

    fn ctx() -> TransitionContext {
        TransitionContext::new(Utc::now())
    }

    #[test]
    fn sequential_sign_out_of_order_is_rejected() {
        let req = request(SigningMode::Sequential, RequestStatus::Pending);
        let s1 = signer(req.request_id, 1, SignerStatus::Pending);
        let s2 = signer(req.request_id, 2, SignerStatus::Pending);
        let signers = vec![s1, s2.clone()];

        let err = evaluate(
            &req,
            &signers,
            s2.signer_id,
            Action::Sign,
            GateOutcome::NotRequired,
            &ctx(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "OUT_OF_ORDER");
    }

    #[test]
    fn sequential_sign_in_order_is_allowed() {
        let req = request(SigningMode::Sequential, RequestStatus::InProgress);
        let s1 = signer(req.request_id, 1, SignerStatus::Signed);
        let s2 = signer(req.request_id, 2, SignerStatus::Viewed);
        let s3 = signer(req.request_id, 3, SignerStatus::Pending);
        let signers = vec![s1, s2.clone(), s3.clone()];

        let plan = evaluate(
            &req,
            &signers,
            s2.signer_id,
            Action::Sign,
            GateOutcome::NotRequired,
            &ctx(),
        )
        .unwrap();
        assert_eq!(plan.outcome, TransitionOutcome::Signed);
        // The next signer in order is notified it is their turn.
        assert!(matches!(
            plan.events.as_slice(),
            [WorkflowEvent::SignerTurn { recipient, .. }] if *recipient == s3.email
        ));
    }

    #[test]
    fn parallel_sign_ignores_order() {
        let req = request(SigningMode::Parallel, RequestStatus::Pending);
        let s1 = signer(req.request_id, 1, SignerStatus::Pending);
        let s2 = signer(req.request_id, 2, SignerStatus::Pending);
        let signers = vec![s1, s2.clone()];

        let plan = evaluate(
            &req,
            &signers,
            s2.signer_id,
            Action::Sign,
            GateOutcome::NotRequired,
            &ctx(),
        )
        .unwrap();
        assert_eq!(plan.outcome, TransitionOutcome::Signed);
        // Pending request moves to in_progress on the first signature.
        assert_eq!(
            plan.request_update.unwrap().status,
            RequestStatus::InProgress
        );
    }

    #[test]
    fn last_signature_completes_the_request() {
        let req = request(SigningMode::Sequential, RequestStatus::InProgress);
        let s1 = signer(req.request_id, 1, SignerStatus::Signed);
        let s2 = signer(req.request_id, 2, SignerStatus::Viewed);
        let signers = vec![s1, s2.clone()];

        let plan = evaluate(
            &req,
            &signers,
            s2.signer_id,
            Action::Sign,
            GateOutcome::NotRequired,
            &ctx(),
        )
        .unwrap();
        assert_eq!(plan.outcome, TransitionOutcome::Completed);
        let update = plan.request_update.unwrap();
        assert_eq!(update.status, RequestStatus::Completed);
        assert!(update.completed_utc.is_some());
        assert!(update.declined_utc.is_none());
        assert!(matches!(
            plan.events.as_slice(),
            [WorkflowEvent::RequestCompleted { .. }]
        ));
    }

    #[test]
    fn terminal_request_rejects_all_actions() {
        for status in [
            RequestStatus::Completed,
            RequestStatus::Declined,
            RequestStatus::Expired,
        ] {
            let req = request(SigningMode::Parallel, status);
            let s1 = signer(req.request_id, 1, SignerStatus::Pending);
            let signers = vec![s1.clone()];
            for action in [Action::Sign, Action::Decline, Action::View] {
                let err = evaluate(
                    &req,
                    &signers,
                    s1.signer_id,
                    action,
                    GateOutcome::NotRequired,
                    &ctx(),
                )
                .unwrap_err();
                assert_eq!(err.kind(), "REQUEST_ALREADY_TERMINAL");
            }
        }
    }

    #[test]
    fn draft_request_is_invisible_to_signers() {
        let req = request(SigningMode::Parallel, RequestStatus::Draft);
        let s1 = signer(req.request_id, 1, SignerStatus::Pending);
        let signers = vec![s1.clone()];
        let err = evaluate(
            &req,
            &signers,
            s1.signer_id,
            Action::View,
            GateOutcome::NotRequired,
            &ctx(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "REQUEST_NOT_FOUND");
    }

    #[test]
    fn past_expiry_request_is_treated_as_terminal() {
        let mut req = request(SigningMode::Parallel, RequestStatus::Pending);
        req.expires_utc = Some(Utc::now() - Duration::hours(1));
        let s1 = signer(req.request_id, 1, SignerStatus::Pending);
        let signers = vec![s1.clone()];
        let err = evaluate(
            &req,
            &signers,
            s1.signer_id,
            Action::Sign,
            GateOutcome::NotRequired,
            &ctx(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "REQUEST_ALREADY_TERMINAL");
    }

    #[test]
    fn unknown_signer_is_rejected() {
        let req = request(SigningMode::Parallel, RequestStatus::Pending);
        let s1 = signer(req.request_id, 1, SignerStatus::Pending);
        let signers = vec![s1];
        let err = evaluate(
            &req,
            &signers,
            Uuid::new_v4(),
            Action::Sign,
            GateOutcome::NotRequired,
            &ctx(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "SIGNER_NOT_FOUND");
    }

    #[test]
    fn signed_signer_cannot_act_again() {
        let req = request(SigningMode::Parallel, RequestStatus::InProgress);
        let s1 = signer(req.request_id, 1, SignerStatus::Signed);
        let s2 = signer(req.request_id, 2, SignerStatus::Pending);
        let signers = vec![s1.clone(), s2];
        for action in [Action::Sign, Action::Decline] {
            let err = evaluate(
                &req,
                &signers,
                s1.signer_id,
                action,
                GateOutcome::NotRequired,
                &ctx(),
            )
            .unwrap_err();
            assert_eq!(err.kind(), "SIGNER_ALREADY_TERMINAL");
        }
    }

    #[test]
    fn second_factor_gate_blocks_signing() {
        let mut req = request(SigningMode::Parallel, RequestStatus::Pending);
        req.requires_second_factor = true;
        let s1 = signer(req.request_id, 1, SignerStatus::Pending);
        let signers = vec![s1.clone()];

        let err = evaluate(
            &req,
            &signers,
            s1.signer_id,
            Action::Sign,
            GateOutcome::CodeMissing,
            &ctx(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "SECOND_FACTOR_REQUIRED");

        let err = evaluate(
            &req,
            &signers,
            s1.signer_id,
            Action::Sign,
            GateOutcome::CodeInvalid,
            &ctx(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "SECOND_FACTOR_INVALID");
    }

    #[test]
    fn second_factor_gate_does_not_apply_to_view() {
        let mut req = request(SigningMode::Parallel, RequestStatus::Pending);
        req.requires_second_factor = true;
        let s1 = signer(req.request_id, 1, SignerStatus::Pending);
        let signers = vec![s1.clone()];

        let plan = evaluate(
            &req,
            &signers,
            s1.signer_id,
            Action::View,
            GateOutcome::CodeMissing,
            &ctx(),
        )
        .unwrap();
        assert_eq!(plan.outcome, TransitionOutcome::Viewed);
    }

    #[test]
    fn verified_code_records_verification_timestamp() {
        let mut req = request(SigningMode::Parallel, RequestStatus::Pending);
        req.requires_second_factor = true;
        let s1 = signer(req.request_id, 1, SignerStatus::Viewed);
        let s2 = signer(req.request_id, 2, SignerStatus::Pending);
        let signers = vec![s1.clone(), s2];

        let plan = evaluate(
            &req,
            &signers,
            s1.signer_id,
            Action::Sign,
            GateOutcome::VerifiedTotp,
            &ctx(),
        )
        .unwrap();
        let update = plan.signer_update.unwrap();
        assert!(update.second_factor_verified_utc.is_some());
    }

    #[test]
    fn exemption_bypass_leaves_verification_unset_and_is_recorded() {
        let mut req = request(SigningMode::Parallel, RequestStatus::Pending);
        req.requires_second_factor = true;
        let s1 = signer(req.request_id, 1, SignerStatus::Viewed);
        let s2 = signer(req.request_id, 2, SignerStatus::Pending);
        let signers = vec![s1.clone(), s2];

        let plan = evaluate(
            &req,
            &signers,
            s1.signer_id,
            Action::Sign,
            GateOutcome::Exempt,
            &ctx(),
        )
        .unwrap();
        assert!(plan
            .signer_update
            .as_ref()
            .unwrap()
            .second_factor_verified_utc
            .is_none());
        assert_eq!(plan.gate_reason, "exemption");
    }

    #[test]
    fn decline_cascades_to_all_non_terminal_signers() {
        let req = request(SigningMode::Sequential, RequestStatus::InProgress);
        let s1 = signer(req.request_id, 1, SignerStatus::Signed);
        let s2 = signer(req.request_id, 2, SignerStatus::Viewed);
        let s3 = signer(req.request_id, 3, SignerStatus::Pending);
        let signers = vec![s1.clone(), s2.clone(), s3.clone()];

        let plan = evaluate(
            &req,
            &signers,
            s2.signer_id,
            Action::Decline,
            GateOutcome::NotRequired,
            &ctx(),
        )
        .unwrap();

        assert_eq!(plan.outcome, TransitionOutcome::Declined);
        let update = plan.request_update.unwrap();
        assert_eq!(update.status, RequestStatus::Declined);
        assert_eq!(update.declined_by, Some(s2.signer_id));
        assert!(update.declined_utc.is_some());

        let cascade = plan.cascade.unwrap();
        assert_eq!(cascade.affected_signer_ids(), vec![s3.signer_id]);
        assert!(cascade.untouched.contains(&s1.signer_id));
    }

    #[test]
    fn view_advances_pending_and_is_idempotent_afterwards() {
        let req = request(SigningMode::Parallel, RequestStatus::Pending);
        let s1 = signer(req.request_id, 1, SignerStatus::Pending);
        let signers = vec![s1.clone()];

        let plan = evaluate(
            &req,
            &signers,
            s1.signer_id,
            Action::View,
            GateOutcome::NotRequired,
            &ctx(),
        )
        .unwrap();
        assert_eq!(plan.outcome, TransitionOutcome::Viewed);
        assert_eq!(
            plan.request_update.unwrap().status,
            RequestStatus::InProgress
        );

        for status in [SignerStatus::Viewed, SignerStatus::Signed] {
            let s = signer(req.request_id, 2, status);
            let signers = vec![s.clone()];
            let plan = evaluate(
                &req,
                &signers,
                s.signer_id,
                Action::View,
                GateOutcome::NotRequired,
                &ctx(),
            )
            .unwrap();
            assert_eq!(plan.outcome, TransitionOutcome::AlreadyViewed);
            assert!(plan.signer_update.is_none());
            assert!(plan.request_update.is_none());
        }
    }
}
