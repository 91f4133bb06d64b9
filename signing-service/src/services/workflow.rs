//! Workflow state machine entry point.
//!
//! Locks the request row, runs the second-factor gate and the pure
//! transition evaluation inside that transaction, applies the resulting plan
//! (signer write, cascade, request write) as one unit, and only then emits
//! events. Two concurrent attempts on one request serialize on the row lock,
//! so ordering invariants hold under concurrency.

use std::sync::Arc;
use uuid::Uuid;

use super::artifacts::ArtifactGenerator;
use super::database::Database;
use super::dispatcher::NotificationDispatcher;
use super::error::WorkflowError;
use super::metrics;
use super::dispatcher::WorkflowEvent;
use super::second_factor::{GateOutcome, SecondFactorGate};
use super::transition::{self, Action, TransitionContext, TransitionOutcome, TransitionResult};
use crate::models::{SigningMode, SigningRequest};
use service_core::error::AppError;

/// Bounded internal retries for optimistic-conflict failures.
const MAX_CONFLICT_RETRIES: u32 = 3;

#[derive(Clone)]
pub struct WorkflowService {
    db: Database,
    gate: SecondFactorGate,
    dispatcher: NotificationDispatcher,
    artifacts: Arc<dyn ArtifactGenerator>,
}

impl WorkflowService {
    pub fn new(
        db: Database,
        gate: SecondFactorGate,
        dispatcher: NotificationDispatcher,
        artifacts: Arc<dyn ArtifactGenerator>,
    ) -> Self {
        Self {
            db,
            gate,
            dispatcher,
            artifacts,
        }
    }

    /// Send a draft out to its signers: move it to `pending` and emit the
    /// invitations. Sequential requests invite only the first signer.
    pub async fn send_request(
        &self,
        request_id: Uuid,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<SigningRequest, AppError> {
        let request = self
            .db
            .find_request(request_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Signing request not found")))?;

        if !self.db.mark_request_sent(request_id, now).await? {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Request is not a draft and cannot be sent"
            )));
        }

        let signers = self.db.signers_for_request(request_id).await?;
        let recipients: Vec<String> = match request.signing_mode() {
            SigningMode::Parallel => signers.iter().map(|s| s.email.clone()).collect(),
            SigningMode::Sequential => signers
                .iter()
                .min_by_key(|s| s.signing_order)
                .map(|s| vec![s.email.clone()])
                .unwrap_or_default(),
        };
        if !recipients.is_empty() {
            self.dispatcher.dispatch(WorkflowEvent::RequestSent {
                request_id,
                title: request.title.clone(),
                recipients,
            });
        }

        tracing::info!(request_id = %request_id, "Signing request sent");
        self.db
            .find_request(request_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Signing request not found")))
    }

    /// Apply one signer action and return the authoritative outcome.
    #[tracing::instrument(skip(self, ctx), fields(request_id = %request_id, signer_id = %signer_id, action = action.as_str()))]
    pub async fn attempt_transition(
        &self,
        request_id: Uuid,
        signer_id: Uuid,
        action: Action,
        ctx: &TransitionContext,
    ) -> Result<TransitionResult, WorkflowError> {
        let mut attempt = 0;
        let result = loop {
            match self
                .attempt_transition_once(request_id, signer_id, action, ctx)
                .await
            {
                Err(e) if e.is_retryable() && attempt + 1 < MAX_CONFLICT_RETRIES => {
                    attempt += 1;
                    tracing::warn!(attempt, "Transition conflict, retrying");
                    continue;
                }
                other => break other,
            }
        };

        match &result {
            Ok(r) => {
                metrics::TRANSITIONS
                    .with_label_values(&[action.as_str(), r.outcome.as_str()])
                    .inc();
            }
            Err(e) => {
                metrics::TRANSITIONS
                    .with_label_values(&[action.as_str(), e.kind()])
                    .inc();
            }
        }
        result
    }

    async fn attempt_transition_once(
        &self,
        request_id: Uuid,
        signer_id: Uuid,
        action: Action,
        ctx: &TransitionContext,
    ) -> Result<TransitionResult, WorkflowError> {
        let mut tx = self.db.pool().begin().await.map_err(WorkflowError::from)?;

        let request = Database::lock_request_on(&mut tx, request_id)
            .await?
            .ok_or(WorkflowError::RequestNotFound)?;
        let signers = Database::signers_for_update_on(&mut tx, request_id).await?;

        // The gate runs in the same transaction so a consumed backup code
        // commits (or rolls back) with the transition itself.
        let gate = if request.requires_second_factor && action.requires_second_factor_gate() {
            match signers
                .iter()
                .find(|s| s.signer_id == signer_id)
                .filter(|s| !s.is_terminal())
            {
                Some(signer) => {
                    let outcome = self
                        .gate
                        .check(
                            &mut tx,
                            signer,
                            request.organization_id,
                            ctx.code.as_deref(),
                            ctx.now,
                        )
                        .await?;
                    metrics::SECOND_FACTOR_CHECKS
                        .with_label_values(&[outcome.audit_reason()])
                        .inc();
                    outcome
                }
                // evaluate() produces the precise rejection for these.
                None => GateOutcome::NotRequired,
            }
        } else {
            GateOutcome::NotRequired
        };

        let plan = transition::evaluate(&request, &signers, signer_id, action, gate, ctx)?;

        if let Some(update) = &plan.signer_update {
            Database::apply_signer_update_on(&mut tx, update, ctx.now).await?;
        }
        if let Some(cascade) = &plan.cascade {
            Database::apply_cascade_on(&mut tx, cascade).await?;
        }
        if let Some(update) = &plan.request_update {
            Database::apply_request_update_on(&mut tx, request_id, update, ctx.now).await?;
        }

        tx.commit().await?;

        let signer = signers
            .iter()
            .find(|s| s.signer_id == signer_id)
            .ok_or(WorkflowError::SignerNotFound)?;
        let result = TransitionResult::from_plan(&plan, &request, signer);

        tracing::info!(
            outcome = result.outcome.as_str(),
            request_status = result.request_status.as_str(),
            gate_reason = plan.gate_reason,
            "Transition committed"
        );

        if result.outcome == TransitionOutcome::Completed {
            // Final-artifact generation is independently retryable; its
            // failure must not disturb the committed state.
            let artifacts = self.artifacts.clone();
            tokio::spawn(async move {
                if let Err(e) = artifacts.generate(request_id).await {
                    metrics::ERRORS
                        .with_label_values(&["artifact_generation"])
                        .inc();
                    tracing::error!(request_id = %request_id, error = %e, "Artifact generation failed");
                }
            });
        }

        for event in plan.events {
            self.dispatcher.dispatch(event);
        }

        Ok(result)
    }
}
