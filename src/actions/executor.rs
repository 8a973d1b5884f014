//! Action execution
//!
//! Drives one request through its lifecycle: resolve the handler, check out
//! a draft scoped to the acting character and the targets, validate,
//! execute, and merge the draft back only on success. Rejected and failed
//! actions never touch the live state.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{
    ActionPhase, ActionRegistry, ActionRequest, ErrorCode, ValidationError,
};
use crate::channel::{Channel, ChatMessage};
use crate::combat::FollowUp;
use crate::state::{DocumentId, DraftScope, GameStore};

/// What happened to a submitted request
#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    pub request_id: String,
    pub action_kind: String,
    pub phase: ActionPhase,
    /// Validation failure, when rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ValidationError>,
    /// Failure description, when failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub follow_ups: Vec<FollowUp>,
    /// Documents written back to the live state
    pub updated: Vec<DocumentId>,
}

impl ActionOutcome {
    fn new(request: &ActionRequest) -> Self {
        Self {
            request_id: request.id.clone(),
            action_kind: request.action_kind.clone(),
            phase: ActionPhase::Created,
            error: None,
            message: None,
            follow_ups: Vec::new(),
            updated: Vec::new(),
        }
    }

    fn advance(&mut self, next: ActionPhase) {
        if !self.phase.can_advance_to(next) {
            warn!(
                "Action {} moved from {:?} to {:?}",
                self.request_id, self.phase, next
            );
        }
        debug!("Action {}: {:?} -> {:?}", self.request_id, self.phase, next);
        self.phase = next;
    }

    fn reject(mut self, code: ErrorCode, message: impl Into<String>) -> Self {
        self.advance(ActionPhase::Rejected);
        self.error = Some(ValidationError {
            code,
            message: message.into(),
        });
        self
    }

    pub fn is_completed(&self) -> bool {
        self.phase == ActionPhase::Completed
    }
}

/// Runs requests against the shared store
#[derive(Clone)]
pub struct ActionExecutor {
    store: Arc<GameStore>,
    registry: Arc<ActionRegistry>,
}

impl ActionExecutor {
    pub fn new(store: Arc<GameStore>, registry: Arc<ActionRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &Arc<GameStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    /// Documents a request may read and write
    fn scope_for(request: &ActionRequest) -> DraftScope {
        let mut scope = DraftScope::new();
        if let Some(character_id) = request.character_id() {
            scope = scope.with_carrier(character_id);
        }
        for target in &request.target_ids {
            scope = scope.with(target);
        }
        scope
    }

    /// Validate, execute, and merge one request
    pub async fn submit(&self, request: ActionRequest, channel: &dyn Channel) -> ActionOutcome {
        let mut outcome = ActionOutcome::new(&request);
        info!(
            "Action {} ({}) from {}",
            request.id, request.action_kind, request.issuer_id
        );

        outcome.advance(ActionPhase::Validating);
        let Some(handler) = self.registry.get(&request.action_kind).await else {
            warn!("Unknown action kind {}", request.action_kind);
            return outcome.reject(
                ErrorCode::UnknownAction,
                format!("Unknown action: {}", request.action_kind),
            );
        };

        let mut draft = self.store.checkout(&Self::scope_for(&request)).await;
        let validation = handler.validate(&request, draft.state());
        if !validation.valid {
            let error = validation.error.unwrap_or(ValidationError {
                code: ErrorCode::InvalidParameters,
                message: "Action is not valid".to_string(),
            });
            warn!(
                "Action {} rejected: {:?} {}",
                request.id, error.code, error.message
            );
            return outcome.reject(error.code, error.message);
        }
        outcome.advance(ActionPhase::Validated);

        outcome.advance(ActionPhase::Executing);
        let executed = handler.execute(&request, draft.state_mut(), channel).await;
        let follow_ups = match executed {
            Ok(follow_ups) => follow_ups,
            Err(e) => {
                warn!("Action {} failed: {}", request.id, e);
                return self.fail(outcome, channel, e.to_string()).await;
            }
        };

        match self.store.commit(draft).await {
            Ok(report) => {
                outcome.advance(ActionPhase::Completed);
                outcome.follow_ups = follow_ups;
                outcome.updated = report.updated;
                info!(
                    "Action {} completed, {} documents updated",
                    request.id,
                    outcome.updated.len()
                );
                outcome
            }
            Err(e) => {
                warn!("Action {} not merged: {}", request.id, e);
                self.fail(outcome, channel, e.to_string()).await
            }
        }
    }

    async fn fail(
        &self,
        mut outcome: ActionOutcome,
        channel: &dyn Channel,
        reason: String,
    ) -> ActionOutcome {
        outcome.advance(ActionPhase::Failed);
        let notice = ChatMessage::new(format!("{} could not be completed.", outcome.action_kind));
        if let Err(e) = channel.send_chat_message(notice).await {
            debug!("Failure notice not delivered: {}", e);
        }
        outcome.message = Some(reason);
        outcome
    }
}
