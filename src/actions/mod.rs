//! Action contract
//!
//! Every game action is an [`ActionHandler`] registered under a string
//! kind. A handler validates a request against read-only state, then
//! executes it against a draft, talking to participants only through a
//! [`Channel`].
//!
//! Lifecycle of one request:
//! `Created -> Validating -> (Rejected | Validated) -> Executing -> (Completed | Failed)`

pub mod executor;
pub mod registry;
pub mod workflow;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::channel::{Channel, ChannelError};
use crate::combat::{FollowUp, RollError, TurnError, TurnSlot};
use crate::state::{DocumentId, GameState, MergeError, Properties};

pub use executor::{ActionExecutor, ActionOutcome};
pub use registry::{ActionRegistry, RulePlugin};
pub use workflow::{
    run_workflow, DamagePart, EffectPlan, Resolution, TargetOutcome, TargetStatus, WorkflowReport,
};

/// Parameter naming the acting character
pub const CHARACTER_PARAM: &str = "character_id";

/// A request to perform one action; immutable once issued
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    #[serde(default = "new_request_id")]
    pub id: String,
    /// Set by the transport from the connected participant when empty
    #[serde(default)]
    pub issuer_id: String,
    pub action_kind: String,
    #[serde(default)]
    pub parameters: Properties,
    #[serde(default)]
    pub target_ids: Vec<DocumentId>,
}

fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl ActionRequest {
    pub fn new(issuer_id: &str, action_kind: &str) -> Self {
        Self {
            id: new_request_id(),
            issuer_id: issuer_id.to_string(),
            action_kind: action_kind.to_string(),
            parameters: Properties::new(),
            target_ids: Vec::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: serde_json::Value) -> Self {
        self.parameters.insert(key.to_string(), value);
        self
    }

    pub fn with_character(self, character_id: &str) -> Self {
        self.with_param(CHARACTER_PARAM, serde_json::Value::from(character_id))
    }

    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_ids = targets.into_iter().map(Into::into).collect();
        self
    }

    /// Document acting on behalf of the issuer
    pub fn character_id(&self) -> Option<&str> {
        self.str_param(CHARACTER_PARAM)
    }

    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(|v| v.as_str())
    }

    pub fn i64_param(&self, key: &str) -> Option<i64> {
        self.parameters.get(key).and_then(|v| v.as_i64())
    }

    pub fn bool_param(&self, key: &str) -> Option<bool> {
        self.parameters.get(key).and_then(|v| v.as_bool())
    }
}

/// Business-rule failure codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NoCharacter,
    InvalidParameters,
    InvalidDamage,
    CharacterNotFound,
    AlreadyDead,
    CannotLongRest,
    UnknownAction,
}

/// A coded validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub code: ErrorCode,
    pub message: String,
}

/// Result of validating a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionValidation {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ValidationError>,
}

impl ActionValidation {
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn reject(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(ValidationError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Execute-time failures that abort an action
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0} already used this turn")]
    SlotSpent(TurnSlot),

    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("roll error: {0}")]
    Roll(#[from] RollError),

    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),

    #[error("{0}")]
    Rejected(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<TurnError> for ActionError {
    fn from(e: TurnError) -> Self {
        match e {
            TurnError::SlotSpent(slot) => ActionError::SlotSpent(slot),
        }
    }
}

/// Where a request is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPhase {
    Created,
    Validating,
    Rejected,
    Validated,
    Executing,
    Completed,
    Failed,
}

impl ActionPhase {
    /// Whether `next` is a legal successor of this phase
    pub fn can_advance_to(self, next: ActionPhase) -> bool {
        use ActionPhase::*;
        matches!(
            (self, next),
            (Created, Validating)
                | (Validating, Rejected)
                | (Validating, Validated)
                | (Validated, Executing)
                | (Executing, Completed)
                | (Executing, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ActionPhase::Rejected | ActionPhase::Completed | ActionPhase::Failed
        )
    }
}

/// The validate/execute pair every action implements
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Registry key, e.g. "weapon-attack"
    fn kind(&self) -> &'static str;

    /// Check business rules; reads `state` only
    fn validate(&self, request: &ActionRequest, state: &GameState) -> ActionValidation;

    /// Apply the action to the draft, returning follow-ups for the issuer
    async fn execute(
        &self,
        request: &ActionRequest,
        draft: &mut GameState,
        channel: &dyn Channel,
    ) -> Result<Vec<FollowUp>, ActionError>;
}
