//! Roll and confirmation channel
//!
//! The engine never rolls dice for a participant directly. It sends a
//! [`RollRequest`] through a [`Channel`] and suspends until exactly one
//! [`RollResult`] comes back for it. Implementations:
//! - [`LocalChannel`]: rolls server-side and confirms everything
//! - [`ScriptedChannel`]: predetermined faces for tests and replays
//! - `api::SocketChannel`: asks connected participants over WebSocket

pub mod local;
pub mod scripted;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::combat::dice::{ADVANTAGE_ARG, MODIFIERS_ARG, ROLL_KIND_ARG};
use crate::combat::{AdvantageMode, DiceGroup, DiceRoll, Recipients, RollKind, RollResult};

pub use local::{LocalChannel, TranscriptEntry};
pub use scripted::ScriptedChannel;

/// Participant that rolls for requests with no explicit participant
pub const DEFAULT_GM: &str = "gm";

/// Errors from a channel round trip
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("participant {0} is not connected")]
    NotConnected(String),

    #[error("channel closed")]
    Closed,

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("no scripted rolls left")]
    Exhausted,
}

/// A request for one participant to roll dice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollRequest {
    pub id: String,
    /// Who should roll; `None` means the GM
    pub participant_id: Option<String>,
    pub kind: RollKind,
    pub label: String,
    pub dice: Vec<DiceRoll>,
    /// Named flat modifiers added to the total
    #[serde(default)]
    pub modifiers: BTreeMap<String, i32>,
    #[serde(default)]
    pub advantage: AdvantageMode,
    #[serde(default)]
    pub recipients: Recipients,
}

impl RollRequest {
    pub fn new(participant_id: Option<&str>, kind: RollKind, label: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            participant_id: participant_id.map(str::to_string),
            kind,
            label: label.into(),
            dice: Vec::new(),
            modifiers: BTreeMap::new(),
            advantage: AdvantageMode::Normal,
            recipients: Recipients::Public,
        }
    }

    /// A d20 roll; two dice are requested under advantage or disadvantage
    pub fn d20(
        participant_id: Option<&str>,
        kind: RollKind,
        label: impl Into<String>,
        advantage: AdvantageMode,
    ) -> Self {
        let mut request = Self::new(participant_id, kind, label);
        request.dice = vec![advantage.dice()];
        request.advantage = advantage;
        request
    }

    pub fn with_dice(mut self, dice: Vec<DiceRoll>) -> Self {
        self.dice = dice;
        self
    }

    pub fn with_modifier(mut self, name: &str, value: i32) -> Self {
        if value != 0 {
            self.modifiers.insert(name.to_string(), value);
        }
        self
    }

    pub fn with_recipients(mut self, recipients: Recipients) -> Self {
        self.recipients = recipients;
        self
    }

    /// Participant that should roll, falling back to the GM
    pub fn roller<'a>(&'a self, gm: &'a str) -> &'a str {
        self.participant_id.as_deref().unwrap_or(gm)
    }

    /// Check that returned faces match the requested dice
    pub fn validate_groups(&self, groups: &[DiceGroup]) -> Result<(), ChannelError> {
        if groups.len() != self.dice.len() {
            return Err(ChannelError::InvalidResponse(format!(
                "expected {} dice groups, got {}",
                self.dice.len(),
                groups.len()
            )));
        }
        for (group, dice) in groups.iter().zip(&self.dice) {
            if group.faces != dice.sides || group.results.len() != dice.count as usize {
                return Err(ChannelError::InvalidResponse(format!(
                    "expected {}d{}, got {} faces of d{}",
                    dice.count,
                    dice.sides,
                    group.results.len(),
                    group.faces
                )));
            }
            if let Some(bad) = group.results.iter().find(|&&r| r == 0 || r > dice.sides) {
                return Err(ChannelError::InvalidResponse(format!(
                    "face {} out of range for d{}",
                    bad, dice.sides
                )));
            }
        }
        Ok(())
    }

    /// Build the result of this request from rolled faces
    pub fn fulfill(&self, issuer_id: &str, dice_groups: Vec<DiceGroup>) -> RollResult {
        let mut modifiers = self.modifiers.clone();
        let formula: i32 = self.dice.iter().map(|d| d.modifier).sum();
        if formula != 0 {
            modifiers.insert("formula".to_string(), formula);
        }

        let mut result = RollResult::from_faces(issuer_id, dice_groups)
            .with_rule_arg(ADVANTAGE_ARG, json!(self.advantage))
            .with_rule_arg(MODIFIERS_ARG, json!(modifiers))
            .with_rule_arg(ROLL_KIND_ARG, json!(self.kind));
        result.metadata.insert("label".to_string(), json!(self.label));
        result.metadata.insert("request_id".to_string(), json!(self.id));
        result.recipients = self.recipients;
        result
    }

    /// Roll this request with the server's RNG
    pub fn roll(&self, issuer_id: &str) -> RollResult {
        let groups = self.dice.iter().map(DiceRoll::roll_group).collect();
        self.fulfill(issuer_id, groups)
    }
}

/// A chat line produced by an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    #[serde(default)]
    pub speaker: Option<String>,
    pub text: String,
    #[serde(default)]
    pub recipients: Recipients,
    pub sent_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            speaker: None,
            text: text.into(),
            recipients: Recipients::Public,
            sent_at: Utc::now(),
        }
    }

    pub fn from_speaker(mut self, speaker: &str) -> Self {
        self.speaker = Some(speaker.to_string());
        self
    }

    pub fn to_gm(mut self) -> Self {
        self.recipients = Recipients::Gm;
        self
    }
}

/// A yes/no question put to a participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    pub id: String,
    /// Who should answer; `None` means the GM
    pub participant_id: Option<String>,
    pub prompt: String,
}

impl ConfirmationRequest {
    pub fn new(participant_id: Option<&str>, prompt: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            participant_id: participant_id.map(str::to_string),
            prompt: prompt.into(),
        }
    }
}

/// Request/response facility between the engine and participants
///
/// Calls suspend the caller until the matching response arrives. A channel
/// keeps no state between calls beyond what is needed to route replies.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Ask one participant for one roll
    async fn send_roll_request(&self, request: RollRequest) -> Result<RollResult, ChannelError>;

    /// Ask for several rolls at once
    ///
    /// One result per request, in request order; a failure for one
    /// participant does not affect the others.
    async fn send_multiple_roll_requests(
        &self,
        requests: Vec<RollRequest>,
    ) -> Vec<Result<RollResult, ChannelError>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.send_roll_request(request).await);
        }
        results
    }

    /// Post a chat line
    async fn send_chat_message(&self, message: ChatMessage) -> Result<(), ChannelError>;

    /// Ask a yes/no question
    async fn request_confirmation(
        &self,
        request: ConfirmationRequest,
    ) -> Result<bool, ChannelError>;
}
