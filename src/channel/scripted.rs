//! Deterministic channel fed with predetermined faces
//!
//! Each requested die consumes the next queued face, in request order and
//! group order. Confirmations pop from their own queue and default to yes.

use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Channel, ChannelError, ChatMessage, ConfirmationRequest, RollRequest, DEFAULT_GM};
use crate::combat::{DiceGroup, RollResult};

#[derive(Default)]
struct Script {
    faces: VecDeque<u32>,
    confirmations: VecDeque<bool>,
    requests: Vec<RollRequest>,
    chat: Vec<ChatMessage>,
}

pub struct ScriptedChannel {
    gm: String,
    absent: HashSet<String>,
    script: Mutex<Script>,
}

impl ScriptedChannel {
    pub fn new(faces: impl IntoIterator<Item = u32>) -> Self {
        Self {
            gm: DEFAULT_GM.to_string(),
            absent: HashSet::new(),
            script: Mutex::new(Script {
                faces: faces.into_iter().collect(),
                ..Script::default()
            }),
        }
    }

    /// Queue answers for confirmation requests
    pub fn with_confirmations(self, answers: impl IntoIterator<Item = bool>) -> Self {
        self.script.lock().confirmations.extend(answers);
        self
    }

    /// Requests addressed to this participant fail as not connected
    pub fn fail_for(mut self, participant: &str) -> Self {
        self.absent.insert(participant.to_string());
        self
    }

    /// Every roll request received so far
    pub fn requests(&self) -> Vec<RollRequest> {
        self.script.lock().requests.clone()
    }

    /// Text of every chat message so far
    pub fn chat_lines(&self) -> Vec<String> {
        self.script.lock().chat.iter().map(|m| m.text.clone()).collect()
    }

    /// Faces not yet consumed
    pub fn remaining(&self) -> usize {
        self.script.lock().faces.len()
    }
}

#[async_trait]
impl Channel for ScriptedChannel {
    async fn send_roll_request(&self, request: RollRequest) -> Result<RollResult, ChannelError> {
        let roller = request.roller(&self.gm).to_string();
        if self.absent.contains(&roller) {
            return Err(ChannelError::NotConnected(roller));
        }

        let mut script = self.script.lock();
        let mut groups = Vec::with_capacity(request.dice.len());
        for dice in &request.dice {
            let mut results = Vec::with_capacity(dice.count as usize);
            for _ in 0..dice.count {
                results.push(script.faces.pop_front().ok_or(ChannelError::Exhausted)?);
            }
            groups.push(DiceGroup::new(dice.sides, results));
        }
        let result = request.fulfill(&roller, groups);
        script.requests.push(request);
        Ok(result)
    }

    async fn send_chat_message(&self, message: ChatMessage) -> Result<(), ChannelError> {
        self.script.lock().chat.push(message);
        Ok(())
    }

    async fn request_confirmation(
        &self,
        request: ConfirmationRequest,
    ) -> Result<bool, ChannelError> {
        let roller = request.participant_id.as_deref().unwrap_or(&self.gm);
        if self.absent.contains(roller) {
            return Err(ChannelError::NotConnected(roller.to_string()));
        }
        Ok(self.script.lock().confirmations.pop_front().unwrap_or(true))
    }
}
