//! Server-side channel
//!
//! Rolls every request with the server's RNG, answers every confirmation
//! with a fixed reply, and keeps a transcript of what passed through.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::{Channel, ChannelError, ChatMessage, ConfirmationRequest, RollRequest, DEFAULT_GM};
use crate::combat::RollResult;

/// One exchange recorded by a [`LocalChannel`]
#[derive(Debug, Clone)]
pub enum TranscriptEntry {
    Roll {
        request: RollRequest,
        result: RollResult,
    },
    Chat(ChatMessage),
    Confirmation {
        request: ConfirmationRequest,
        answer: bool,
    },
}

pub struct LocalChannel {
    gm: String,
    confirm: bool,
    transcript: Mutex<Vec<TranscriptEntry>>,
}

impl Default for LocalChannel {
    fn default() -> Self {
        Self::new(DEFAULT_GM)
    }
}

impl LocalChannel {
    pub fn new(gm: &str) -> Self {
        Self {
            gm: gm.to_string(),
            confirm: true,
            transcript: Mutex::new(Vec::new()),
        }
    }

    /// Answer every confirmation with `answer`
    pub fn confirming(mut self, answer: bool) -> Self {
        self.confirm = answer;
        self
    }

    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.transcript.lock().clone()
    }

    /// Text of every chat message so far
    pub fn chat_lines(&self) -> Vec<String> {
        self.transcript
            .lock()
            .iter()
            .filter_map(|e| match e {
                TranscriptEntry::Chat(m) => Some(m.text.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Channel for LocalChannel {
    async fn send_roll_request(&self, request: RollRequest) -> Result<RollResult, ChannelError> {
        let result = request.roll(request.roller(&self.gm));
        debug!("Rolled {} for {}: {}", request.label, result.issuer_id, result.total());
        self.transcript.lock().push(TranscriptEntry::Roll {
            request,
            result: result.clone(),
        });
        Ok(result)
    }

    async fn send_chat_message(&self, message: ChatMessage) -> Result<(), ChannelError> {
        debug!("Chat: {}", message.text);
        self.transcript.lock().push(TranscriptEntry::Chat(message));
        Ok(())
    }

    async fn request_confirmation(
        &self,
        request: ConfirmationRequest,
    ) -> Result<bool, ChannelError> {
        let answer = self.confirm;
        self.transcript
            .lock()
            .push(TranscriptEntry::Confirmation { request, answer });
        Ok(answer)
    }
}
