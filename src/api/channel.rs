//! Channel over participant WebSockets
//!
//! A request is parked on a oneshot under its id, sent to the participant,
//! and resumed when the matching reply comes back through the socket.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::websocket::{ConnectionManager, ServerMessage};
use crate::channel::{
    Channel, ChannelError, ChatMessage, ConfirmationRequest, LocalChannel, RollRequest,
};
use crate::combat::dice::MAX_CUSTOM_MODIFIER;
use crate::combat::{DiceGroup, Recipients, RollResult};
use crate::config::Config;

enum Pending {
    Roll {
        request: RollRequest,
        roller: String,
        reply: oneshot::Sender<RollResult>,
    },
    Confirmation {
        participant: String,
        reply: oneshot::Sender<bool>,
    },
}

impl Pending {
    fn participant(&self) -> &str {
        match self {
            Pending::Roll { roller, .. } => roller,
            Pending::Confirmation { participant, .. } => participant,
        }
    }
}

/// A roll that has been sent and not yet answered
struct Parked {
    id: String,
    roller: String,
    reply: oneshot::Receiver<RollResult>,
}

pub struct SocketChannel {
    connections: Arc<ConnectionManager>,
    gm: String,
    timeout: Option<Duration>,
    /// Rolls for participants with no connection, when enabled
    fallback: Option<LocalChannel>,
    pending: Mutex<HashMap<String, Pending>>,
}

impl SocketChannel {
    pub fn new(connections: Arc<ConnectionManager>, config: &Config) -> Self {
        Self {
            connections,
            gm: config.gm_participant.clone(),
            timeout: config.roll_timeout(),
            fallback: config
                .auto_roll_absent
                .then(|| LocalChannel::new(&config.gm_participant)),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Number of requests waiting for a reply
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Send a roll request and park it; `Err` carries a result or failure
    /// that needs no waiting
    async fn dispatch_roll(
        &self,
        request: RollRequest,
    ) -> Result<Parked, Result<RollResult, ChannelError>> {
        let roller = request.roller(&self.gm).to_string();
        if !self.connections.is_connected(&roller).await {
            return Err(self.roll_absent(request, roller).await);
        }

        let id = request.id.clone();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(
            id.clone(),
            Pending::Roll {
                request: request.clone(),
                roller: roller.clone(),
                reply: tx,
            },
        );
        debug!("Roll {} sent to {}", id, roller);
        if !self
            .connections
            .send_to(&roller, ServerMessage::RollRequest { request })
            .await
        {
            self.pending.lock().remove(&id);
            return Err(Err(ChannelError::NotConnected(roller)));
        }
        Ok(Parked {
            id,
            roller,
            reply: rx,
        })
    }

    async fn roll_absent(
        &self,
        request: RollRequest,
        roller: String,
    ) -> Result<RollResult, ChannelError> {
        match &self.fallback {
            Some(local) => {
                info!("{} is not connected, rolling {} on the server", roller, request.label);
                local.send_roll_request(request).await
            }
            None => Err(ChannelError::NotConnected(roller)),
        }
    }

    /// Wait for a parked reply, honoring the configured timeout
    async fn wait<T>(
        &self,
        id: &str,
        participant: &str,
        reply: oneshot::Receiver<T>,
    ) -> Result<T, ChannelError> {
        let received = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, reply).await {
                Ok(received) => received,
                Err(_) => {
                    self.pending.lock().remove(id);
                    warn!("Timed out waiting for {} to answer {}", participant, id);
                    return Err(ChannelError::Timeout(participant.to_string()));
                }
            },
            None => reply.await,
        };
        // A dropped sender means the participant went away
        received.map_err(|_| ChannelError::NotConnected(participant.to_string()))
    }

    /// Complete a pending roll with faces from `participant`
    ///
    /// A reply with the wrong dice is refused and the request stays pending
    /// so the participant can answer again.
    pub fn resolve_roll(
        &self,
        participant: &str,
        request_id: &str,
        dice_groups: Vec<DiceGroup>,
        custom_modifier: i32,
    ) -> Result<(), ChannelError> {
        let mut pending = self.pending.lock();
        let Some(Pending::Roll {
            request, roller, ..
        }) = pending.get(request_id)
        else {
            warn!("Ignoring roll result for unknown request {}", request_id);
            return Ok(());
        };
        if roller != participant {
            warn!(
                "{} answered roll {} addressed to {}",
                participant, request_id, roller
            );
            return Err(ChannelError::InvalidResponse(format!(
                "roll {} is not yours",
                request_id
            )));
        }
        request.validate_groups(&dice_groups)?;
        if custom_modifier.unsigned_abs() > MAX_CUSTOM_MODIFIER.unsigned_abs() {
            return Err(ChannelError::InvalidResponse(format!(
                "custom modifier {} out of range",
                custom_modifier
            )));
        }

        if let Some(Pending::Roll { request, reply, .. }) = pending.remove(request_id) {
            let result = request
                .fulfill(participant, dice_groups)
                .with_custom_modifier(custom_modifier);
            if reply.send(result).is_err() {
                debug!("Roll {} answered after its action gave up", request_id);
            }
        }
        Ok(())
    }

    /// Complete a pending confirmation
    pub fn resolve_confirmation(&self, participant: &str, request_id: &str, answer: bool) {
        let mut pending = self.pending.lock();
        match pending.get(request_id) {
            Some(Pending::Confirmation { participant: p, .. }) if p == participant => {}
            Some(_) => {
                warn!("{} answered confirmation {} not addressed to them", participant, request_id);
                return;
            }
            None => {
                warn!("Ignoring confirmation for unknown request {}", request_id);
                return;
            }
        }
        if let Some(Pending::Confirmation { reply, .. }) = pending.remove(request_id) {
            let _ = reply.send(answer);
        }
    }

    /// Drop every request waiting on a participant that disconnected
    pub fn abandon(&self, participant: &str) {
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|_, p| p.participant() != participant);
        let dropped = before - pending.len();
        if dropped > 0 {
            info!("Dropped {} requests waiting on {}", dropped, participant);
        }
    }
}

#[async_trait]
impl Channel for SocketChannel {
    async fn send_roll_request(&self, request: RollRequest) -> Result<RollResult, ChannelError> {
        match self.dispatch_roll(request).await {
            Ok(parked) => self.wait(&parked.id, &parked.roller, parked.reply).await,
            Err(settled) => settled,
        }
    }

    /// Sends every request before waiting on any, so participants roll
    /// in parallel
    async fn send_multiple_roll_requests(
        &self,
        requests: Vec<RollRequest>,
    ) -> Vec<Result<RollResult, ChannelError>> {
        let mut dispatched = Vec::with_capacity(requests.len());
        for request in requests {
            dispatched.push(self.dispatch_roll(request).await);
        }
        let mut results = Vec::with_capacity(dispatched.len());
        for entry in dispatched {
            results.push(match entry {
                Ok(parked) => self.wait(&parked.id, &parked.roller, parked.reply).await,
                Err(settled) => settled,
            });
        }
        results
    }

    async fn send_chat_message(&self, message: ChatMessage) -> Result<(), ChannelError> {
        let speaker = message.speaker.clone();
        match message.recipients {
            Recipients::Public => {
                self.connections
                    .broadcast(ServerMessage::Chat { message })
                    .await;
            }
            Recipients::Gm => {
                self.connections
                    .notify(&self.gm, ServerMessage::Chat { message })
                    .await;
            }
            Recipients::SelfOnly => {
                let target = speaker.unwrap_or_else(|| self.gm.clone());
                self.connections
                    .notify(&target, ServerMessage::Chat { message })
                    .await;
            }
        }
        Ok(())
    }

    async fn request_confirmation(
        &self,
        request: ConfirmationRequest,
    ) -> Result<bool, ChannelError> {
        let participant = request
            .participant_id
            .clone()
            .unwrap_or_else(|| self.gm.clone());
        if !self.connections.is_connected(&participant).await {
            return match &self.fallback {
                Some(local) => local.request_confirmation(request).await,
                None => Err(ChannelError::NotConnected(participant)),
            };
        }

        let id = request.id.clone();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(
            id.clone(),
            Pending::Confirmation {
                participant: participant.clone(),
                reply: tx,
            },
        );
        if !self
            .connections
            .send_to(&participant, ServerMessage::ConfirmationRequest { request })
            .await
        {
            self.pending.lock().remove(&id);
            return Err(ChannelError::NotConnected(participant));
        }
        self.wait(&id, &participant, rx).await
    }
}
