//! WebSocket transport for participants
//!
//! Each connection registers under the participant id given in the
//! `?participant=` query. The socket carries roll and confirmation requests
//! out and their replies back in; replies are matched to the waiting action
//! by request id in the [`SocketChannel`](super::SocketChannel).

use std::collections::HashMap;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use super::AppState;
use crate::actions::{ActionOutcome, ActionRequest};
use crate::channel::{ChatMessage, ConfirmationRequest, RollRequest};
use crate::combat::DiceGroup;

/// A connected participant
#[derive(Debug)]
pub struct ParticipantSession {
    pub participant_id: String,
    /// Distinguishes a reconnect from the connection it replaced
    pub connection_id: String,
    pub sender: mpsc::Sender<ServerMessage>,
}

/// Connection manager for all active WebSocket connections
#[derive(Default)]
pub struct ConnectionManager {
    sessions: RwLock<HashMap<String, ParticipantSession>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a participant; a newer connection replaces an older one
    pub async fn register(&self, session: ParticipantSession) {
        let participant_id = session.participant_id.clone();
        if self
            .sessions
            .write()
            .await
            .insert(participant_id.clone(), session)
            .is_some()
        {
            info!("Participant {} reconnected", participant_id);
        }
    }

    /// Remove a participant if `connection_id` is still its live connection
    pub async fn unregister(&self, participant_id: &str, connection_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        let current = sessions
            .get(participant_id)
            .is_some_and(|s| s.connection_id == connection_id);
        if current {
            sessions.remove(participant_id);
        }
        current
    }

    pub async fn is_connected(&self, participant_id: &str) -> bool {
        self.sessions.read().await.contains_key(participant_id)
    }

    /// Ids of every connected participant, sorted
    pub async fn participants(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    async fn get_sender(&self, participant_id: &str) -> Option<mpsc::Sender<ServerMessage>> {
        self.sessions
            .read()
            .await
            .get(participant_id)
            .map(|s| s.sender.clone())
    }

    /// Send a message to one participant; false if it could not be queued
    pub async fn send_to(&self, participant_id: &str, msg: ServerMessage) -> bool {
        let Some(sender) = self.get_sender(participant_id).await else {
            return false;
        };
        if sender.send(msg).await.is_err() {
            warn!("Failed to send message to participant {}", participant_id);
            return false;
        }
        true
    }

    /// Queue a message for one participant without waiting for room
    ///
    /// A full queue drops the message; chat and errors must never hold up
    /// the sender behind a slow socket.
    pub async fn notify(&self, participant_id: &str, msg: ServerMessage) -> bool {
        let Some(sender) = self.get_sender(participant_id).await else {
            return false;
        };
        Self::offer(participant_id, &sender, msg)
    }

    /// Queue a message for every connected participant, dropping it for any
    /// whose queue is full
    pub async fn broadcast(&self, msg: ServerMessage) {
        let senders: Vec<(String, mpsc::Sender<ServerMessage>)> = self
            .sessions
            .read()
            .await
            .values()
            .map(|s| (s.participant_id.clone(), s.sender.clone()))
            .collect();
        for (participant_id, sender) in senders {
            Self::offer(&participant_id, &sender, msg.clone());
        }
    }

    fn offer(participant_id: &str, sender: &mpsc::Sender<ServerMessage>, msg: ServerMessage) -> bool {
        match sender.try_send(msg) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Queue full for participant {}, message dropped", participant_id);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Failed to send message to participant {}", participant_id);
                false
            }
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once on connect
    Welcome { participant_id: String },
    /// Roll these dice and answer with `roll_result`
    RollRequest { request: RollRequest },
    /// Answer with `confirmation`
    ConfirmationRequest { request: ConfirmationRequest },
    Chat { message: ChatMessage },
    /// Outcome of an action this participant submitted
    ActionResult { outcome: ActionOutcome },
    Error { message: String },
}

/// Messages sent from client to server
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    RollResult {
        request_id: String,
        dice_groups: Vec<DiceGroup>,
        #[serde(default)]
        custom_modifier: i32,
    },
    Confirmation {
        request_id: String,
        answer: bool,
    },
    SubmitAction {
        action: ActionRequest,
    },
    /// Keep the connection alive
    Ping,
}

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub participant: Option<String>,
}

/// Handle WebSocket upgrade
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let participant_id = params
        .participant
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| format!("guest-{}", uuid::Uuid::new_v4()));
    ws.on_upgrade(move |socket| handle_socket(socket, state, participant_id))
}

/// Handle an individual WebSocket connection
async fn handle_socket(mut socket: WebSocket, state: AppState, participant_id: String) {
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(32);
    let connection_id = uuid::Uuid::new_v4().to_string();

    info!("WebSocket connected: {}", participant_id);
    state
        .connections
        .register(ParticipantSession {
            participant_id: participant_id.clone(),
            connection_id: connection_id.clone(),
            sender: tx,
        })
        .await;

    let welcome = ServerMessage::Welcome {
        participant_id: participant_id.clone(),
    };
    if let Ok(json) = serde_json::to_string(&welcome) {
        let _ = socket.send(Message::Text(json.into())).await;
    }

    loop {
        tokio::select! {
            Some(msg) = rx.recv() => {
                if let Ok(json) = serde_json::to_string(&msg) {
                    if socket.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
            }
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                handle_client_message(&state, &participant_id, client_msg).await;
                            }
                            Err(e) => {
                                debug!("Unreadable message from {}: {}", participant_id, e);
                                state
                                    .connections
                                    .notify(
                                        &participant_id,
                                        ServerMessage::Error {
                                            message: format!("Unreadable message: {}", e),
                                        },
                                    )
                                    .await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }

    if state
        .connections
        .unregister(&participant_id, &connection_id)
        .await
    {
        state.channel.abandon(&participant_id);
    }
    info!("WebSocket disconnected: {}", participant_id);
}

/// Handle a message from the client
async fn handle_client_message(state: &AppState, participant_id: &str, msg: ClientMessage) {
    match msg {
        ClientMessage::RollResult {
            request_id,
            dice_groups,
            custom_modifier,
        } => {
            let resolved =
                state
                    .channel
                    .resolve_roll(participant_id, &request_id, dice_groups, custom_modifier);
            if let Err(e) = resolved {
                state
                    .connections
                    .notify(
                        participant_id,
                        ServerMessage::Error {
                            message: e.to_string(),
                        },
                    )
                    .await;
            }
        }
        ClientMessage::Confirmation { request_id, answer } => {
            state
                .channel
                .resolve_confirmation(participant_id, &request_id, answer);
        }
        ClientMessage::SubmitAction { mut action } => {
            action.issuer_id = participant_id.to_string();
            info!("Participant {} submits {}", participant_id, action.action_kind);

            // The action waits on replies that arrive through this same socket
            let state = state.clone();
            let participant_id = participant_id.to_string();
            tokio::spawn(async move {
                let outcome = state.executor.submit(action, state.channel.as_ref()).await;
                state
                    .connections
                    .send_to(&participant_id, ServerMessage::ActionResult { outcome })
                    .await;
            });
        }
        ClientMessage::Ping => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_messages_parse() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "roll_result",
            "request_id": "r1",
            "dice_groups": [{"faces": 20, "results": [17]}],
        }))
        .unwrap();
        assert!(matches!(
            msg,
            ClientMessage::RollResult { custom_modifier: 0, ref dice_groups, .. } if dice_groups.len() == 1
        ));

        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "submit_action",
            "action": {"action_kind": "long-rest", "parameters": {"character_id": "pc"}},
        }))
        .unwrap();
        let ClientMessage::SubmitAction { action } = msg else {
            panic!("expected submit_action");
        };
        assert_eq!(action.issuer_id, "");
        assert_eq!(action.character_id(), Some("pc"));
    }

    #[test]
    fn test_server_message_tags() {
        let value = serde_json::to_value(ServerMessage::Welcome {
            participant_id: "alice".to_string(),
        })
        .unwrap();
        assert_eq!(value, json!({"type": "welcome", "participant_id": "alice"}));
    }

    #[tokio::test]
    async fn test_stale_connection_does_not_unregister_replacement() {
        let manager = ConnectionManager::new();
        let (first, _rx1) = mpsc::channel(1);
        let (second, _rx2) = mpsc::channel(1);
        manager
            .register(ParticipantSession {
                participant_id: "alice".to_string(),
                connection_id: "c1".to_string(),
                sender: first,
            })
            .await;
        manager
            .register(ParticipantSession {
                participant_id: "alice".to_string(),
                connection_id: "c2".to_string(),
                sender: second,
            })
            .await;

        assert!(!manager.unregister("alice", "c1").await);
        assert!(manager.is_connected("alice").await);
        assert!(manager.unregister("alice", "c2").await);
        assert_eq!(manager.participants().await, Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_full_queue_does_not_block_broadcast() {
        let manager = ConnectionManager::new();
        let (stalled, _stalled_rx) = mpsc::channel(1);
        let (live, mut live_rx) = mpsc::channel(8);
        for (id, sender) in [("slow", stalled), ("bob", live)] {
            manager
                .register(ParticipantSession {
                    participant_id: id.to_string(),
                    connection_id: "c1".to_string(),
                    sender,
                })
                .await;
        }

        let note = |text: &str| ServerMessage::Error {
            message: text.to_string(),
        };
        let sent = tokio::time::timeout(std::time::Duration::from_secs(1), async {
            manager.broadcast(note("one")).await;
            manager.broadcast(note("two")).await;
            manager.notify("slow", note("three")).await
        })
        .await;
        assert_eq!(sent, Ok(false));

        assert!(matches!(live_rx.recv().await, Some(ServerMessage::Error { message }) if message == "one"));
        assert!(matches!(live_rx.recv().await, Some(ServerMessage::Error { message }) if message == "two"));
    }
}
