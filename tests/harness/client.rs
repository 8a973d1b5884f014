//! Participant - WebSocket client that plays one seat at the table
//!
//! Submits actions, answers roll requests with chosen faces, and answers
//! confirmations, the way a player's client would.

#![allow(dead_code)]

use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::server::TestServer;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// WebSocket test client connected as one participant
pub struct Participant {
    id: String,
    write: futures_util::stream::SplitSink<WsStream, Message>,
    read: futures_util::stream::SplitStream<WsStream>,
}

/// `(count, sides)` of dice notation like `2d6+3`
fn dice_shape(notation: &str) -> Result<(usize, u32)> {
    let (count, rest) = notation
        .split_once('d')
        .with_context(|| format!("bad dice notation {}", notation))?;
    let sides: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let count = if count.is_empty() { 1 } else { count.parse()? };
    Ok((count, sides.parse()?))
}

impl Participant {
    /// Connect and wait for the welcome message
    pub async fn connect(server: &TestServer, participant: &str) -> Result<Self> {
        let (ws_stream, _) = connect_async(server.ws_url(participant)).await?;
        let (write, read) = ws_stream.split();
        let mut client = Self {
            id: participant.to_string(),
            write,
            read,
        };

        let welcome = client.expect("welcome").await?;
        if welcome["participant_id"] != participant {
            bail!("welcomed as {:?}", welcome["participant_id"]);
        }
        Ok(client)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    async fn send_json(&mut self, msg: Value) -> Result<()> {
        self.write.send(Message::Text(msg.to_string().into())).await?;
        Ok(())
    }

    /// Submit an action over the socket
    pub async fn submit(&mut self, action: Value) -> Result<()> {
        self.send_json(json!({"type": "submit_action", "action": action}))
            .await
    }

    /// Send a ping message
    pub async fn send_ping(&mut self) -> Result<()> {
        self.send_json(json!({"type": "ping"})).await
    }

    /// Send raw text
    pub async fn send_raw(&mut self, text: &str) -> Result<()> {
        self.write.send(Message::Text(text.to_string().into())).await?;
        Ok(())
    }

    /// Answer a roll request with explicit dice groups
    pub async fn send_roll_result(&mut self, request_id: &str, dice_groups: Value) -> Result<()> {
        self.send_json(json!({
            "type": "roll_result",
            "request_id": request_id,
            "dice_groups": dice_groups,
        }))
        .await
    }

    /// Wait for the next roll request and answer it with `faces`, in dice order
    ///
    /// Returns the request that was answered.
    pub async fn answer_roll(&mut self, faces: &[u32]) -> Result<Value> {
        let msg = self.expect("roll_request").await?;
        let request = msg["request"].clone();

        let mut remaining = faces.iter().copied();
        let mut groups = Vec::new();
        for notation in request["dice"].as_array().into_iter().flatten() {
            let notation = notation.as_str().context("dice notation is not a string")?;
            let (count, sides) = dice_shape(notation)?;
            let results: Vec<u32> = remaining.by_ref().take(count).collect();
            if results.len() != count {
                bail!("not enough faces for {}", notation);
            }
            groups.push(json!({"faces": sides, "results": results}));
        }

        let request_id = request["id"].as_str().context("roll request has no id")?;
        self.send_roll_result(request_id, Value::Array(groups)).await?;
        Ok(request)
    }

    /// Wait for the next confirmation request and answer it
    pub async fn answer_confirmation(&mut self, answer: bool) -> Result<Value> {
        let msg = self.expect("confirmation_request").await?;
        let request = msg["request"].clone();
        let request_id = request["id"].as_str().context("confirmation has no id")?;
        self.send_json(json!({
            "type": "confirmation",
            "request_id": request_id,
            "answer": answer,
        }))
        .await?;
        Ok(request)
    }

    /// Wait for the outcome of an action this participant submitted
    pub async fn action_result(&mut self) -> Result<Value> {
        Ok(self.expect("action_result").await?["outcome"].clone())
    }

    /// Receive the next message as JSON
    pub async fn recv_json(&mut self) -> Result<Value> {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(serde_json::from_str(&text)?);
                }
                Some(Ok(Message::Close(_))) | None => {
                    bail!("WebSocket closed");
                }
                _ => continue, // Skip binary/ping/pong frames
            }
        }
    }

    /// Receive with timeout
    pub async fn recv_json_timeout(&mut self, timeout: Duration) -> Result<Value> {
        match tokio::time::timeout(timeout, self.recv_json()).await {
            Ok(result) => result,
            Err(_) => bail!("Timeout waiting for WebSocket message"),
        }
    }

    /// Wait for a message of a specific type
    pub async fn expect(&mut self, msg_type: &str) -> Result<Value> {
        self.expect_timeout(msg_type, Duration::from_secs(5)).await
    }

    /// Wait for a message of a specific type with timeout
    pub async fn expect_timeout(&mut self, msg_type: &str, timeout: Duration) -> Result<Value> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                bail!("Timeout waiting for message type '{}'", msg_type);
            }

            let msg = self.recv_json_timeout(remaining).await?;
            if msg["type"] == msg_type {
                return Ok(msg);
            }
        }
    }

    /// Collect chat text until nothing arrives for a moment
    pub async fn drain_chat(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(Ok(msg)) =
            tokio::time::timeout(Duration::from_millis(100), self.recv_json()).await
        {
            if msg["type"] == "chat" {
                if let Some(text) = msg["message"]["text"].as_str() {
                    lines.push(text.to_string());
                }
            }
        }
        lines
    }

    /// Close the connection
    pub async fn close(&mut self) -> Result<()> {
        self.write.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::dice_shape;

    #[test]
    fn test_dice_shape() {
        assert_eq!(dice_shape("2d20").unwrap(), (2, 20));
        assert_eq!(dice_shape("1d8+3").unwrap(), (1, 8));
        assert_eq!(dice_shape("d6-1").unwrap(), (1, 6));
    }
}
