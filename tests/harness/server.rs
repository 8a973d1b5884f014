//! TestServer - True end-to-end test harness
//!
//! Spawns the actual vttd binary on a random port, seeded from a world file
//! in a temporary directory, and exercises it over HTTP and WebSocket.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use anyhow::{bail, Result};
use reqwest::Client;
use serde_json::Value;
use tempfile::{NamedTempFile, TempDir};

use super::client::Participant;
use super::world::TestWorld;

/// Test harness that spawns the actual vttd binary on a random port
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    child: Child,
    /// Working directory and world file (cleaned up on drop)
    _temp_dir: TempDir,
    _world: NamedTempFile,
}

impl TestServer {
    /// Start a server seeded with the standard test world
    pub async fn start() -> Result<Self> {
        Self::start_with_env(&[]).await
    }

    /// Start a server that never rolls for absent participants and gives up
    /// on unanswered rolls after `timeout_ms`
    pub async fn start_strict(timeout_ms: u64) -> Result<Self> {
        let timeout = timeout_ms.to_string();
        Self::start_with_env(&[
            ("VTTD_AUTO_ROLL_ABSENT", "false"),
            ("VTTD_ROLL_TIMEOUT_MS", timeout.as_str()),
        ])
        .await
    }

    /// Start a server with extra `VTTD_` environment
    pub async fn start_with_env(env: &[(&str, &str)]) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let world = TestWorld::write()?;

        // Find a random available port
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        let child = Command::new(env!("CARGO_BIN_EXE_vttd"))
            .current_dir(temp_dir.path())
            .arg("--bind")
            .arg(addr.to_string())
            .arg("--world")
            .arg(world.path())
            .envs(env.iter().copied())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        let mut server = Self {
            addr,
            client,
            child,
            _temp_dir: temp_dir,
            _world: world,
        };

        // Poll until server is ready
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if server.get("/health").await.is_ok() {
                return Ok(server);
            }
        }
        let _ = server.child.kill();
        bail!("Server failed to start within 5 seconds")
    }

    /// Get the base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// Make a POST request with JSON body
    pub async fn post<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await?)
    }

    /// Fetch a live document as JSON
    pub async fn document(&self, id: &str) -> Result<Value> {
        let resp = self.get(&format!("/documents/{}", id)).await?;
        if !resp.status().is_success() {
            bail!("GET /documents/{} returned {}", id, resp.status());
        }
        Ok(resp.json().await?)
    }

    /// Current hit points of a document
    pub async fn hit_points(&self, id: &str) -> Result<i64> {
        let doc = self.document(id).await?;
        doc["state"]["hit_points"]["current"]
            .as_i64()
            .ok_or_else(|| anyhow::anyhow!("{} has no hit points", id))
    }

    /// Get the WebSocket URL for a participant
    pub fn ws_url(&self, participant: &str) -> String {
        format!("ws://{}/ws?participant={}", self.addr, participant)
    }

    /// Connect a participant
    pub async fn connect(&self, participant: &str) -> Result<Participant> {
        Participant::connect(self, participant).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Kill the server process
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
