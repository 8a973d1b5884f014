//! vttd - virtual tabletop action resolution daemon
//!
//! Resolves turn-based tabletop actions (attacks, spells, damage, rests)
//! against a shared game state, asking participants for dice rolls over
//! WebSocket and continuing deterministically from what they roll.

pub mod actions;
pub mod api;
pub mod channel;
pub mod combat;
pub mod config;
pub mod rules;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use actions::{ActionExecutor, ActionRegistry};
use api::{AppState, ConnectionManager, SocketChannel};
pub use config::Config;
use state::{GameState, GameStore};

/// The vttd server instance
pub struct Server {
    config: Config,
    state: AppState,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a new server instance, loading the world seed if configured
    pub async fn new(config: Config) -> Result<Self> {
        let store = match &config.world_path {
            Some(path) => Arc::new(GameStore::load(path)?),
            None => GameStore::shared(GameState::new()),
        };
        let registry = ActionRegistry::shared();
        registry.install(&rules::Dnd5e).await;

        let connections = Arc::new(ConnectionManager::new());
        let channel = Arc::new(SocketChannel::new(connections.clone(), &config));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            state: AppState {
                executor: ActionExecutor::new(store, registry),
                connections,
                channel,
            },
            config,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Get the action executor
    pub fn executor(&self) -> &ActionExecutor {
        &self.state.executor
    }

    /// Build the router
    fn router(&self) -> Router {
        api::router(self.state.clone())
    }

    /// Run the server until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("vttd listening on {}", local_addr);

        let router = self.router();
        let mut shutdown_rx = self.shutdown_rx.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await?;

        info!("vttd shutdown complete");
        Ok(())
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
