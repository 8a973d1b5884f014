//! Action handler registry
//!
//! Rule plugins register handlers under their kind string at startup; the
//! executor resolves a request's `action_kind` here at dispatch time.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use super::ActionHandler;

/// A rule system that contributes action handlers
pub trait RulePlugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// Handlers this plugin provides
    fn handlers(&self) -> Vec<Arc<dyn ActionHandler>>;
}

/// Registry mapping action kinds to handlers
#[derive(Default)]
pub struct ActionRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn ActionHandler>>>,
}

impl ActionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap in Arc for sharing
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a handler, replacing any previous one for its kind
    pub async fn register(&self, handler: Arc<dyn ActionHandler>) {
        let kind = handler.kind().to_string();
        if self
            .handlers
            .write()
            .await
            .insert(kind.clone(), handler)
            .is_some()
        {
            warn!("Replaced handler for action kind {}", kind);
        }
    }

    /// Register every handler of a plugin
    pub async fn install(&self, plugin: &dyn RulePlugin) {
        let handlers = plugin.handlers();
        let count = handlers.len();
        for handler in handlers {
            self.register(handler).await;
        }
        info!("Installed rule plugin {} ({} actions)", plugin.name(), count);
    }

    /// Resolve a kind to its handler
    pub async fn get(&self, kind: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.read().await.get(kind).cloned()
    }

    /// Registered kinds, sorted
    pub async fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.handlers.read().await.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}
