//! Live game state, scoped drafts, and optimistic merge
//!
//! `checkout` copies only the documents an action may touch. `commit`
//! writes the changed documents back under one write lock, refusing the
//! whole merge if any of them changed in the live state since checkout.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{Document, DocumentId, Encounter, GameState};

/// SHA-256 of a document's canonical JSON form
pub fn fingerprint(doc: &Document) -> String {
    let bytes = serde_json::to_vec(doc).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}

/// Errors from merging a draft back into the live state
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("document {0} was modified concurrently")]
    Conflict(DocumentId),

    #[error("document {0} was deleted concurrently")]
    Deleted(DocumentId),
}

/// Summary of a successful merge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub updated: Vec<DocumentId>,
}

/// Which documents an action may read and write
#[derive(Debug, Clone, Default)]
pub struct DraftScope {
    ids: BTreeSet<DocumentId>,
    carriers: BTreeSet<DocumentId>,
}

impl DraftScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Include one document
    pub fn with(mut self, id: &str) -> Self {
        self.ids.insert(id.to_string());
        self
    }

    /// Include a document and everything it carries
    pub fn with_carrier(mut self, id: &str) -> Self {
        self.ids.insert(id.to_string());
        self.carriers.insert(id.to_string());
        self
    }

    fn admits(&self, doc: &Document) -> bool {
        self.ids.contains(&doc.id)
            || doc
                .parent_id
                .as_ref()
                .is_some_and(|p| self.carriers.contains(p))
    }
}

/// Isolated working copy of the documents in scope
#[derive(Debug, Clone)]
pub struct Draft {
    state: GameState,
    base: BTreeMap<DocumentId, String>,
}

impl Draft {
    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    /// Documents whose content differs from checkout
    pub fn changed_documents(&self) -> Vec<DocumentId> {
        self.state
            .documents
            .values()
            .filter(|doc| self.base.get(&doc.id) != Some(&fingerprint(doc)))
            .map(|doc| doc.id.clone())
            .collect()
    }
}

/// Startup seed file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldSeed {
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub encounter: Option<Encounter>,
}

impl From<WorldSeed> for GameState {
    fn from(seed: WorldSeed) -> Self {
        let mut state = GameState::new();
        for doc in seed.documents {
            state.insert(doc);
        }
        state.encounter = seed.encounter;
        state
    }
}

/// Authoritative game state
#[derive(Debug, Default)]
pub struct GameStore {
    live: RwLock<GameState>,
}

impl GameStore {
    pub fn new(state: GameState) -> Self {
        Self {
            live: RwLock::new(state),
        }
    }

    /// Create a shared instance
    pub fn shared(state: GameState) -> Arc<Self> {
        Arc::new(Self::new(state))
    }

    /// Load a store from a JSON world seed file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read world file {}", path.display()))?;
        let seed: WorldSeed = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse world file {}", path.display()))?;
        info!(
            "Loaded {} documents from {}",
            seed.documents.len(),
            path.display()
        );
        Ok(Self::new(seed.into()))
    }

    /// Get a copy of a live document
    pub async fn get(&self, id: &str) -> Option<Document> {
        self.live.read().await.document(id).cloned()
    }

    /// Number of live documents
    pub async fn len(&self) -> usize {
        self.live.read().await.documents.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Insert or replace a live document
    pub async fn insert(&self, doc: Document) {
        self.live.write().await.insert(doc);
    }

    /// Copy the documents in scope (and the encounter) into a draft
    pub async fn checkout(&self, scope: &DraftScope) -> Draft {
        let live = self.live.read().await;
        let mut state = GameState::new();
        let mut base = BTreeMap::new();

        for doc in live.documents.values().filter(|d| scope.admits(d)) {
            base.insert(doc.id.clone(), fingerprint(doc));
            state.insert(doc.clone());
        }
        state.encounter = live.encounter.clone();

        debug!("Checked out draft with {} documents", base.len());
        Draft { state, base }
    }

    /// Merge a draft back atomically
    ///
    /// The encounter is read-only during actions and is not merged.
    pub async fn commit(&self, draft: Draft) -> Result<MergeReport, MergeError> {
        let changed = draft.changed_documents();
        let mut live = self.live.write().await;

        for id in &changed {
            match (draft.base.get(id), live.document(id)) {
                (Some(base), Some(current)) => {
                    if &fingerprint(current) != base {
                        warn!("Merge conflict on document {}", id);
                        return Err(MergeError::Conflict(id.clone()));
                    }
                }
                (Some(_), None) => return Err(MergeError::Deleted(id.clone())),
                (None, Some(_)) => return Err(MergeError::Conflict(id.clone())),
                (None, None) => {}
            }
        }

        let Draft { mut state, .. } = draft;
        for id in &changed {
            if let Some(doc) = state.documents.remove(id) {
                live.insert(doc);
            }
        }

        debug!("Merged {} documents", changed.len());
        Ok(MergeReport { updated: changed })
    }
}
