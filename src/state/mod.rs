//! Game state aggregate
//!
//! Documents keyed by id plus the optional active encounter. Actions never
//! touch the live aggregate: they run against a scoped [`Draft`] that the
//! [`GameStore`] merges back atomically.

mod document;
mod encounter;
mod store;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use document::{
    Ability, Document, DocumentId, DocumentKind, HitDice, HitPoints, Properties, SlotPool,
    CONDITIONS, DEATH_SAVES, HIT_DICE, HIT_POINTS, SPELL_SLOTS, TURN,
};
pub use encounter::{Bounds, Encounter, Grid, Token};
pub use store::{fingerprint, Draft, DraftScope, GameStore, MergeError, MergeReport, WorldSeed};

/// Documents plus the active encounter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    #[serde(default)]
    pub documents: BTreeMap<DocumentId, Document>,
    #[serde(default)]
    pub encounter: Option<Encounter>,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a document
    pub fn document(&self, id: &str) -> Option<&Document> {
        self.documents.get(id)
    }

    /// Look up a document for mutation
    pub fn document_mut(&mut self, id: &str) -> Option<&mut Document> {
        self.documents.get_mut(id)
    }

    /// Insert or replace a document
    pub fn insert(&mut self, doc: Document) {
        self.documents.insert(doc.id.clone(), doc);
    }

    /// Documents carried by another document (items of a character)
    pub fn carried_by<'a>(&'a self, parent_id: &'a str) -> impl Iterator<Item = &'a Document> {
        self.documents
            .values()
            .filter(move |d| d.parent_id.as_deref() == Some(parent_id))
    }
}
