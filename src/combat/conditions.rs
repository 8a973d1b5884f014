//! Condition tags and death saves
//!
//! Conditions are a set of lowercase string tags on a document's state
//! bag. "dead" supersedes "unconscious" and "dying": inserting it removes
//! them, and they cannot be inserted while it is present.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::state::{Document, HitPoints};

pub const UNCONSCIOUS: &str = "unconscious";
pub const DYING: &str = "dying";
pub const DEAD: &str = "dead";
pub const STABLE: &str = "stable";

/// Set of condition tags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionSet(BTreeSet<String>);

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tag; returns whether the set changed
    pub fn insert(&mut self, tag: &str) -> bool {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            return false;
        }
        if tag == DEAD {
            let removed_unconscious = self.0.remove(UNCONSCIOUS);
            let removed_dying = self.0.remove(DYING);
            let removed_stable = self.0.remove(STABLE);
            let added = self.0.insert(tag);
            return added || removed_unconscious || removed_dying || removed_stable;
        }
        if self.is_dead() && matches!(tag.as_str(), UNCONSCIOUS | DYING | STABLE) {
            return false;
        }
        self.0.insert(tag)
    }

    /// Remove a tag; returns whether it was present
    pub fn remove(&mut self, tag: &str) -> bool {
        self.0.remove(&tag.trim().to_lowercase())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(&tag.trim().to_lowercase())
    }

    pub fn is_dead(&self) -> bool {
        self.0.contains(DEAD)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<'a> FromIterator<&'a str> for ConditionSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = ConditionSet::new();
        for tag in iter {
            set.insert(tag);
        }
        set
    }
}

/// Death saving throw counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeathSaves {
    pub successes: u8,
    pub failures: u8,
}

/// What a death save did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathSaveOutcome {
    Success,
    Failure,
    /// Three successes: no longer dying
    Stabilized,
    /// Three failures
    Died,
    /// Natural 20: back to 1 HP and conscious
    Revived,
}

/// Record one death saving throw from its natural d20 face
///
/// Natural 20 revives at 1 HP, natural 1 counts two failures, 10 or more
/// succeeds. Returns `None` if the document is not dying.
pub fn record_death_save(doc: &mut Document, natural: u32) -> Option<DeathSaveOutcome> {
    let mut conditions = doc.conditions();
    if conditions.is_dead() || !conditions.contains(DYING) {
        return None;
    }
    let mut saves = doc.death_saves();

    let outcome = if natural >= 20 {
        if let Some(hp) = doc.hit_points() {
            doc.set_hit_points(HitPoints {
                current: 1,
                max: hp.max,
            });
        }
        conditions.remove(DYING);
        conditions.remove(UNCONSCIOUS);
        saves = DeathSaves::default();
        DeathSaveOutcome::Revived
    } else {
        if natural == 1 {
            saves.failures = saves.failures.saturating_add(2);
        } else if natural >= 10 {
            saves.successes = saves.successes.saturating_add(1);
        } else {
            saves.failures = saves.failures.saturating_add(1);
        }

        if saves.failures >= 3 {
            conditions.insert(DEAD);
            DeathSaveOutcome::Died
        } else if saves.successes >= 3 {
            conditions.remove(DYING);
            conditions.insert(STABLE);
            saves = DeathSaves::default();
            DeathSaveOutcome::Stabilized
        } else if natural >= 10 {
            DeathSaveOutcome::Success
        } else {
            DeathSaveOutcome::Failure
        }
    };

    debug!("Death save for {}: {:?} ({:?})", doc.id, outcome, saves);
    doc.set_conditions(&conditions);
    doc.set_death_saves(saves);
    Some(outcome)
}
