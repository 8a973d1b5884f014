//! Turn economy
//!
//! Each creature's `state.turn.actions_used` records which action slots it
//! has spent this turn. Spending a slot twice is an error; clearing the set
//! is left to whoever advances the turn order.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::state::{Document, TURN};

/// A named per-turn action allowance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnSlot {
    Action,
    Bonus,
    Reaction,
}

impl TurnSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnSlot::Action => "action",
            TurnSlot::Bonus => "bonus",
            TurnSlot::Reaction => "reaction",
        }
    }
}

impl FromStr for TurnSlot {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "action" => Ok(TurnSlot::Action),
            "bonus" | "bonus_action" | "bonus-action" => Ok(TurnSlot::Bonus),
            "reaction" => Ok(TurnSlot::Reaction),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TurnSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Slots spent during the current turn
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnState {
    #[serde(default)]
    pub actions_used: BTreeSet<TurnSlot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnError {
    #[error("{0} already used this turn")]
    SlotSpent(TurnSlot),
}

fn turn_state(doc: &Document) -> TurnState {
    doc.state_field(TURN).unwrap_or_default()
}

/// Whether a slot is still unspent
pub fn slot_available(doc: &Document, slot: TurnSlot) -> bool {
    !turn_state(doc).actions_used.contains(&slot)
}

/// Mark a slot spent, refusing if it already is
pub fn consume_slot(doc: &mut Document, slot: TurnSlot) -> Result<(), TurnError> {
    let mut turn = turn_state(doc);
    if !turn.actions_used.insert(slot) {
        return Err(TurnError::SlotSpent(slot));
    }
    debug!("{} spends its {}", doc.id, slot);
    doc.set_state_field(TURN, &turn);
    Ok(())
}

/// Clear all spent slots at the start of a turn
pub fn reset_turn(doc: &mut Document) {
    doc.set_state_field(TURN, &TurnState::default());
}
