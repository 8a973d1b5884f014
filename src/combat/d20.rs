//! D20 roll processing
//!
//! Turns a raw [`RollResult`] into a calculated total: picks the kept d20
//! face under advantage/disadvantage, adds every other group and modifier,
//! and flags natural 20s on crit-eligible rolls. Processing never mutates
//! state and never composes follow-ups; callers do that.

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use super::dice::{DiceGroup, DiceRoll, RollKind, RollResult, ADVANTAGE_ARG};
use crate::state::Properties;

/// Errors from processing a roll result
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RollError {
    #[error("roll {0} has no d20 group")]
    MissingD20(String),

    #[error("roll {0} has an empty d20 group")]
    EmptyD20(String),

    #[error("roll {roll} returned {got} dice groups, expected {expected}")]
    GroupMismatch {
        roll: String,
        expected: usize,
        got: usize,
    },
}

/// Which of two d20 faces to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvantageMode {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

impl AdvantageMode {
    /// Parse from a loose string, unknown values mean normal
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "advantage" | "adv" => AdvantageMode::Advantage,
            "disadvantage" | "dis" => AdvantageMode::Disadvantage,
            _ => AdvantageMode::Normal,
        }
    }

    /// Mode requested in a roll's rule arguments
    pub fn from_rule_args(args: &Properties) -> Self {
        args.get(ADVANTAGE_ARG)
            .and_then(|v| v.as_str())
            .map(Self::parse)
            .unwrap_or_default()
    }

    /// Advantage and disadvantage from different sources cancel out
    pub fn combine(self, other: AdvantageMode) -> AdvantageMode {
        match (self, other) {
            (AdvantageMode::Normal, x) | (x, AdvantageMode::Normal) => x,
            (a, b) if a == b => a,
            _ => AdvantageMode::Normal,
        }
    }

    /// The d20 dice to request for this mode
    pub fn dice(self) -> DiceRoll {
        match self {
            AdvantageMode::Normal => DiceRoll::new(1, 20, 0),
            _ => DiceRoll::new(2, 20, 0),
        }
    }
}

/// How a d20 result should be judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct D20Options {
    /// Natural 20 counts as a critical hit
    pub crit_eligible: bool,
    /// Any rolled d20 face of 20 crits, not only the kept one
    pub crit_on_any_face: bool,
}

impl D20Options {
    pub fn for_kind(kind: RollKind) -> Self {
        Self {
            crit_eligible: kind.is_crit_eligible(),
            crit_on_any_face: false,
        }
    }
}

/// A message, roll, or action to issue after a roll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FollowUp {
    ChatMessage {
        message: String,
        #[serde(default)]
        options: Properties,
    },
    RollRequest {
        issuer_id: Option<String>,
        roll_kind: RollKind,
        roll_spec: Vec<DiceRoll>,
    },
    ActionRequest {
        action_kind: String,
        #[serde(default)]
        parameters: Properties,
        #[serde(default)]
        options: Properties,
    },
}

impl FollowUp {
    pub fn chat(message: impl Into<String>) -> Self {
        FollowUp::ChatMessage {
            message: message.into(),
            options: Properties::new(),
        }
    }
}

/// A roll with its derived total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRollResult {
    pub calculated_total: i32,
    pub is_critical_hit: bool,
    #[serde(default)]
    pub processed_data: Properties,
    #[serde(default)]
    pub follow_up_actions: Vec<FollowUp>,
}

impl ProcessedRollResult {
    /// The kept d20 face
    pub fn natural(&self) -> Option<u32> {
        self.processed_data
            .get("natural")
            .and_then(|v| v.as_u64())
            .map(|v| v as u32)
    }

    pub fn is_critical_failure(&self) -> bool {
        self.processed_data
            .get("critical_failure")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn with_follow_up(mut self, follow_up: FollowUp) -> Self {
        self.follow_up_actions.push(follow_up);
        self
    }
}

/// Compute the total of a d20 roll
pub fn process(result: &RollResult, options: D20Options) -> Result<ProcessedRollResult, RollError> {
    let d20_index = result
        .dice_groups
        .iter()
        .position(|g| g.faces == 20)
        .ok_or_else(|| RollError::MissingD20(result.id.clone()))?;
    let d20 = &result.dice_groups[d20_index];
    let first = *d20
        .results
        .first()
        .ok_or_else(|| RollError::EmptyD20(result.id.clone()))?;

    let mode = AdvantageMode::from_rule_args(&result.arguments.rule_args);
    let natural = match (mode, d20.results.len()) {
        (AdvantageMode::Advantage, n) if n >= 2 => d20.results.iter().copied().max().unwrap_or(first),
        (AdvantageMode::Disadvantage, n) if n >= 2 => {
            d20.results.iter().copied().min().unwrap_or(first)
        }
        _ => first,
    };

    let others: i32 = result
        .dice_groups
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != d20_index)
        .map(|(_, g)| g.sum())
        .fold(0i32, i32::saturating_add);

    let calculated_total = (natural.min(i32::MAX as u32) as i32)
        .saturating_add(others)
        .saturating_add(result.declared_modifiers())
        .saturating_add(result.arguments.custom_modifier);

    let rolled_twenty = if options.crit_on_any_face {
        d20.results.contains(&20)
    } else {
        natural == 20
    };
    let is_critical_hit = options.crit_eligible && rolled_twenty;

    let mut processed_data = Properties::new();
    processed_data.insert("natural".to_string(), json!(natural));
    processed_data.insert("advantage_mode".to_string(), json!(mode));
    processed_data.insert("critical_failure".to_string(), json!(natural == 1));
    processed_data.insert("faces".to_string(), json!(d20.results));

    Ok(ProcessedRollResult {
        calculated_total,
        is_critical_hit,
        processed_data,
        follow_up_actions: Vec::new(),
    })
}

/// Split a damage roll into one total per requested formula
///
/// Group `i` belongs to formula `i`; its flat modifier is added to that
/// part, and the roller's custom modifier goes to the first part.
pub fn part_totals(result: &RollResult, formulas: &[DiceRoll]) -> Result<Vec<i32>, RollError> {
    if result.dice_groups.len() != formulas.len() {
        return Err(RollError::GroupMismatch {
            roll: result.id.clone(),
            expected: formulas.len(),
            got: result.dice_groups.len(),
        });
    }

    Ok(result
        .dice_groups
        .iter()
        .zip(formulas)
        .enumerate()
        .map(|(i, (group, formula)): (usize, (&DiceGroup, &DiceRoll))| {
            let custom = if i == 0 {
                result.arguments.custom_modifier
            } else {
                0
            };
            group
                .sum()
                .saturating_add(formula.modifier)
                .saturating_add(custom)
        })
        .collect())
}
