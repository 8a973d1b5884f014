//! Dice notation and roll results
//!
//! Parses notation like "2d6+3", "1d20", "4d6-2" and models what comes back
//! from whoever performed a roll: one or more groups of raw faces, free-form
//! arguments (custom modifier, advantage mode, declared modifiers), and
//! metadata.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::Properties;

/// Rule argument holding declared numeric modifiers (`{name: int}`)
pub const MODIFIERS_ARG: &str = "modifiers";
/// Rule argument holding the advantage mode
pub const ADVANTAGE_ARG: &str = "advantage_mode";
/// Rule argument holding the roll kind
pub const ROLL_KIND_ARG: &str = "roll_kind";

/// Most dice one notation may ask for
pub const MAX_DICE_COUNT: u32 = 1000;
/// Largest die one notation may ask for
pub const MAX_DIE_SIDES: u32 = 1000;
/// Largest custom modifier a roller may attach to a result
pub const MAX_CUSTOM_MODIFIER: i32 = 1000;

static DICE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d*)d(\d+)(?:([+-])(\d+))?$").unwrap());

/// Errors from parsing dice notation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("invalid dice notation: {0}")]
    InvalidNotation(String),

    #[error("dice count must be at least 1")]
    ZeroCount,

    #[error("die sides must be at least 1")]
    ZeroSides,

    #[error("too many dice in {0}")]
    TooMany(String),
}

/// A parsed dice roll specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DiceRoll {
    /// Number of dice to roll
    pub count: u32,
    /// Number of sides per die
    pub sides: u32,
    /// Modifier to add/subtract
    pub modifier: i32,
}

impl DiceRoll {
    /// Create a new dice roll
    pub fn new(count: u32, sides: u32, modifier: i32) -> Self {
        Self {
            count,
            sides,
            modifier,
        }
    }

    /// Same roll with an extra flat bonus
    pub fn plus(&self, bonus: i32) -> Self {
        Self {
            modifier: self.modifier.saturating_add(bonus),
            ..self.clone()
        }
    }

    /// Critical version: dice count doubled, modifier unchanged
    pub fn critical(&self) -> Self {
        Self {
            count: self.count.saturating_mul(2),
            ..self.clone()
        }
    }

    /// Roll the dice and return the raw faces
    pub fn roll_group(&self) -> DiceGroup {
        let mut rng = rand::rng();
        let results = (0..self.count)
            .map(|_| rng.random_range(1..=self.sides))
            .collect();
        DiceGroup {
            faces: self.sides,
            results,
        }
    }

    /// Roll and return the total including the modifier
    pub fn roll(&self) -> i32 {
        self.roll_group().sum().saturating_add(self.modifier)
    }
}

impl FromStr for DiceRoll {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_dice(s)
    }
}

impl TryFrom<String> for DiceRoll {
    type Error = DiceError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        parse_dice(&s)
    }
}

impl From<DiceRoll> for String {
    fn from(roll: DiceRoll) -> Self {
        roll.to_string()
    }
}

impl fmt::Display for DiceRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifier > 0 {
            write!(f, "{}d{}+{}", self.count, self.sides, self.modifier)
        } else if self.modifier < 0 {
            write!(f, "{}d{}{}", self.count, self.sides, self.modifier)
        } else {
            write!(f, "{}d{}", self.count, self.sides)
        }
    }
}

/// Parse a dice notation string like "2d6+3"
pub fn parse_dice(notation: &str) -> Result<DiceRoll, DiceError> {
    let compact: String = notation
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    let caps = DICE_REGEX
        .captures(&compact)
        .ok_or_else(|| DiceError::InvalidNotation(notation.to_string()))?;

    let invalid = || DiceError::InvalidNotation(notation.to_string());

    // "d6" means "1d6"
    let count: u32 = match &caps[1] {
        "" => 1,
        c => c.parse().map_err(|_| invalid())?,
    };
    let sides: u32 = caps[2].parse().map_err(|_| invalid())?;
    let modifier: i32 = match (caps.get(3), caps.get(4)) {
        (Some(sign), Some(value)) => {
            let value: i32 = value.as_str().parse().map_err(|_| invalid())?;
            if sign.as_str() == "-" {
                -value
            } else {
                value
            }
        }
        _ => 0,
    };

    if count == 0 {
        return Err(DiceError::ZeroCount);
    }
    if sides == 0 {
        return Err(DiceError::ZeroSides);
    }
    if count > MAX_DICE_COUNT || sides > MAX_DIE_SIDES {
        return Err(DiceError::TooMany(notation.to_string()));
    }

    Ok(DiceRoll {
        count,
        sides,
        modifier,
    })
}

/// What a roll is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollKind {
    Attack,
    Damage,
    SavingThrow,
    AbilityCheck,
    Initiative,
    DeathSave,
    HitDie,
    Healing,
    Custom,
}

impl RollKind {
    /// Whether a natural 20 on this kind of roll is a critical hit
    pub fn is_crit_eligible(&self) -> bool {
        matches!(self, RollKind::Attack)
    }
}

impl fmt::Display for RollKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RollKind::Attack => "attack",
            RollKind::Damage => "damage",
            RollKind::SavingThrow => "saving throw",
            RollKind::AbilityCheck => "ability check",
            RollKind::Initiative => "initiative",
            RollKind::DeathSave => "death save",
            RollKind::HitDie => "hit die",
            RollKind::Healing => "healing",
            RollKind::Custom => "roll",
        };
        f.write_str(s)
    }
}

/// Faces rolled for one kind of die
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceGroup {
    /// Number of sides on each die in this group
    pub faces: u32,
    /// Raw rolled values
    pub results: Vec<u32>,
}

impl DiceGroup {
    pub fn new(faces: u32, results: Vec<u32>) -> Self {
        Self { faces, results }
    }

    pub fn sum(&self) -> i32 {
        self.results.iter().fold(0i32, |total, &r| {
            total.saturating_add(i32::try_from(r).unwrap_or(i32::MAX))
        })
    }
}

/// Who gets to see a roll or message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recipients {
    #[default]
    Public,
    Gm,
    #[serde(rename = "self")]
    SelfOnly,
}

/// Free-form roll arguments
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RollArguments {
    #[serde(default)]
    pub custom_modifier: i32,
    #[serde(default)]
    pub rule_args: Properties,
}

/// A completed roll, as produced by whoever rolled it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollResult {
    pub id: String,
    pub issuer_id: String,
    pub dice_groups: Vec<DiceGroup>,
    #[serde(default)]
    pub arguments: RollArguments,
    #[serde(default)]
    pub metadata: Properties,
    #[serde(default)]
    pub recipients: Recipients,
    #[serde(default = "Utc::now")]
    pub rolled_at: DateTime<Utc>,
}

impl RollResult {
    /// Build a result from known faces
    pub fn from_faces(issuer_id: &str, dice_groups: Vec<DiceGroup>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            issuer_id: issuer_id.to_string(),
            dice_groups,
            arguments: RollArguments::default(),
            metadata: Properties::new(),
            recipients: Recipients::Public,
            rolled_at: Utc::now(),
        }
    }

    pub fn with_custom_modifier(mut self, modifier: i32) -> Self {
        self.arguments.custom_modifier = modifier;
        self
    }

    pub fn with_rule_arg(mut self, key: &str, value: serde_json::Value) -> Self {
        self.arguments.rule_args.insert(key.to_string(), value);
        self
    }

    /// Sum of the declared numeric modifiers in `rule_args.modifiers`
    pub fn declared_modifiers(&self) -> i32 {
        self.arguments
            .rule_args
            .get(MODIFIERS_ARG)
            .and_then(|m| m.as_object())
            .map(|m| {
                let sum = m
                    .values()
                    .filter_map(|v| v.as_i64())
                    .fold(0i64, i64::saturating_add);
                sum.clamp(i32::MIN as i64, i32::MAX as i64) as i32
            })
            .unwrap_or(0)
    }

    /// First 20-sided group
    pub fn d20_group(&self) -> Option<&DiceGroup> {
        self.dice_groups.iter().find(|g| g.faces == 20)
    }

    /// Every die, every modifier
    pub fn total(&self) -> i32 {
        self.dice_groups
            .iter()
            .map(DiceGroup::sum)
            .fold(0i32, i32::saturating_add)
            .saturating_add(self.arguments.custom_modifier)
            .saturating_add(self.declared_modifiers())
    }
}
