//! Documents and their canonical accessors
//!
//! A document is a character, actor, or item. Its `data` bag holds the
//! rules payload (abilities, armor class, weapon/spell definitions) and its
//! `state` bag holds runtime values that actions mutate (hit points,
//! conditions, death saves, per-turn flags, resources).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::combat::{ConditionSet, DamageDefenses, DeathSaves};

/// Unique document identifier
pub type DocumentId = String;

/// Free-form JSON bag, ordered so that fingerprints are stable
pub type Properties = BTreeMap<String, serde_json::Value>;

/// State bag keys
pub const HIT_POINTS: &str = "hit_points";
pub const CONDITIONS: &str = "conditions";
pub const DEATH_SAVES: &str = "death_saves";
pub const TURN: &str = "turn";
pub const HIT_DICE: &str = "hit_dice";
pub const SPELL_SLOTS: &str = "spell_slots";

/// Kind tag of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Player character
    Character,
    /// Non-player creature
    Actor,
    /// Weapon, spell, or other carried thing
    Item,
}

/// The six ability scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ability {
    Str,
    Dex,
    Con,
    Int,
    Wis,
    Cha,
}

impl Ability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ability::Str => "str",
            Ability::Dex => "dex",
            Ability::Con => "con",
            Ability::Int => "int",
            Ability::Wis => "wis",
            Ability::Cha => "cha",
        }
    }
}

impl FromStr for Ability {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "str" | "strength" => Ok(Ability::Str),
            "dex" | "dexterity" => Ok(Ability::Dex),
            "con" | "constitution" => Ok(Ability::Con),
            "int" | "intelligence" => Ok(Ability::Int),
            "wis" | "wisdom" => Ok(Ability::Wis),
            "cha" | "charisma" => Ok(Ability::Cha),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current and maximum hit points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    pub current: i32,
    pub max: i32,
}

/// Remaining hit dice for short rests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HitDice {
    pub remaining: u32,
    pub max: u32,
}

/// One spell slot level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SlotPool {
    pub max: u32,
    #[serde(default)]
    pub used: u32,
}

impl SlotPool {
    pub fn available(&self) -> u32 {
        self.max.saturating_sub(self.used)
    }
}

/// A character, actor, or item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub kind: DocumentKind,
    #[serde(default)]
    pub name: String,
    /// Participant that controls this document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// Document carrying this one (items)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<DocumentId>,
    /// Rules payload
    #[serde(default)]
    pub data: Properties,
    /// Runtime state bag
    #[serde(default)]
    pub state: Properties,
}

impl Document {
    /// Create an empty document
    pub fn new(id: &str, kind: DocumentKind, name: &str) -> Self {
        Self {
            id: id.to_string(),
            kind,
            name: name.to_string(),
            owner_id: None,
            parent_id: None,
            data: Properties::new(),
            state: Properties::new(),
        }
    }

    pub fn with_owner(mut self, owner_id: &str) -> Self {
        self.owner_id = Some(owner_id.to_string());
        self
    }

    pub fn with_parent(mut self, parent_id: &str) -> Self {
        self.parent_id = Some(parent_id.to_string());
        self
    }

    pub fn with_data(mut self, key: &str, value: serde_json::Value) -> Self {
        self.data.insert(key.to_string(), value);
        self
    }

    pub fn with_state(mut self, key: &str, value: serde_json::Value) -> Self {
        self.state.insert(key.to_string(), value);
        self
    }

    /// Whether this document can take part in combat
    pub fn is_creature(&self) -> bool {
        matches!(self.kind, DocumentKind::Character | DocumentKind::Actor)
    }

    /// Deserialize a typed value from the rules payload
    pub fn data_field<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.data.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Document {} has malformed data.{}: {}", self.id, key, e);
                None
            }
        }
    }

    /// Deserialize a typed value from the state bag
    pub fn state_field<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.state.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Document {} has malformed state.{}: {}", self.id, key, e);
                None
            }
        }
    }

    /// Serialize a typed value into the state bag
    pub fn set_state_field<T: Serialize>(&mut self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(v) => {
                self.state.insert(key.to_string(), v);
            }
            Err(e) => warn!("Failed to store state.{} on {}: {}", key, self.id, e),
        }
    }

    pub fn hit_points(&self) -> Option<HitPoints> {
        self.state_field(HIT_POINTS)
    }

    pub fn set_hit_points(&mut self, hp: HitPoints) {
        self.set_state_field(HIT_POINTS, &hp);
    }

    pub fn conditions(&self) -> ConditionSet {
        self.state_field(CONDITIONS).unwrap_or_default()
    }

    pub fn set_conditions(&mut self, conditions: &ConditionSet) {
        self.set_state_field(CONDITIONS, conditions);
    }

    pub fn death_saves(&self) -> DeathSaves {
        self.state_field(DEATH_SAVES).unwrap_or_default()
    }

    pub fn set_death_saves(&mut self, saves: DeathSaves) {
        self.set_state_field(DEATH_SAVES, &saves);
    }

    pub fn hit_dice(&self) -> Option<HitDice> {
        self.state_field(HIT_DICE)
    }

    pub fn set_hit_dice(&mut self, dice: HitDice) {
        self.set_state_field(HIT_DICE, &dice);
    }

    pub fn spell_slots(&self) -> BTreeMap<String, SlotPool> {
        self.state_field(SPELL_SLOTS).unwrap_or_default()
    }

    pub fn set_spell_slots(&mut self, slots: &BTreeMap<String, SlotPool>) {
        self.set_state_field(SPELL_SLOTS, slots);
    }

    /// Whether the "dead" condition is present
    pub fn is_dead(&self) -> bool {
        self.conditions().is_dead()
    }

    pub fn armor_class(&self) -> Option<i32> {
        self.data_field("armor_class")
    }

    pub fn defenses(&self) -> DamageDefenses {
        DamageDefenses::from_value(self.data.get("defenses"))
    }

    pub fn ability_score(&self, ability: Ability) -> i32 {
        self.data
            .get("abilities")
            .and_then(|a| a.get(ability.as_str()))
            .and_then(|v| v.as_i64())
            .map(|v| v as i32)
            .unwrap_or(10)
    }

    /// Ability modifier: floor((score - 10) / 2)
    pub fn ability_modifier(&self, ability: Ability) -> i32 {
        (self.ability_score(ability) - 10).div_euclid(2)
    }

    pub fn proficiency_bonus(&self) -> i32 {
        self.data_field("proficiency_bonus").unwrap_or(2)
    }

    /// Explicit save bonus if declared, else the ability modifier
    pub fn save_bonus(&self, ability: Ability) -> i32 {
        self.data
            .get("saves")
            .and_then(|s| s.get(ability.as_str()))
            .and_then(|v| v.as_i64())
            .map(|v| v as i32)
            .unwrap_or_else(|| self.ability_modifier(ability))
    }

    pub fn spellcasting_ability(&self) -> Ability {
        self.data
            .get("spellcasting_ability")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .unwrap_or(Ability::Int)
    }

    /// Faces of this creature's hit die (defaults to d8)
    pub fn hit_die(&self) -> u32 {
        self.data_field("hit_die").unwrap_or(8)
    }
}
