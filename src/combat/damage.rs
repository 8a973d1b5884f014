//! Damage types, defenses, and damage resolution
//!
//! Handles damage calculation with:
//! - The thirteen d20 damage types
//! - Immunity (no damage)
//! - Resistance (half, rounded down)
//! - Vulnerability (double)
//! - Resistance and vulnerability together cancel out
//!
//! and the hit point / condition transitions that follow a hit.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::conditions::{DeathSaves, DEAD, DYING, STABLE, UNCONSCIOUS};
use crate::state::{Document, HitPoints};

/// Types of damage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageType {
    Acid,
    Bludgeoning,
    Cold,
    Fire,
    Force,
    Lightning,
    Necrotic,
    Piercing,
    Poison,
    Psychic,
    Radiant,
    Slashing,
    Thunder,
}

impl DamageType {
    /// Get all damage types
    pub fn all() -> &'static [DamageType] {
        &[
            DamageType::Acid,
            DamageType::Bludgeoning,
            DamageType::Cold,
            DamageType::Fire,
            DamageType::Force,
            DamageType::Lightning,
            DamageType::Necrotic,
            DamageType::Piercing,
            DamageType::Poison,
            DamageType::Psychic,
            DamageType::Radiant,
            DamageType::Slashing,
            DamageType::Thunder,
        ]
    }
}

impl FromStr for DamageType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "acid" => Ok(DamageType::Acid),
            "bludgeoning" => Ok(DamageType::Bludgeoning),
            "cold" | "ice" => Ok(DamageType::Cold),
            "fire" => Ok(DamageType::Fire),
            "force" => Ok(DamageType::Force),
            "lightning" | "electric" => Ok(DamageType::Lightning),
            "necrotic" => Ok(DamageType::Necrotic),
            "piercing" => Ok(DamageType::Piercing),
            "poison" => Ok(DamageType::Poison),
            "psychic" => Ok(DamageType::Psychic),
            "radiant" => Ok(DamageType::Radiant),
            "slashing" => Ok(DamageType::Slashing),
            "thunder" => Ok(DamageType::Thunder),
            _ => Err(()),
        }
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DamageType::Acid => "acid",
            DamageType::Bludgeoning => "bludgeoning",
            DamageType::Cold => "cold",
            DamageType::Fire => "fire",
            DamageType::Force => "force",
            DamageType::Lightning => "lightning",
            DamageType::Necrotic => "necrotic",
            DamageType::Piercing => "piercing",
            DamageType::Poison => "poison",
            DamageType::Psychic => "psychic",
            DamageType::Radiant => "radiant",
            DamageType::Slashing => "slashing",
            DamageType::Thunder => "thunder",
        };
        write!(f, "{}", s)
    }
}

/// Effective modifier for one damage type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageModifier {
    /// Immune - takes no damage
    Immune,
    /// Resistant - takes half damage (rounded down)
    Resistant,
    /// Normal - takes full damage
    Normal,
    /// Vulnerable - takes double damage
    Vulnerable,
}

impl DamageModifier {
    /// Apply this modifier to a damage amount
    pub fn apply(&self, damage: u32) -> u32 {
        match self {
            DamageModifier::Immune => 0,
            DamageModifier::Resistant => damage / 2,
            DamageModifier::Normal => damage,
            DamageModifier::Vulnerable => damage.saturating_mul(2),
        }
    }
}

/// A creature's immunities, resistances, and vulnerabilities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DamageDefenses {
    pub immunities: BTreeSet<DamageType>,
    pub resistances: BTreeSet<DamageType>,
    pub vulnerabilities: BTreeSet<DamageType>,
}

impl DamageDefenses {
    /// Read defenses from a `{immunities, resistances, vulnerabilities}` object
    ///
    /// Unknown type names are skipped.
    pub fn from_value(value: Option<&serde_json::Value>) -> Self {
        let Some(value) = value else {
            return Self::default();
        };
        let read = |key: &str| -> BTreeSet<DamageType> {
            value
                .get(key)
                .and_then(|v| v.as_array())
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| item.as_str())
                        .filter_map(|name| match name.parse() {
                            Ok(t) => Some(t),
                            Err(()) => {
                                warn!("Ignoring unknown damage type '{}' in {}", name, key);
                                None
                            }
                        })
                        .collect()
                })
                .unwrap_or_default()
        };
        Self {
            immunities: read("immunities"),
            resistances: read("resistances"),
            vulnerabilities: read("vulnerabilities"),
        }
    }

    /// Modifier that applies to a damage type
    pub fn modifier_for(&self, damage_type: DamageType) -> DamageModifier {
        if self.immunities.contains(&damage_type) {
            return DamageModifier::Immune;
        }
        match (
            self.resistances.contains(&damage_type),
            self.vulnerabilities.contains(&damage_type),
        ) {
            (true, false) => DamageModifier::Resistant,
            (false, true) => DamageModifier::Vulnerable,
            _ => DamageModifier::Normal,
        }
    }
}

/// Condition change caused by damage or healing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VitalChange {
    None,
    Unconscious,
    Dying,
    Dead,
    Recovered,
}

/// Result of applying damage to a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DamageOutcome {
    pub raw_damage: u32,
    pub final_damage: u32,
    pub damage_type: DamageType,
    pub modifier: DamageModifier,
    pub hp_before: i32,
    pub hp_after: i32,
    pub change: VitalChange,
}

/// Apply raw damage of one type to a document
///
/// HP never drops below `-max`. Returns `None` (and logs) when the target
/// has no hit points to damage; this never fails the surrounding workflow.
pub fn apply_damage(
    target: &mut Document,
    raw_damage: u32,
    damage_type: DamageType,
    ignore_resistances: bool,
) -> Option<DamageOutcome> {
    let Some(hp) = target.hit_points() else {
        warn!("Cannot damage {}: no hit points", target.id);
        return None;
    };

    let modifier = if ignore_resistances {
        DamageModifier::Normal
    } else {
        target.defenses().modifier_for(damage_type)
    };
    let final_damage = modifier.apply(raw_damage);

    let mut outcome = DamageOutcome {
        raw_damage,
        final_damage,
        damage_type,
        modifier,
        hp_before: hp.current,
        hp_after: hp.current,
        change: VitalChange::None,
    };
    if final_damage == 0 {
        return Some(outcome);
    }

    let floor = -hp.max;
    let damage = i32::try_from(final_damage).unwrap_or(i32::MAX);
    let new_hp = hp.current.saturating_sub(damage).max(floor);
    target.set_hit_points(HitPoints {
        current: new_hp,
        max: hp.max,
    });
    outcome.hp_after = new_hp;

    let mut conditions = target.conditions();
    let massive_at_zero = hp.current == 0 && damage >= hp.max;
    if massive_at_zero || new_hp <= floor {
        conditions.insert(DEAD);
        outcome.change = VitalChange::Dead;
    } else if new_hp == 0 {
        conditions.insert(UNCONSCIOUS);
        outcome.change = VitalChange::Unconscious;
    } else if new_hp < 0 {
        conditions.insert(UNCONSCIOUS);
        conditions.insert(DYING);
        conditions.remove(STABLE);
        target.set_death_saves(DeathSaves::default());
        outcome.change = VitalChange::Dying;
    }
    target.set_conditions(&conditions);

    debug!(
        "{} takes {} {} damage ({:?}): {} -> {}",
        target.id, final_damage, damage_type, modifier, hp.current, new_hp
    );
    Some(outcome)
}

/// Result of healing a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealingOutcome {
    pub amount: u32,
    pub hp_before: i32,
    pub hp_after: i32,
    pub change: VitalChange,
}

/// Restore hit points
///
/// Negative HP is raised to 0 before healing, HP caps at max, and any
/// positive result wakes the creature up. The dead are not healed.
pub fn apply_healing(target: &mut Document, amount: u32) -> Option<HealingOutcome> {
    let Some(hp) = target.hit_points() else {
        warn!("Cannot heal {}: no hit points", target.id);
        return None;
    };
    let mut conditions = target.conditions();
    if conditions.is_dead() {
        debug!("Not healing {}: dead", target.id);
        return None;
    }

    let mut outcome = HealingOutcome {
        amount,
        hp_before: hp.current,
        hp_after: hp.current,
        change: VitalChange::None,
    };
    if amount == 0 {
        return Some(outcome);
    }

    let heal = i32::try_from(amount).unwrap_or(i32::MAX);
    let new_hp = hp.current.max(0).saturating_add(heal).min(hp.max);
    target.set_hit_points(HitPoints {
        current: new_hp,
        max: hp.max,
    });
    outcome.hp_after = new_hp;

    if new_hp > 0 {
        let woke = conditions.remove(UNCONSCIOUS);
        let stopped = conditions.remove(DYING);
        conditions.remove(STABLE);
        if woke || stopped {
            outcome.change = VitalChange::Recovered;
        }
        target.set_conditions(&conditions);
        target.set_death_saves(DeathSaves::default());
    }
    Some(outcome)
}
