//! Rules payloads of weapons, spells, and monster actions
//!
//! Each payload lives in a document's `data` bag and turns into an
//! [`EffectPlan`] for the workflow.

use serde::{Deserialize, Serialize};

use crate::actions::{DamagePart, EffectPlan, Resolution};
use crate::combat::{AdvantageMode, RangePair, TurnSlot, WeaponRange};
use crate::state::{Ability, Document};

/// How a spell or monster action lands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    #[default]
    Attack,
    Save,
    Automatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeaponCategory {
    Melee,
    Ranged,
}

/// `data.weapon` of a weapon item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponData {
    pub category: WeaponCategory,
    #[serde(default)]
    pub properties: Vec<String>,
    #[serde(default)]
    pub range: Option<RangePair>,
    pub damage: DamagePart,
    #[serde(default = "default_true")]
    pub proficient: bool,
    /// Magic bonus to attack and damage
    #[serde(default)]
    pub attack_bonus: i32,
}

fn default_true() -> bool {
    true
}

impl WeaponData {
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.iter().any(|p| p.eq_ignore_ascii_case(name))
    }

    pub fn weapon_range(&self) -> WeaponRange {
        let reach = self.has_property("reach");
        match self.category {
            WeaponCategory::Ranged => WeaponRange::Ranged { range: self.range },
            WeaponCategory::Melee if self.has_property("thrown") => WeaponRange::Thrown {
                reach,
                range: self.range,
            },
            WeaponCategory::Melee => WeaponRange::Melee { reach },
        }
    }

    /// Ability used for attack and damage
    pub fn ability_for(&self, wielder: &Document) -> Ability {
        match self.category {
            WeaponCategory::Ranged => Ability::Dex,
            WeaponCategory::Melee if self.has_property("finesse") => {
                if wielder.ability_modifier(Ability::Dex) > wielder.ability_modifier(Ability::Str) {
                    Ability::Dex
                } else {
                    Ability::Str
                }
            }
            WeaponCategory::Melee => Ability::Str,
        }
    }

    /// Attack plan for a wielder
    pub fn plan(
        &self,
        label: &str,
        wielder: &Document,
        advantage: AdvantageMode,
    ) -> EffectPlan {
        let ability_mod = wielder.ability_modifier(self.ability_for(wielder));
        let proficiency = if self.proficient {
            wielder.proficiency_bonus()
        } else {
            0
        };
        let damage = DamagePart {
            formula: self.damage.formula.plus(ability_mod + self.attack_bonus),
            damage_type: self.damage.damage_type,
        };
        EffectPlan::new(
            label,
            &wielder.id,
            Resolution::AttackRoll {
                attack_bonus: ability_mod + proficiency + self.attack_bonus,
                advantage,
                range: Some(self.weapon_range()),
            },
        )
        .with_damage(vec![damage])
    }
}

/// `data.spell` of a spell item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellData {
    /// 0 for cantrips
    #[serde(default)]
    pub level: u32,
    #[serde(default = "default_casting_time")]
    pub casting_time: TurnSlot,
    #[serde(default)]
    pub resolution: EffectKind,
    #[serde(default)]
    pub save_ability: Option<Ability>,
    #[serde(default)]
    pub half_on_save: bool,
    #[serde(default)]
    pub damage: Vec<DamagePart>,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub range: Option<RangePair>,
}

fn default_casting_time() -> TurnSlot {
    TurnSlot::Action
}

impl SpellData {
    /// Casting plan for a caster
    pub fn plan(&self, label: &str, caster: &Document, advantage: AdvantageMode) -> EffectPlan {
        let ability_mod = caster.ability_modifier(caster.spellcasting_ability());
        let proficiency = caster.proficiency_bonus();
        let resolution = match self.resolution {
            EffectKind::Attack => Resolution::AttackRoll {
                attack_bonus: ability_mod + proficiency,
                advantage,
                range: self.range.map(|range| WeaponRange::Ranged { range: Some(range) }),
            },
            EffectKind::Save => Resolution::SavingThrow {
                ability: self.save_ability.unwrap_or(Ability::Dex),
                dc: 8 + proficiency + ability_mod,
                half_on_save: self.half_on_save,
            },
            EffectKind::Automatic => Resolution::Automatic,
        };
        EffectPlan::new(label, &caster.id, resolution)
            .with_damage(self.damage.clone())
            .with_conditions(self.conditions.clone())
    }
}

/// One entry of an actor's `data.actions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterActionData {
    pub name: String,
    #[serde(default)]
    pub resolution: EffectKind,
    #[serde(default)]
    pub attack_bonus: i32,
    #[serde(default)]
    pub reach: bool,
    /// Ranged attacks declare a range; melee ones do not
    #[serde(default)]
    pub range: Option<RangePair>,
    #[serde(default)]
    pub save_ability: Option<Ability>,
    #[serde(default)]
    pub save_dc: Option<i32>,
    #[serde(default)]
    pub half_on_save: bool,
    #[serde(default)]
    pub damage: Vec<DamagePart>,
    #[serde(default)]
    pub conditions: Vec<String>,
}

impl MonsterActionData {
    /// Stat-block values are used as written
    pub fn plan(&self, actor: &Document, advantage: AdvantageMode) -> EffectPlan {
        let resolution = match self.resolution {
            EffectKind::Attack => Resolution::AttackRoll {
                attack_bonus: self.attack_bonus,
                advantage,
                range: Some(match self.range {
                    Some(range) => WeaponRange::Ranged { range: Some(range) },
                    None => WeaponRange::Melee { reach: self.reach },
                }),
            },
            EffectKind::Save => Resolution::SavingThrow {
                ability: self.save_ability.unwrap_or(Ability::Dex),
                dc: self.save_dc.unwrap_or(10),
                half_on_save: self.half_on_save,
            },
            EffectKind::Automatic => Resolution::Automatic,
        };
        EffectPlan::new(&self.name, &actor.id, resolution)
            .with_damage(self.damage.clone())
            .with_conditions(self.conditions.clone())
    }
}
