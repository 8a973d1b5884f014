//! Combat rules engine
//!
//! Implements d20-style resolution with:
//! - Dice notation and roll results (e.g., "2d6+3")
//! - D20 processing with advantage, disadvantage, and criticals
//! - Damage types with immunity, resistance, and vulnerability
//! - Unconscious, dying, and dead transitions plus death saves
//! - Per-turn action slots
//! - Grid range, reach, and hit determination

pub mod conditions;
pub mod d20;
pub mod damage;
pub mod dice;
pub mod range;
pub mod turn;

pub use conditions::{record_death_save, ConditionSet, DeathSaveOutcome, DeathSaves};
pub use d20::{part_totals, process, AdvantageMode, D20Options, FollowUp, ProcessedRollResult, RollError};
pub use damage::{
    apply_damage, apply_healing, DamageDefenses, DamageModifier, DamageOutcome, DamageType,
    HealingOutcome, VitalChange,
};
pub use dice::{parse_dice, DiceError, DiceGroup, DiceRoll, Recipients, RollArguments, RollKind, RollResult};
pub use range::{
    check_range, grid_distance, is_hit, resolve_range, RangeCheck, RangeError, RangePair, WeaponRange,
};
pub use turn::{consume_slot, reset_turn, slot_available, TurnError, TurnSlot, TurnState};
