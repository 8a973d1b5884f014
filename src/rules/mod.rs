//! d20 rules plugin
//!
//! Registers the combat, spell, rest, and recovery actions of the d20 rule
//! family:
//! - `weapon-attack`, `cast-spell`, `monster-action`
//! - `apply-damage`, `apply-healing`
//! - `short-rest`, `long-rest`
//! - `death-save`

pub mod attack;
pub mod damage;
pub mod items;
pub mod recovery;
pub mod rest;
pub mod spell;

use std::sync::Arc;

use tracing::warn;

use crate::actions::{ActionHandler, ActionRequest, ActionValidation, ErrorCode, RulePlugin};
use crate::combat::conditions::UNCONSCIOUS;
use crate::combat::AdvantageMode;
use crate::state::{Document, GameState};

pub use attack::{MonsterAction, WeaponAttack};
pub use damage::{ApplyDamage, ApplyHealing};
pub use items::{EffectKind, MonsterActionData, SpellData, WeaponCategory, WeaponData};
pub use recovery::DeathSave;
pub use rest::{LongRest, ShortRest};
pub use spell::CastSpell;

/// The d20 rule system
pub struct Dnd5e;

impl RulePlugin for Dnd5e {
    fn name(&self) -> &'static str {
        "dnd5e"
    }

    fn handlers(&self) -> Vec<Arc<dyn ActionHandler>> {
        vec![
            Arc::new(WeaponAttack),
            Arc::new(CastSpell),
            Arc::new(MonsterAction),
            Arc::new(ApplyDamage),
            Arc::new(ApplyHealing),
            Arc::new(ShortRest),
            Arc::new(LongRest),
            Arc::new(DeathSave),
        ]
    }
}

/// The living creature acting for a request
pub(crate) fn acting_character<'s>(
    request: &ActionRequest,
    state: &'s GameState,
) -> Result<&'s Document, ActionValidation> {
    let id = request
        .character_id()
        .ok_or_else(|| ActionValidation::reject(ErrorCode::NoCharacter, "No character specified"))?;
    let doc = state
        .document(id)
        .filter(|d| d.is_creature())
        .ok_or_else(|| {
            ActionValidation::reject(
                ErrorCode::CharacterNotFound,
                format!("Character {} not found", id),
            )
        })?;
    if doc.is_dead() {
        return Err(ActionValidation::reject(
            ErrorCode::AlreadyDead,
            format!("{} is dead", doc.name),
        ));
    }
    Ok(doc)
}

/// A creature that can take actions: conscious and above 0 HP
pub(crate) fn require_conscious(doc: &Document) -> Result<(), ActionValidation> {
    let down = doc.conditions().contains(UNCONSCIOUS)
        || doc.hit_points().is_some_and(|hp| hp.current <= 0);
    if down {
        return Err(ActionValidation::reject(
            ErrorCode::InvalidParameters,
            format!("{} is unconscious", doc.name),
        ));
    }
    Ok(())
}

pub(crate) fn require_targets(request: &ActionRequest) -> Result<(), ActionValidation> {
    if request.target_ids.is_empty() {
        return Err(ActionValidation::reject(
            ErrorCode::InvalidParameters,
            "No targets selected",
        ));
    }
    Ok(())
}

/// An item carried by `owner`
pub(crate) fn carried_item<'s>(
    state: &'s GameState,
    owner: &Document,
    item_id: &str,
) -> Option<&'s Document> {
    state
        .document(item_id)
        .filter(|item| item.parent_id.as_deref() == Some(owner.id.as_str()))
}

/// Advantage requested in the `advantage` parameter
pub(crate) fn requested_advantage(request: &ActionRequest) -> AdvantageMode {
    request
        .str_param("advantage")
        .map(AdvantageMode::parse)
        .unwrap_or_default()
}

/// Look up the acting document in the draft during execute
///
/// Validation already ran; a missing actor here means the draft changed
/// shape and the action quietly does nothing.
pub(crate) fn draft_actor<'s>(request: &ActionRequest, draft: &'s GameState) -> Option<&'s Document> {
    let found = request.character_id().and_then(|id| draft.document(id));
    if found.is_none() {
        warn!(
            "Action {} lost its character before execution",
            request.id
        );
    }
    found
}
