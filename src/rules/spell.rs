//! Spellcasting
//!
//! A spell is an item carried by its caster with a `data.spell` payload.
//! Levelled spells spend a slot of at least their level; cantrips are free.
//! The casting time decides which turn slot is spent.

use async_trait::async_trait;
use tracing::info;

use super::items::SpellData;
use super::{
    acting_character, carried_item, draft_actor, require_conscious, require_targets,
    requested_advantage,
};
use crate::actions::{
    run_workflow, ActionError, ActionHandler, ActionRequest, ActionValidation, ErrorCode,
};
use crate::channel::{Channel, ChatMessage};
use crate::combat::{consume_slot, FollowUp};
use crate::state::{Document, GameState};

/// Parameter naming the spell item
pub const SPELL_PARAM: &str = "spell_id";
/// Parameter choosing the slot level to cast with
pub const SLOT_LEVEL_PARAM: &str = "slot_level";

struct Casting<'s> {
    item: &'s Document,
    spell: SpellData,
    /// Slot level spent, `None` for cantrips
    slot_level: Option<u32>,
}

fn casting_of<'s>(
    request: &ActionRequest,
    state: &'s GameState,
    caster: &Document,
) -> Result<Casting<'s>, ActionValidation> {
    let spell_id = request.str_param(SPELL_PARAM).ok_or_else(|| {
        ActionValidation::reject(ErrorCode::InvalidParameters, "No spell specified")
    })?;
    let item = carried_item(state, caster, spell_id).ok_or_else(|| {
        ActionValidation::reject(
            ErrorCode::InvalidParameters,
            format!("{} does not know {}", caster.name, spell_id),
        )
    })?;
    let spell = item.data_field::<SpellData>("spell").ok_or_else(|| {
        ActionValidation::reject(
            ErrorCode::InvalidParameters,
            format!("{} is not a spell", item.name),
        )
    })?;

    if spell.level == 0 {
        return Ok(Casting {
            item,
            spell,
            slot_level: None,
        });
    }

    let slot_level = match request.i64_param(SLOT_LEVEL_PARAM) {
        Some(level) => u32::try_from(level).map_err(|_| {
            ActionValidation::reject(ErrorCode::InvalidParameters, "Invalid slot level")
        })?,
        None => spell.level,
    };
    if slot_level < spell.level {
        return Err(ActionValidation::reject(
            ErrorCode::InvalidParameters,
            format!(
                "{} needs a level {} slot, not level {}",
                item.name, spell.level, slot_level
            ),
        ));
    }
    let available = caster
        .spell_slots()
        .get(&slot_level.to_string())
        .map(|pool| pool.available())
        .unwrap_or(0);
    if available == 0 {
        return Err(ActionValidation::reject(
            ErrorCode::InvalidParameters,
            format!("{} has no level {} slots left", caster.name, slot_level),
        ));
    }
    Ok(Casting {
        item,
        spell,
        slot_level: Some(slot_level),
    })
}

/// Cast a spell at targets
pub struct CastSpell;

#[async_trait]
impl ActionHandler for CastSpell {
    fn kind(&self) -> &'static str {
        "cast-spell"
    }

    fn validate(&self, request: &ActionRequest, state: &GameState) -> ActionValidation {
        let checked = acting_character(request, state).and_then(|caster| {
            require_conscious(caster)?;
            require_targets(request)?;
            casting_of(request, state, caster).map(|_| ())
        });
        match checked {
            Ok(()) => ActionValidation::ok(),
            Err(rejection) => rejection,
        }
    }

    async fn execute(
        &self,
        request: &ActionRequest,
        draft: &mut GameState,
        channel: &dyn Channel,
    ) -> Result<Vec<FollowUp>, ActionError> {
        let Some(caster) = draft_actor(request, draft) else {
            return Ok(Vec::new());
        };
        let Ok(casting) = casting_of(request, draft, caster) else {
            return Ok(Vec::new());
        };
        let plan = casting
            .spell
            .plan(&casting.item.name, caster, requested_advantage(request))
            .rolled_by(&request.issuer_id);
        let announcement = match casting.slot_level {
            Some(level) => format!("{} casts {} (level {}).", caster.name, casting.item.name, level),
            None => format!("{} casts {}.", caster.name, casting.item.name),
        };
        let caster_id = caster.id.clone();
        let casting_time = casting.spell.casting_time;
        let slot_level = casting.slot_level;

        if let Some(caster) = draft.document_mut(&caster_id) {
            consume_slot(caster, casting_time)?;
            if let Some(level) = slot_level {
                let mut slots = caster.spell_slots();
                if let Some(pool) = slots.get_mut(&level.to_string()) {
                    pool.used += 1;
                }
                caster.set_spell_slots(&slots);
            }
        }

        info!("{}", announcement);
        channel
            .send_chat_message(ChatMessage::new(announcement).from_speaker(&caster_id))
            .await?;
        let report = run_workflow(&plan, &request.target_ids, draft, channel).await?;
        Ok(report.follow_ups)
    }
}
