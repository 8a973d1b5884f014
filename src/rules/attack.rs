//! Weapon attacks and monster stat-block actions

use async_trait::async_trait;
use tracing::{debug, warn};

use super::items::{MonsterActionData, WeaponData};
use super::{
    acting_character, carried_item, draft_actor, require_conscious, require_targets,
    requested_advantage,
};
use crate::actions::{
    run_workflow, ActionError, ActionHandler, ActionRequest, ActionValidation, ErrorCode,
};
use crate::channel::Channel;
use crate::combat::{consume_slot, FollowUp, TurnSlot};
use crate::state::{Document, GameState};

/// Parameter naming the weapon item
pub const ITEM_PARAM: &str = "item_id";
/// Parameter naming the stat-block action
pub const ACTION_PARAM: &str = "action";

fn weapon_of<'s>(
    request: &ActionRequest,
    state: &'s GameState,
    wielder: &Document,
) -> Result<(&'s Document, WeaponData), ActionValidation> {
    let item_id = request.str_param(ITEM_PARAM).ok_or_else(|| {
        ActionValidation::reject(ErrorCode::InvalidParameters, "No weapon specified")
    })?;
    let item = carried_item(state, wielder, item_id).ok_or_else(|| {
        ActionValidation::reject(
            ErrorCode::InvalidParameters,
            format!("{} does not carry {}", wielder.name, item_id),
        )
    })?;
    let weapon = item.data_field::<WeaponData>("weapon").ok_or_else(|| {
        ActionValidation::reject(
            ErrorCode::InvalidParameters,
            format!("{} is not a weapon", item.name),
        )
    })?;
    Ok((item, weapon))
}

/// Attack targets with a carried weapon
pub struct WeaponAttack;

#[async_trait]
impl ActionHandler for WeaponAttack {
    fn kind(&self) -> &'static str {
        "weapon-attack"
    }

    fn validate(&self, request: &ActionRequest, state: &GameState) -> ActionValidation {
        let checked = acting_character(request, state).and_then(|actor| {
            require_conscious(actor)?;
            require_targets(request)?;
            weapon_of(request, state, actor).map(|_| ())
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
        let Some(actor) = draft_actor(request, draft) else {
            return Ok(Vec::new());
        };
        let plan = match weapon_of(request, draft, actor) {
            Ok((item, weapon)) => {
                let label = format!("{} ({})", item.name, actor.name);
                weapon
                    .plan(&label, actor, requested_advantage(request))
                    .rolled_by(&request.issuer_id)
            }
            Err(_) => {
                warn!("Weapon for {} vanished before execution", request.id);
                return Ok(Vec::new());
            }
        };
        let actor_id = actor.id.clone();

        if let Some(actor) = draft.document_mut(&actor_id) {
            consume_slot(actor, TurnSlot::Action)?;
        }
        let report = run_workflow(&plan, &request.target_ids, draft, channel).await?;
        debug!(
            "{} dealt {} damage across {} targets",
            plan.label,
            report.total_damage(),
            report.outcomes.len()
        );
        Ok(report.follow_ups)
    }
}

fn monster_action_of(
    request: &ActionRequest,
    actor: &Document,
) -> Result<MonsterActionData, ActionValidation> {
    let name = request.str_param(ACTION_PARAM).ok_or_else(|| {
        ActionValidation::reject(ErrorCode::InvalidParameters, "No action specified")
    })?;
    let actions: Vec<MonsterActionData> = actor.data_field("actions").unwrap_or_default();
    actions
        .into_iter()
        .find(|a| a.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            ActionValidation::reject(
                ErrorCode::InvalidParameters,
                format!("{} has no action named {}", actor.name, name),
            )
        })
}

/// Use an action from a creature's stat block
pub struct MonsterAction;

#[async_trait]
impl ActionHandler for MonsterAction {
    fn kind(&self) -> &'static str {
        "monster-action"
    }

    fn validate(&self, request: &ActionRequest, state: &GameState) -> ActionValidation {
        let checked = acting_character(request, state).and_then(|actor| {
            require_conscious(actor)?;
            require_targets(request)?;
            monster_action_of(request, actor).map(|_| ())
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
        let Some(actor) = draft_actor(request, draft) else {
            return Ok(Vec::new());
        };
        let Ok(action) = monster_action_of(request, actor) else {
            return Ok(Vec::new());
        };
        let plan = action
            .plan(actor, requested_advantage(request))
            .rolled_by(&request.issuer_id);
        let actor_id = actor.id.clone();

        if let Some(actor) = draft.document_mut(&actor_id) {
            consume_slot(actor, TurnSlot::Action)?;
        }
        let report = run_workflow(&plan, &request.target_ids, draft, channel).await?;
        Ok(report.follow_ups)
    }
}
