//! Short and long rests

use async_trait::async_trait;
use tracing::{debug, info};

use super::{acting_character, draft_actor};
use crate::actions::{ActionError, ActionHandler, ActionRequest, ActionValidation, ErrorCode};
use crate::channel::{Channel, ChatMessage, ConfirmationRequest, RollRequest};
use crate::combat::conditions::{DYING, UNCONSCIOUS};
use crate::combat::{apply_healing, reset_turn, DeathSaves, DiceRoll, FollowUp, RollKind};
use crate::state::{Ability, Document, GameState, HitDice, HitPoints};

/// Number of hit dice to spend on a short rest
pub const HIT_DICE_PARAM: &str = "hit_dice";

fn hit_dice_to_spend(request: &ActionRequest, character: &Document) -> Result<u32, ActionValidation> {
    let count = match request.i64_param(HIT_DICE_PARAM) {
        Some(n) => u32::try_from(n).map_err(|_| {
            ActionValidation::reject(ErrorCode::InvalidParameters, "Invalid hit dice count")
        })?,
        None => 1,
    };
    let remaining = character.hit_dice().map(|d| d.remaining).unwrap_or(0);
    if count > remaining {
        return Err(ActionValidation::reject(
            ErrorCode::InvalidParameters,
            format!(
                "{} has {} hit dice left, cannot spend {}",
                character.name, remaining, count
            ),
        ));
    }
    Ok(count)
}

/// Spend hit dice to recover hit points
pub struct ShortRest;

#[async_trait]
impl ActionHandler for ShortRest {
    fn kind(&self) -> &'static str {
        "short-rest"
    }

    fn validate(&self, request: &ActionRequest, state: &GameState) -> ActionValidation {
        let checked = acting_character(request, state).and_then(|character| {
            let conditions = character.conditions();
            if conditions.contains(DYING) || conditions.contains(UNCONSCIOUS) {
                return Err(ActionValidation::reject(
                    ErrorCode::InvalidParameters,
                    format!("{} cannot rest while unconscious", character.name),
                ));
            }
            if character.hit_points().is_none() {
                return Err(ActionValidation::reject(
                    ErrorCode::InvalidParameters,
                    format!("{} has no hit points", character.name),
                ));
            }
            hit_dice_to_spend(request, character).map(|_| ())
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
        let Some(character) = draft_actor(request, draft) else {
            return Ok(Vec::new());
        };
        let Ok(count) = hit_dice_to_spend(request, character) else {
            return Ok(Vec::new());
        };
        let character_id = character.id.clone();
        let name = character.name.clone();

        if count == 0 {
            channel
                .send_chat_message(
                    ChatMessage::new(format!("{} takes a short rest.", name))
                        .from_speaker(&character_id),
                )
                .await?;
            return Ok(Vec::new());
        }

        let con = character.ability_modifier(Ability::Con);
        let formula = DiceRoll::new(count, character.hit_die(), con * count as i32);
        let roll = RollRequest::new(
            Some(request.issuer_id.as_str()),
            RollKind::HitDie,
            format!("{} spends {} hit dice", name, count),
        )
        .with_dice(vec![formula.clone()]);
        let result = channel.send_roll_request(roll).await?;
        let healed = u32::try_from(result.total()).unwrap_or(0);
        debug!("{} rolled {} on {}", name, result.total(), formula);

        let Some(character) = draft.document_mut(&character_id) else {
            return Ok(Vec::new());
        };
        if let Some(dice) = character.hit_dice() {
            character.set_hit_dice(HitDice {
                remaining: dice.remaining.saturating_sub(count),
                max: dice.max,
            });
        }
        let regained = apply_healing(character, healed)
            .map(|h| h.hp_after - h.hp_before)
            .unwrap_or(0);

        info!("{} short rest: {} hit dice, {} HP", character_id, count, regained);
        channel
            .send_chat_message(
                ChatMessage::new(format!(
                    "{} spends {} hit dice and regains {} hit points.",
                    name, count, regained
                ))
                .from_speaker(&character_id),
            )
            .await?;
        Ok(Vec::new())
    }
}

/// Full recovery outside of combat
pub struct LongRest;

#[async_trait]
impl ActionHandler for LongRest {
    fn kind(&self) -> &'static str {
        "long-rest"
    }

    fn validate(&self, request: &ActionRequest, state: &GameState) -> ActionValidation {
        let checked = acting_character(request, state).and_then(|character| {
            let in_combat = state
                .encounter
                .as_ref()
                .is_some_and(|e| e.includes(&character.id));
            if in_combat {
                return Err(ActionValidation::reject(
                    ErrorCode::CannotLongRest,
                    format!("{} cannot long rest during an encounter", character.name),
                ));
            }
            match character.hit_points() {
                Some(hp) if hp.current >= 1 => Ok(()),
                _ => Err(ActionValidation::reject(
                    ErrorCode::CannotLongRest,
                    format!("{} needs at least 1 hit point to long rest", character.name),
                )),
            }
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
        let Some(character) = draft_actor(request, draft) else {
            return Ok(Vec::new());
        };
        let character_id = character.id.clone();
        let name = character.name.clone();

        let question = ConfirmationRequest::new(
            Some(request.issuer_id.as_str()),
            format!("Take a long rest with {}?", name),
        );
        if !channel.request_confirmation(question).await? {
            debug!("Long rest for {} declined", character_id);
            channel
                .send_chat_message(
                    ChatMessage::new(format!("{} decides not to rest.", name))
                        .from_speaker(&character_id),
                )
                .await?;
            return Ok(Vec::new());
        }

        let Some(character) = draft.document_mut(&character_id) else {
            return Ok(Vec::new());
        };
        if let Some(hp) = character.hit_points() {
            character.set_hit_points(HitPoints {
                current: hp.max,
                max: hp.max,
            });
        }
        if let Some(dice) = character.hit_dice() {
            let recovered = (dice.max / 2).max(1);
            character.set_hit_dice(HitDice {
                remaining: (dice.remaining + recovered).min(dice.max),
                max: dice.max,
            });
        }
        let mut slots = character.spell_slots();
        if !slots.is_empty() {
            for pool in slots.values_mut() {
                pool.used = 0;
            }
            character.set_spell_slots(&slots);
        }
        character.set_death_saves(DeathSaves::default());
        reset_turn(character);

        info!("{} finished a long rest", character_id);
        channel
            .send_chat_message(
                ChatMessage::new(format!("{} finishes a long rest.", name))
                    .from_speaker(&character_id),
            )
            .await?;
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionExecutor, ActionPhase, ActionRegistry};
    use crate::channel::ScriptedChannel;
    use crate::combat::{consume_slot, slot_available, TurnSlot};
    use crate::state::{Bounds, DocumentKind, Encounter, GameStore, Token};
    use serde_json::json;
    use std::sync::Arc;

    fn cleric(hp: i32) -> Document {
        let mut doc = Document::new("pc", DocumentKind::Character, "Tobin")
            .with_owner("bob")
            .with_data("abilities", json!({"con": 14}))
            .with_data("hit_die", json!(8))
            .with_state("hit_points", json!({"current": hp, "max": 20}))
            .with_state("hit_dice", json!({"remaining": 1, "max": 5}))
            .with_state("spell_slots", json!({"1": {"max": 3, "used": 3}}))
            .with_state("death_saves", json!({"successes": 1, "failures": 2}));
        let _ = consume_slot(&mut doc, TurnSlot::Action);
        doc
    }

    async fn executor(pc: Document, encounter: Option<Encounter>) -> ActionExecutor {
        let mut state = GameState::new();
        state.insert(pc);
        state.encounter = encounter;
        let registry = ActionRegistry::shared();
        registry.register(Arc::new(ShortRest)).await;
        registry.register(Arc::new(LongRest)).await;
        ActionExecutor::new(GameStore::shared(state), registry)
    }

    fn rest(kind: &str) -> ActionRequest {
        ActionRequest::new("bob", kind).with_character("pc")
    }

    #[tokio::test]
    async fn test_short_rest_spends_hit_die() {
        let exec = executor(cleric(6), None).await;
        // 1d8+2 with a 5
        let channel = ScriptedChannel::new([5]);
        let outcome = exec.submit(rest("short-rest"), &channel).await;
        assert_eq!(outcome.phase, ActionPhase::Completed);

        let pc = exec.store().get("pc").await.unwrap();
        assert_eq!(pc.hit_points().unwrap().current, 13);
        assert_eq!(pc.hit_dice().unwrap().remaining, 0);

        let requests = channel.requests();
        assert_eq!(requests[0].kind, RollKind::HitDie);
        assert_eq!(requests[0].dice, vec![DiceRoll::new(1, 8, 2)]);
        assert_eq!(requests[0].participant_id.as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn test_short_rest_too_many_dice_rejected() {
        let exec = executor(cleric(6), None).await;
        let channel = ScriptedChannel::new(Vec::<u32>::new());
        let request = rest("short-rest").with_param(HIT_DICE_PARAM, json!(2));
        let outcome = exec.submit(request, &channel).await;
        assert_eq!(outcome.error.unwrap().code, ErrorCode::InvalidParameters);
    }

    #[tokio::test]
    async fn test_short_rest_while_dying_rejected() {
        let pc = cleric(-3).with_state("conditions", json!(["unconscious", "dying"]));
        let exec = executor(pc, None).await;
        let channel = ScriptedChannel::new(Vec::<u32>::new());
        let outcome = exec.submit(rest("short-rest"), &channel).await;
        assert_eq!(outcome.phase, ActionPhase::Rejected);
    }

    #[tokio::test]
    async fn test_long_rest_restores_everything() {
        let exec = executor(cleric(6), None).await;
        let channel = ScriptedChannel::new(Vec::<u32>::new());
        let outcome = exec.submit(rest("long-rest"), &channel).await;
        assert_eq!(outcome.phase, ActionPhase::Completed);

        let pc = exec.store().get("pc").await.unwrap();
        assert_eq!(pc.hit_points().unwrap().current, 20);
        assert_eq!(pc.hit_dice().unwrap().remaining, 3);
        assert_eq!(pc.spell_slots()["1"].used, 0);
        assert_eq!(pc.death_saves(), DeathSaves::default());
        assert!(slot_available(&pc, TurnSlot::Action));
    }

    #[tokio::test]
    async fn test_declined_long_rest_changes_nothing() {
        let exec = executor(cleric(6), None).await;
        let channel = ScriptedChannel::new(Vec::<u32>::new()).with_confirmations([false]);
        let outcome = exec.submit(rest("long-rest"), &channel).await;
        assert_eq!(outcome.phase, ActionPhase::Completed);
        assert!(outcome.updated.is_empty());

        let pc = exec.store().get("pc").await.unwrap();
        assert_eq!(pc.hit_points().unwrap().current, 6);
        assert!(channel.chat_lines()[0].contains("not to rest"));
    }

    #[tokio::test]
    async fn test_long_rest_blocked_in_encounter_or_at_zero() {
        let encounter = Encounter {
            tokens: vec![Token {
                id: "t1".to_string(),
                document_id: "pc".to_string(),
                bounds: Bounds::new(0.0, 0.0, 50.0, 50.0),
            }],
            ..Encounter::default()
        };
        let exec = executor(cleric(6), Some(encounter)).await;
        let channel = ScriptedChannel::new(Vec::<u32>::new());
        let outcome = exec.submit(rest("long-rest"), &channel).await;
        assert_eq!(outcome.error.unwrap().code, ErrorCode::CannotLongRest);

        let exec = executor(cleric(0), None).await;
        let outcome = exec.submit(rest("long-rest"), &channel).await;
        assert_eq!(outcome.error.unwrap().code, ErrorCode::CannotLongRest);
    }
}
