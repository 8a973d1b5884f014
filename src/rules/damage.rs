//! Direct damage and healing
//!
//! GM tools that apply a known amount to every target without rolling.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use super::require_targets;
use crate::actions::{
    ActionError, ActionHandler, ActionRequest, ActionValidation, ErrorCode, CHARACTER_PARAM,
};
use crate::channel::{Channel, ChatMessage};
use crate::combat::{apply_damage, apply_healing, DamageType, FollowUp, VitalChange};
use crate::state::{Document, GameState, Properties};

pub const AMOUNT_PARAM: &str = "amount";
pub const DAMAGE_TYPE_PARAM: &str = "damage_type";
pub const IGNORE_RESISTANCES_PARAM: &str = "ignore_resistances";

fn amount_of(request: &ActionRequest, code: ErrorCode) -> Result<u32, ActionValidation> {
    request
        .i64_param(AMOUNT_PARAM)
        .and_then(|amount| u32::try_from(amount).ok())
        .ok_or_else(|| {
            ActionValidation::reject(code, "Amount must be a non-negative whole number")
        })
}

fn damage_type_of(request: &ActionRequest) -> Result<DamageType, ActionValidation> {
    let name = request.str_param(DAMAGE_TYPE_PARAM).ok_or_else(|| {
        ActionValidation::reject(ErrorCode::InvalidDamage, "No damage type specified")
    })?;
    name.parse().map_err(|_| {
        ActionValidation::reject(
            ErrorCode::InvalidDamage,
            format!("Unknown damage type: {}", name),
        )
    })
}

/// Every target must exist and have hit points
fn target_documents<'s>(
    request: &ActionRequest,
    state: &'s GameState,
) -> Result<Vec<&'s Document>, ActionValidation> {
    require_targets(request)?;
    request
        .target_ids
        .iter()
        .map(|id| {
            state
                .document(id)
                .filter(|doc| doc.hit_points().is_some())
                .ok_or_else(|| {
                    ActionValidation::reject(
                        ErrorCode::CharacterNotFound,
                        format!("Target {} not found", id),
                    )
                })
        })
        .collect()
}

fn death_save_follow_up(target_id: &str) -> FollowUp {
    let mut parameters = Properties::new();
    parameters.insert(CHARACTER_PARAM.to_string(), json!(target_id));
    FollowUp::ActionRequest {
        action_kind: "death-save".to_string(),
        parameters,
        options: Properties::new(),
    }
}

/// Deal a fixed amount of typed damage to every target
pub struct ApplyDamage;

#[async_trait]
impl ActionHandler for ApplyDamage {
    fn kind(&self) -> &'static str {
        "apply-damage"
    }

    fn validate(&self, request: &ActionRequest, state: &GameState) -> ActionValidation {
        let checked = amount_of(request, ErrorCode::InvalidDamage)
            .and_then(|_| damage_type_of(request))
            .and_then(|_| target_documents(request, state).map(|_| ()));
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
        let (Ok(amount), Ok(damage_type)) = (
            amount_of(request, ErrorCode::InvalidDamage),
            damage_type_of(request),
        ) else {
            return Ok(Vec::new());
        };
        let ignore = request.bool_param(IGNORE_RESISTANCES_PARAM).unwrap_or(false);

        let mut follow_ups = Vec::new();
        for target_id in &request.target_ids {
            let Some(target) = draft.document_mut(target_id) else {
                continue;
            };
            let Some(result) = apply_damage(target, amount, damage_type, ignore) else {
                continue;
            };
            let name = target.name.clone();
            let mut lines = vec![format!(
                "{} takes {} {} damage.",
                name, result.final_damage, damage_type
            )];
            match result.change {
                VitalChange::Unconscious => lines.push(format!("{} falls unconscious.", name)),
                VitalChange::Dying => {
                    lines.push(format!("{} is dying.", name));
                    follow_ups.push(death_save_follow_up(target_id));
                }
                VitalChange::Dead => lines.push(format!("{} dies.", name)),
                VitalChange::None | VitalChange::Recovered => {}
            }
            info!("{}", lines.join(" "));
            channel
                .send_chat_message(ChatMessage::new(lines.join(" ")).from_speaker(&request.issuer_id))
                .await?;
        }
        Ok(follow_ups)
    }
}

/// Restore a fixed amount of hit points to every target
pub struct ApplyHealing;

#[async_trait]
impl ActionHandler for ApplyHealing {
    fn kind(&self) -> &'static str {
        "apply-healing"
    }

    fn validate(&self, request: &ActionRequest, state: &GameState) -> ActionValidation {
        let checked = amount_of(request, ErrorCode::InvalidParameters)
            .and_then(|_| target_documents(request, state))
            .and_then(|targets| match targets.iter().find(|t| t.is_dead()) {
                Some(dead) => Err(ActionValidation::reject(
                    ErrorCode::AlreadyDead,
                    format!("{} is dead", dead.name),
                )),
                None => Ok(()),
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
        let Ok(amount) = amount_of(request, ErrorCode::InvalidParameters) else {
            return Ok(Vec::new());
        };

        for target_id in &request.target_ids {
            let Some(target) = draft.document_mut(target_id) else {
                continue;
            };
            let Some(result) = apply_healing(target, amount) else {
                continue;
            };
            debug!(
                "{} healed {} -> {}",
                target.id, result.hp_before, result.hp_after
            );
            let mut text = format!(
                "{} regains {} hit points.",
                target.name,
                result.hp_after - result.hp_before.max(0)
            );
            if result.change == VitalChange::Recovered {
                text.push_str(&format!(" {} is back on their feet.", target.name));
            }
            channel
                .send_chat_message(ChatMessage::new(text).from_speaker(&request.issuer_id))
                .await?;
        }
        Ok(Vec::new())
    }
}
