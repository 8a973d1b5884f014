//! Death saving throws

use async_trait::async_trait;
use tracing::info;

use super::draft_actor;
use crate::actions::{ActionError, ActionHandler, ActionRequest, ActionValidation, ErrorCode};
use crate::channel::{Channel, ChatMessage, RollRequest};
use crate::combat::conditions::DYING;
use crate::combat::{
    process, record_death_save, AdvantageMode, D20Options, DeathSaveOutcome, FollowUp, RollError,
    RollKind,
};
use crate::state::GameState;

/// Roll a death save for a dying creature
pub struct DeathSave;

#[async_trait]
impl ActionHandler for DeathSave {
    fn kind(&self) -> &'static str {
        "death-save"
    }

    fn validate(&self, request: &ActionRequest, state: &GameState) -> ActionValidation {
        let Some(id) = request.character_id() else {
            return ActionValidation::reject(ErrorCode::NoCharacter, "No character specified");
        };
        let Some(character) = state.document(id).filter(|d| d.is_creature()) else {
            return ActionValidation::reject(
                ErrorCode::CharacterNotFound,
                format!("Character {} not found", id),
            );
        };
        if character.is_dead() {
            return ActionValidation::reject(
                ErrorCode::AlreadyDead,
                format!("{} is dead", character.name),
            );
        }
        if !character.conditions().contains(DYING) {
            return ActionValidation::reject(
                ErrorCode::InvalidParameters,
                format!("{} is not dying", character.name),
            );
        }
        ActionValidation::ok()
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

        let roll = RollRequest::d20(
            Some(request.issuer_id.as_str()),
            RollKind::DeathSave,
            format!("Death save ({})", name),
            AdvantageMode::Normal,
        );
        let result = channel.send_roll_request(roll).await?;
        let processed = process(&result, D20Options::for_kind(RollKind::DeathSave))?;
        let natural = processed
            .natural()
            .ok_or_else(|| RollError::EmptyD20(result.id.clone()))?;

        let Some(character) = draft.document_mut(&character_id) else {
            return Ok(Vec::new());
        };
        let Some(outcome) = record_death_save(character, natural) else {
            return Ok(Vec::new());
        };
        let saves = character.death_saves();

        let text = match outcome {
            DeathSaveOutcome::Success => format!(
                "{} succeeds on a death save ({} successes, {} failures).",
                name, saves.successes, saves.failures
            ),
            DeathSaveOutcome::Failure => format!(
                "{} fails a death save ({} successes, {} failures).",
                name, saves.successes, saves.failures
            ),
            DeathSaveOutcome::Stabilized => format!("{} is stable.", name),
            DeathSaveOutcome::Died => format!("{} dies.", name),
            DeathSaveOutcome::Revived => format!("{} rolls a natural 20 and regains 1 hit point!", name),
        };
        info!("Death save for {} rolled {}: {:?}", character_id, natural, outcome);
        channel
            .send_chat_message(ChatMessage::new(text).from_speaker(&character_id))
            .await?;
        Ok(Vec::new())
    }
}
