//! Multi-target effect orchestration
//!
//! An [`EffectPlan`] says how an effect lands: by attack roll, by saving
//! throw, or automatically. [`run_workflow`] walks the targets in order and
//! sequences rolls, damage, and conditions for each:
//! - Attack roll: attack, then damage on a hit, then conditions
//! - Saving throw: all saves in one batch, one shared damage roll made the
//!   first time a target needs it, half damage on a save if declared
//! - Automatic: one shared damage roll applied to every target
//!
//! A target that cannot be resolved is skipped with a chat message and the
//! rest of the batch continues. Only a closed channel aborts the workflow.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::{ActionError, CHARACTER_PARAM};
use crate::channel::{Channel, ChannelError, ChatMessage, RollRequest};
use crate::combat::conditions::DYING;
use crate::combat::{
    apply_damage, is_hit, part_totals, process, resolve_range, AdvantageMode, D20Options,
    DamageType, DiceRoll, FollowUp, RollError, RollKind, RollResult, VitalChange, WeaponRange,
};
use crate::state::{Ability, Document, DocumentId, GameState, Properties};

/// One damage formula and its type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamagePart {
    pub formula: DiceRoll,
    #[serde(rename = "type")]
    pub damage_type: DamageType,
}

/// How an effect decides whether it lands
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    AttackRoll {
        attack_bonus: i32,
        advantage: AdvantageMode,
        /// Reach or range to check; `None` skips the range check
        range: Option<WeaponRange>,
    },
    SavingThrow {
        ability: Ability,
        dc: i32,
        half_on_save: bool,
    },
    Automatic,
}

/// Everything needed to resolve one effect against a list of targets
#[derive(Debug, Clone, PartialEq)]
pub struct EffectPlan {
    pub label: String,
    /// Creature producing the effect
    pub actor_id: DocumentId,
    /// Participant who rolls the actor's dice; `None` means the GM
    pub roller: Option<String>,
    pub resolution: Resolution,
    pub damage: Vec<DamagePart>,
    /// Condition tags applied when the effect lands
    pub conditions: Vec<String>,
    pub ignore_resistances: bool,
}

impl EffectPlan {
    pub fn new(label: &str, actor_id: &str, resolution: Resolution) -> Self {
        Self {
            label: label.to_string(),
            actor_id: actor_id.to_string(),
            roller: None,
            resolution,
            damage: Vec::new(),
            conditions: Vec::new(),
            ignore_resistances: false,
        }
    }

    pub fn rolled_by(mut self, participant: &str) -> Self {
        self.roller = Some(participant.to_string());
        self
    }

    pub fn with_damage(mut self, parts: Vec<DamagePart>) -> Self {
        self.damage = parts;
        self
    }

    pub fn with_conditions(mut self, conditions: Vec<String>) -> Self {
        self.conditions = conditions;
        self
    }
}

/// What happened to one target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Hit,
    CriticalHit,
    Missed,
    OutOfRange,
    Saved,
    FailedSave,
    Affected,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetOutcome {
    pub target_id: DocumentId,
    pub status: TargetStatus,
    /// Attack or save total
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll_total: Option<i32>,
    pub damage_dealt: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions_applied: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TargetOutcome {
    fn new(target_id: &str, status: TargetStatus) -> Self {
        Self {
            target_id: target_id.to_string(),
            status,
            roll_total: None,
            damage_dealt: 0,
            conditions_applied: Vec::new(),
            reason: None,
        }
    }

    fn with_roll(mut self, total: i32) -> Self {
        self.roll_total = Some(total);
        self
    }

    fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Per-target outcomes in target order, plus follow-ups for the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub outcomes: Vec<TargetOutcome>,
    pub follow_ups: Vec<FollowUp>,
}

impl WorkflowReport {
    pub fn outcome(&self, target_id: &str) -> Option<&TargetOutcome> {
        self.outcomes.iter().find(|o| o.target_id == target_id)
    }

    pub fn total_damage(&self) -> u32 {
        self.outcomes.iter().map(|o| o.damage_dealt).sum()
    }
}

/// Why a target was not resolved
enum Skip {
    Reason(String),
    Fatal(ActionError),
}

impl From<ChannelError> for Skip {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::Closed => Skip::Fatal(ActionError::Channel(e)),
            other => Skip::Reason(other.to_string()),
        }
    }
}

impl From<RollError> for Skip {
    fn from(e: RollError) -> Self {
        Skip::Reason(e.to_string())
    }
}

/// Target lookup for an effect
fn resolve_target<'d>(
    draft: &'d GameState,
    target_id: &str,
    needs_hp: bool,
) -> Result<&'d Document, Skip> {
    let doc = draft
        .document(target_id)
        .ok_or_else(|| Skip::Reason(format!("{} not found", target_id)))?;
    if !doc.is_creature() {
        return Err(Skip::Reason(format!("{} is not a creature", doc.name)));
    }
    if doc.is_dead() {
        return Err(Skip::Reason(format!("{} is already dead", doc.name)));
    }
    if needs_hp && doc.hit_points().is_none() {
        return Err(Skip::Reason(format!("{} has no hit points", doc.name)));
    }
    Ok(doc)
}

struct Workflow<'a> {
    plan: &'a EffectPlan,
    channel: &'a dyn Channel,
    speaker: String,
    report: WorkflowReport,
}

impl<'a> Workflow<'a> {
    async fn chat(&self, text: String) {
        let message = ChatMessage::new(text).from_speaker(&self.speaker);
        if let Err(e) = self.channel.send_chat_message(message).await {
            debug!("Chat not delivered: {}", e);
        }
    }

    async fn skip(&mut self, target_id: &str, reason: String) {
        warn!("{}: skipping {}: {}", self.plan.label, target_id, reason);
        self.chat(format!("{}: {} skipped ({})", self.plan.label, target_id, reason))
            .await;
        self.report
            .outcomes
            .push(TargetOutcome::new(target_id, TargetStatus::Skipped).with_reason(reason));
    }

    /// Record one target's result, skipping on recoverable errors
    async fn settle(
        &mut self,
        target_id: &str,
        result: Result<TargetOutcome, Skip>,
    ) -> Result<(), ActionError> {
        match result {
            Ok(outcome) => self.report.outcomes.push(outcome),
            Err(Skip::Reason(reason)) => self.skip(target_id, reason).await,
            Err(Skip::Fatal(e)) => return Err(e),
        }
        Ok(())
    }

    fn damage_formulas(&self, critical: bool) -> Vec<DiceRoll> {
        self.plan
            .damage
            .iter()
            .map(|p| {
                if critical {
                    p.formula.critical()
                } else {
                    p.formula.clone()
                }
            })
            .collect()
    }

    async fn roll_damage(&self, formulas: Vec<DiceRoll>, critical: bool) -> Result<Vec<i32>, Skip> {
        let label = if critical {
            format!("{}: critical damage", self.plan.label)
        } else {
            format!("{}: damage", self.plan.label)
        };
        let request = RollRequest::new(self.plan.roller.as_deref(), RollKind::Damage, label)
            .with_dice(formulas.clone());
        let result = self.channel.send_roll_request(request).await?;
        Ok(part_totals(&result, &formulas)?)
    }

    /// Damage roll shared by every target, made on first use
    async fn shared_damage(&self, cache: &mut Option<Vec<i32>>) -> Result<Vec<i32>, Skip> {
        if let Some(totals) = cache {
            return Ok(totals.clone());
        }
        let totals = self.roll_damage(self.damage_formulas(false), false).await?;
        *cache = Some(totals.clone());
        Ok(totals)
    }

    /// Apply rolled damage parts to a target
    async fn deal_damage(
        &mut self,
        draft: &mut GameState,
        target_id: &str,
        totals: &[i32],
        halve: bool,
        outcome: &mut TargetOutcome,
    ) {
        let Some(target) = draft.document_mut(target_id) else {
            warn!("{} vanished from the draft", target_id);
            return;
        };

        let raw: Vec<u32> = totals
            .iter()
            .map(|total| u32::try_from(*total).unwrap_or(0))
            .collect();
        let raw = if halve { halve_parts(&raw) } else { raw };

        let mut dealt = 0;
        let mut change = VitalChange::None;
        for (part, raw) in self.plan.damage.iter().zip(raw) {
            if let Some(result) =
                apply_damage(target, raw, part.damage_type, self.plan.ignore_resistances)
            {
                dealt += result.final_damage;
                if result.change != VitalChange::None {
                    change = result.change;
                }
            }
        }
        outcome.damage_dealt += dealt;

        let name = target.name.clone();
        let still_dying = target.conditions().contains(DYING);
        self.chat(format!("{} takes {} damage.", name, dealt)).await;
        match change {
            VitalChange::Unconscious => self.chat(format!("{} falls unconscious.", name)).await,
            VitalChange::Dead => self.chat(format!("{} dies.", name)).await,
            VitalChange::Dying if still_dying => {
                self.chat(format!("{} is dying.", name)).await;
                let mut parameters = Properties::new();
                parameters.insert(CHARACTER_PARAM.to_string(), json!(target_id));
                self.report.follow_ups.push(FollowUp::ActionRequest {
                    action_kind: "death-save".to_string(),
                    parameters,
                    options: Properties::new(),
                });
            }
            _ => {}
        }
    }

    fn apply_conditions(&self, draft: &mut GameState, target_id: &str, outcome: &mut TargetOutcome) {
        if self.plan.conditions.is_empty() {
            return;
        }
        let Some(target) = draft.document_mut(target_id) else {
            return;
        };
        let mut conditions = target.conditions();
        for tag in &self.plan.conditions {
            if conditions.insert(tag) {
                outcome.conditions_applied.push(tag.to_lowercase());
            }
        }
        target.set_conditions(&conditions);
    }

    async fn attack_target(
        &mut self,
        draft: &mut GameState,
        target_id: &str,
        attack_bonus: i32,
        advantage: AdvantageMode,
        range: Option<&WeaponRange>,
    ) -> Result<TargetOutcome, Skip> {
        let (name, armor_class) = {
            let target = resolve_target(draft, target_id, !self.plan.damage.is_empty())?;
            let armor_class = target
                .armor_class()
                .ok_or_else(|| Skip::Reason(format!("{} has no armor class", target.name)))?;
            (target.name.clone(), armor_class)
        };

        let mut advantage = advantage;
        if let Some(range) = range {
            let check = resolve_range(draft.encounter.as_ref(), &self.plan.actor_id, target_id, range);
            if !check.legal {
                self.chat(format!("{} cannot reach {}: {}", self.speaker, name, check.summary()))
                    .await;
                return Ok(TargetOutcome::new(target_id, TargetStatus::OutOfRange)
                    .with_reason(check.summary()));
            }
            if check.disadvantage {
                self.chat(format!("Disadvantage: {}", check.summary())).await;
                advantage = advantage.combine(AdvantageMode::Disadvantage);
            }
        }

        let request = RollRequest::d20(
            self.plan.roller.as_deref(),
            RollKind::Attack,
            format!("{}: attack against {}", self.plan.label, name),
            advantage,
        )
        .with_modifier("attack_bonus", attack_bonus);
        let result = self.channel.send_roll_request(request).await?;
        let mut processed = process(&result, D20Options::for_kind(RollKind::Attack))?;

        let critical = processed.is_critical_hit;
        let total = processed.calculated_total;
        let hit = is_hit(total, armor_class, critical);
        let (status, verb) = match (hit, critical) {
            (true, true) => (TargetStatus::CriticalHit, "critically hits"),
            (true, false) => (TargetStatus::Hit, "hits"),
            _ => (TargetStatus::Missed, "misses"),
        };
        debug!("{} attack on {}: {} vs AC {}", self.plan.label, target_id, total, armor_class);

        processed = processed.with_follow_up(FollowUp::chat(format!(
            "{} {} {} ({} vs AC {}).",
            self.speaker, verb, name, total, armor_class
        )));
        if hit && !self.plan.damage.is_empty() {
            processed = processed.with_follow_up(FollowUp::RollRequest {
                issuer_id: self.plan.roller.clone(),
                roll_kind: RollKind::Damage,
                roll_spec: self.damage_formulas(critical),
            });
        }

        let mut outcome = TargetOutcome::new(target_id, status).with_roll(total);
        for follow_up in std::mem::take(&mut processed.follow_up_actions) {
            match follow_up {
                FollowUp::ChatMessage { message, .. } => self.chat(message).await,
                FollowUp::RollRequest { roll_spec, .. } => {
                    let totals = self.roll_damage(roll_spec, critical).await?;
                    self.deal_damage(draft, target_id, &totals, false, &mut outcome)
                        .await;
                }
                other => self.report.follow_ups.push(other),
            }
        }
        if hit {
            self.apply_conditions(draft, target_id, &mut outcome);
        }
        Ok(outcome)
    }

    async fn attack_all(
        &mut self,
        draft: &mut GameState,
        target_ids: &[DocumentId],
        attack_bonus: i32,
        advantage: AdvantageMode,
        range: Option<&WeaponRange>,
    ) -> Result<(), ActionError> {
        for target_id in target_ids {
            let result = self
                .attack_target(draft, target_id, attack_bonus, advantage, range)
                .await;
            self.settle(target_id, result).await?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn save_target(
        &mut self,
        draft: &mut GameState,
        target_id: &str,
        name: &str,
        rolled: Result<RollResult, ChannelError>,
        ability: Ability,
        dc: i32,
        half_on_save: bool,
        damage: &mut Option<Vec<i32>>,
    ) -> Result<TargetOutcome, Skip> {
        let result = rolled?;
        let processed = process(&result, D20Options::for_kind(RollKind::SavingThrow))?;
        let total = processed.calculated_total;
        let saved = total >= dc;

        self.chat(format!(
            "{} {} the {} save ({} vs DC {}).",
            name,
            if saved { "succeeds on" } else { "fails" },
            ability.as_str().to_uppercase(),
            total,
            dc
        ))
        .await;

        let status = if saved {
            TargetStatus::Saved
        } else {
            TargetStatus::FailedSave
        };
        let mut outcome = TargetOutcome::new(target_id, status).with_roll(total);
        if !self.plan.damage.is_empty() && (!saved || half_on_save) {
            let totals = self.shared_damage(damage).await?;
            self.deal_damage(draft, target_id, &totals, saved, &mut outcome)
                .await;
        }
        if !saved {
            self.apply_conditions(draft, target_id, &mut outcome);
        }
        Ok(outcome)
    }

    async fn save_all(
        &mut self,
        draft: &mut GameState,
        target_ids: &[DocumentId],
        ability: Ability,
        dc: i32,
        half_on_save: bool,
    ) -> Result<(), ActionError> {
        let needs_hp = !self.plan.damage.is_empty();
        let mut names = Vec::with_capacity(target_ids.len());
        let mut requests = Vec::new();
        for target_id in target_ids {
            match resolve_target(draft, target_id, needs_hp) {
                Ok(target) => {
                    // Targets roll their own saves
                    requests.push(
                        RollRequest::d20(
                            target.owner_id.as_deref(),
                            RollKind::SavingThrow,
                            format!(
                                "{}: {} {} save (DC {})",
                                self.plan.label,
                                target.name,
                                ability.as_str().to_uppercase(),
                                dc
                            ),
                            AdvantageMode::Normal,
                        )
                        .with_modifier("save_bonus", target.save_bonus(ability)),
                    );
                    names.push(Ok(target.name.clone()));
                }
                Err(skip) => names.push(Err(skip)),
            }
        }

        let mut rolled: VecDeque<_> = if requests.is_empty() {
            VecDeque::new()
        } else {
            self.channel
                .send_multiple_roll_requests(requests)
                .await
                .into_iter()
                .collect()
        };

        let mut damage = None;
        for (target_id, name) in target_ids.iter().zip(names) {
            let result = match name {
                Err(skip) => Err(skip),
                Ok(name) => {
                    let save = rolled
                        .pop_front()
                        .unwrap_or_else(|| Err(ChannelError::InvalidResponse("missing save".into())));
                    self.save_target(
                        draft,
                        target_id,
                        &name,
                        save,
                        ability,
                        dc,
                        half_on_save,
                        &mut damage,
                    )
                    .await
                }
            };
            self.settle(target_id, result).await?;
        }
        Ok(())
    }

    async fn automatic_all(
        &mut self,
        draft: &mut GameState,
        target_ids: &[DocumentId],
    ) -> Result<(), ActionError> {
        let needs_hp = !self.plan.damage.is_empty();
        let mut damage = None;
        for target_id in target_ids {
            let result = match resolve_target(draft, target_id, needs_hp) {
                Err(skip) => Err(skip),
                Ok(_) => {
                    let mut outcome = TargetOutcome::new(target_id, TargetStatus::Affected);
                    let mut failed = None;
                    if needs_hp {
                        match self.shared_damage(&mut damage).await {
                            Ok(totals) => {
                                self.deal_damage(draft, target_id, &totals, false, &mut outcome)
                                    .await
                            }
                            Err(skip) => failed = Some(skip),
                        }
                    }
                    match failed {
                        Some(skip) => Err(skip),
                        None => {
                            self.apply_conditions(draft, target_id, &mut outcome);
                            Ok(outcome)
                        }
                    }
                }
            };
            self.settle(target_id, result).await?;
        }
        Ok(())
    }
}

/// Resolve an effect against targets in order
///
/// Mutates only `draft`. Per-target failures are reported and skipped.
pub async fn run_workflow(
    plan: &EffectPlan,
    target_ids: &[DocumentId],
    draft: &mut GameState,
    channel: &dyn Channel,
) -> Result<WorkflowReport, ActionError> {
    let speaker = draft
        .document(&plan.actor_id)
        .map(|d| d.name.clone())
        .unwrap_or_else(|| plan.actor_id.clone());
    let mut run = Workflow {
        plan,
        channel,
        speaker,
        report: WorkflowReport::default(),
    };

    match &plan.resolution {
        Resolution::AttackRoll {
            attack_bonus,
            advantage,
            range,
        } => {
            run.attack_all(draft, target_ids, *attack_bonus, *advantage, range.as_ref())
                .await?
        }
        Resolution::SavingThrow {
            ability,
            dc,
            half_on_save,
        } => {
            run.save_all(draft, target_ids, *ability, *dc, *half_on_save)
                .await?
        }
        Resolution::Automatic => run.automatic_all(draft, target_ids).await?,
    }
    Ok(run.report)
}

/// Halve the summed damage, rounded down, and share it back across the
/// parts in proportion; rounding leftovers go to the earliest parts
fn halve_parts(raw: &[u32]) -> Vec<u32> {
    let whole: u64 = raw.iter().map(|&r| u64::from(r)).sum();
    if whole == 0 {
        return vec![0; raw.len()];
    }
    let half = whole / 2;
    let mut parts: Vec<u32> = raw
        .iter()
        .map(|&r| (u64::from(r) * half / whole) as u32)
        .collect();
    let mut leftover = half - parts.iter().map(|&p| u64::from(p)).sum::<u64>();
    for (part, &r) in parts.iter_mut().zip(raw) {
        if leftover == 0 {
            break;
        }
        if *part < r {
            *part += 1;
            leftover -= 1;
        }
    }
    parts
}
