//! Research system: project lifecycle and debt-reduction actions.
//!
//! Composes the quality model with the technical debt ledger. A project's
//! quality is fixed when it is created, and so are its cost (paid up front)
//! and its duration in turns. Completing it applies the quality's debt delta
//! exactly once and, on a successful roll, its doom and reputation outcome
//! scaled by the current debt speed penalty.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::action_rules::Rule;
use crate::config::ResearchConstants;
use crate::debt::DebtCategory;
use crate::domain::{GameState, Resource};
use crate::error::{SimError, SimResult};
use crate::quality::{ResearchOutcome, ResearchQuality};
use crate::random::KeyedRng;

pub type ProjectId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchProject {
    pub id: ProjectId,
    pub name: String,
    pub base_cost: i64,
    pub base_duration: i64,
    pub quality_level: ResearchQuality,
    pub completed: bool,
    pub base_doom_reduction: i64,
    pub base_reputation_gain: i64,
    pub started_turn: u32,
}

impl ResearchProject {
    pub fn cost(&self) -> i64 {
        self.quality_level.modifiers().adjusted_cost(self.base_cost)
    }

    pub fn duration(&self) -> i64 {
        self.quality_level.modifiers().adjusted_duration(self.base_duration)
    }

    /// First turn on which the project can be completed.
    pub fn ready_turn(&self) -> u32 {
        let duration = u32::try_from(self.duration()).unwrap_or(u32::MAX);
        self.started_turn.saturating_add(duration)
    }
}

/// What completing a project did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectReport {
    pub project_id: ProjectId,
    pub quality: ResearchQuality,
    pub success: bool,
    pub outcome: ResearchOutcome,
    pub doom_reduced: i64,
    pub reputation_gained: i64,
    /// Signed change to accumulated debt.
    pub debt_change: i64,
    pub reputation_lost: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtReductionAction {
    RefactoringSprint,
    SafetyAudit,
    CodeReview,
}

impl DebtReductionAction {
    pub const ALL: [DebtReductionAction; 3] = [
        DebtReductionAction::RefactoringSprint,
        DebtReductionAction::SafetyAudit,
        DebtReductionAction::CodeReview,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DebtReductionAction::RefactoringSprint => "Refactoring Sprint",
            DebtReductionAction::SafetyAudit => "Safety Audit",
            DebtReductionAction::CodeReview => "Code Review",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.name() == name)
    }

    pub fn money_cost(&self) -> i64 {
        match self {
            DebtReductionAction::RefactoringSprint => 80,
            DebtReductionAction::SafetyAudit => 60,
            DebtReductionAction::CodeReview => 30,
        }
    }

    pub fn action_points(&self) -> i64 {
        match self {
            DebtReductionAction::RefactoringSprint => 2,
            DebtReductionAction::SafetyAudit | DebtReductionAction::CodeReview => 1,
        }
    }

    /// Inclusive range of debt points removed.
    pub fn reduction_range(&self) -> (i64, i64) {
        match self {
            DebtReductionAction::RefactoringSprint => (3, 5),
            DebtReductionAction::SafetyAudit => (2, 4),
            DebtReductionAction::CodeReview => (1, 2),
        }
    }

    /// `None` drains the largest categories first.
    pub fn category(&self) -> Option<DebtCategory> {
        match self {
            DebtReductionAction::SafetyAudit => Some(DebtCategory::Safety),
            DebtReductionAction::RefactoringSprint | DebtReductionAction::CodeReview => None,
        }
    }

    pub fn requirement(&self) -> Rule {
        match self {
            DebtReductionAction::RefactoringSprint => Rule::min_resource(Resource::Staff, 3),
            DebtReductionAction::SafetyAudit => Rule::MinTurn(3),
            DebtReductionAction::CodeReview => Rule::Always,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchSummary {
    pub current_quality: ResearchQuality,
    pub active_projects: usize,
    pub completed_projects: usize,
    pub completed_by_quality: BTreeMap<ResearchQuality, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchSystem {
    constants: ResearchConstants,
    current_quality: ResearchQuality,
    active_projects: Vec<ResearchProject>,
    completed_projects: Vec<ResearchProject>,
    next_project_id: ProjectId,
    debt_actions_taken: u64,
}

impl ResearchSystem {
    pub fn new(constants: ResearchConstants) -> Self {
        Self {
            constants,
            current_quality: ResearchQuality::default(),
            active_projects: Vec::new(),
            completed_projects: Vec::new(),
            next_project_id: 1,
            debt_actions_taken: 0,
        }
    }

    pub fn current_quality(&self) -> ResearchQuality {
        self.current_quality
    }

    pub fn active_projects(&self) -> &[ResearchProject] {
        &self.active_projects
    }

    pub fn completed_projects(&self) -> &[ResearchProject] {
        &self.completed_projects
    }

    pub fn project(&self, id: ProjectId) -> Option<&ResearchProject> {
        self.active_projects
            .iter()
            .chain(self.completed_projects.iter())
            .find(|p| p.id == id)
    }

    /// Research-heavy labs see more research setbacks and data loss.
    pub fn is_research_heavy(&self, state: &GameState) -> bool {
        let roster = state.researchers.as_ref().map_or(0, |r| r.len());
        roster >= 3 || self.active_projects.len() >= 2
    }

    /// Quality applied to projects created from now on.
    pub fn set_research_quality(&mut self, quality: ResearchQuality, state: &mut GameState) {
        self.current_quality = quality;
        state.push_message(format!("Research quality set to {}.", quality.name()));
        tracing::info!(quality = quality.name(), "research quality changed");
    }

    /// Start a project at the current quality level, paying its
    /// quality-adjusted cost.
    pub fn create_research_project(
        &mut self,
        name: &str,
        base_cost: i64,
        base_duration: i64,
        state: &mut GameState,
    ) -> SimResult<ProjectId> {
        let id = self.next_project_id;
        let project = ResearchProject {
            id,
            name: name.to_string(),
            base_cost,
            base_duration,
            quality_level: self.current_quality,
            completed: false,
            base_doom_reduction: 0,
            base_reputation_gain: 0,
            started_turn: state.turn,
        };
        let label = format!("start {}", name);
        let cost = project.cost();
        state.check_costs(&label, cost, 0)?;
        state.pay(&label, cost, 0);

        self.next_project_id += 1;
        state.push_message(format!(
            "Started {} research: {} (cost {}, {} turns).",
            project.quality_level.name(),
            project.name,
            project.cost(),
            project.duration()
        ));
        tracing::info!(id, name, cost, quality = project.quality_level.name(), "research project created");
        self.active_projects.push(project);
        Ok(id)
    }

    /// Set the doom and reputation a still-active project yields on success.
    pub fn set_project_impact(
        &mut self,
        id: ProjectId,
        base_doom_reduction: i64,
        base_reputation_gain: i64,
    ) -> SimResult<()> {
        let project = self
            .active_projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(SimError::ProjectNotFound(id))?;
        project.base_doom_reduction = base_doom_reduction;
        project.base_reputation_gain = base_reputation_gain;
        Ok(())
    }

    /// Move a project from active to completed and apply its effects.
    ///
    /// Fails with `ProjectNotFound` for unknown or already completed
    /// projects, so the debt delta can never be applied twice, and with
    /// `ProjectInProgress` before the project's duration has elapsed.
    pub fn complete_research_project(
        &mut self,
        id: ProjectId,
        state: &mut GameState,
        rng: &KeyedRng,
    ) -> SimResult<ProjectReport> {
        let Some(pos) = self.active_projects.iter().position(|p| p.id == id) else {
            let err = SimError::ProjectNotFound(id);
            tracing::warn!(error = %err, "cannot complete research project");
            state.push_message(err.to_string());
            return Err(err);
        };
        let ready = self.active_projects[pos].ready_turn();
        if state.turn < ready {
            let turns_left = i64::from(ready - state.turn);
            return reject(state, SimError::ProjectInProgress { id, turns_left });
        }
        let mut project = self.active_projects.remove(pos);
        let mods = project.quality_level.modifiers();
        let draw = rng.draw(format!("research_{}_turn_{}", id, state.turn));

        // Outcome uses the penalty the project was carried out under.
        let speed_penalty = state.technical_debt.speed_penalty_fp();
        let success_rate = mods.adjusted_success_rate(self.constants.base_success_rate);
        let success = draw.chance_for("success", success_rate);

        let debt_before = state.technical_debt.accumulated_debt();
        if mods.debt_delta > 0 {
            let key = format!("{}_debt", draw.key());
            state.technical_debt.add_debt(mods.debt_delta, None, rng, &key);
        } else if mods.debt_delta < 0 {
            state.technical_debt.reduce_debt(-mods.debt_delta, None);
        }
        let debt_change = state.technical_debt.accumulated_debt() - debt_before;

        let (outcome, doom_reduced, reputation_gained) = if success {
            let outcome = mods.calculate_outcome(
                project.base_doom_reduction,
                project.base_reputation_gain,
                speed_penalty,
            );
            let doom = -state.add(Resource::Doom, -outcome.doom_reduction(), Some(project.name.as_str()));
            let rep = state.add(Resource::Reputation, outcome.reputation_gain(), Some(project.name.as_str()));
            (outcome, doom, rep)
        } else {
            (ResearchOutcome::default(), 0, 0)
        };

        let mut reputation_lost = 0;
        if project.quality_level == ResearchQuality::Rushed
            && state.technical_debt.has_reputation_risk()
            && draw.chance_for("reputation_risk", self.constants.reputation_risk_chance)
        {
            reputation_lost = -state.add(Resource::Reputation, -1, Some("rushed research under heavy debt"));
            state.push_message(format!("Corners cut on {} drew criticism.", project.name));
        }

        project.completed = true;
        if success {
            state.push_message(format!(
                "Completed {}: doom -{}, reputation +{}.",
                project.name, doom_reduced, reputation_gained
            ));
        } else {
            state.push_message(format!("{} finished without useful results.", project.name));
        }
        tracing::info!(
            id,
            quality = project.quality_level.name(),
            success,
            doom_reduced,
            debt_change,
            "research project completed"
        );

        let report = ProjectReport {
            project_id: id,
            quality: project.quality_level,
            success,
            outcome,
            doom_reduced,
            reputation_gained,
            debt_change,
            reputation_lost,
        };
        self.completed_projects.push(project);
        Ok(report)
    }

    pub fn available_debt_reduction_actions(&self, state: &GameState) -> Vec<DebtReductionAction> {
        DebtReductionAction::ALL
            .into_iter()
            .filter(|a| a.requirement().evaluate(state))
            .collect()
    }

    /// Run one of the fixed debt-reduction actions by display name.
    /// Returns the amount of debt actually removed.
    pub fn execute_debt_reduction_action(
        &mut self,
        name: &str,
        state: &mut GameState,
        rng: &KeyedRng,
    ) -> SimResult<i64> {
        let Some(action) = DebtReductionAction::from_name(name) else {
            return reject(state, SimError::UnknownAction(name.to_string()));
        };
        if !action.requirement().evaluate(state) {
            return reject(state, SimError::ActionUnavailable(name.to_string()));
        }
        state.check_costs(name, action.money_cost(), action.action_points())?;
        state.pay(name, action.money_cost(), action.action_points());

        self.debt_actions_taken += 1;
        let key = format!("debt_action_{}_turn_{}", self.debt_actions_taken, state.turn);
        let (low, high) = action.reduction_range();
        let amount = rng.integer(low, high, &key);
        let reduced = state.technical_debt.reduce_debt(amount, action.category());

        state.push_message(format!("{}: technical debt reduced by {}.", name, reduced));
        tracing::info!(action = name, rolled = amount, reduced, "debt reduction action");
        Ok(reduced)
    }

    pub fn get_research_summary(&self) -> ResearchSummary {
        let mut completed_by_quality = BTreeMap::new();
        for p in &self.completed_projects {
            *completed_by_quality.entry(p.quality_level).or_insert(0) += 1;
        }
        ResearchSummary {
            current_quality: self.current_quality,
            active_projects: self.active_projects.len(),
            completed_projects: self.completed_projects.len(),
            completed_by_quality,
        }
    }
}

fn reject<T>(state: &mut GameState, err: SimError) -> SimResult<T> {
    tracing::warn!(error = %err, "research action rejected");
    state.push_message(err.to_string());
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arithmetic::{pct, SCALE};
    use crate::state::blank_state;

    fn always_succeeds() -> ResearchSystem {
        ResearchSystem::new(ResearchConstants {
            base_success_rate: pct(110),
            reputation_risk_chance: SCALE,
        })
    }

    fn start(system: &mut ResearchSystem, state: &mut GameState, quality: ResearchQuality) -> ProjectId {
        system.set_research_quality(quality, state);
        let id = system
            .create_research_project("Interpretability", 100, 10, state)
            .unwrap();
        system.set_project_impact(id, 10, 2).unwrap();
        id
    }

    /// Wait out the project's duration, then complete it.
    fn finish(
        system: &mut ResearchSystem,
        state: &mut GameState,
        id: ProjectId,
        rng: &KeyedRng,
    ) -> SimResult<ProjectReport> {
        if let Some(p) = system.project(id) {
            state.turn = state.turn.max(p.ready_turn());
        }
        system.complete_research_project(id, state, rng)
    }

    #[test]
    fn quality_fixed_at_creation() {
        let mut state = blank_state();
        let mut system = always_succeeds();
        let id = start(&mut system, &mut state, ResearchQuality::Rushed);
        system.set_research_quality(ResearchQuality::Thorough, &mut state);
        let p = system.project(id).unwrap();
        assert_eq!(p.quality_level, ResearchQuality::Rushed);
        assert_eq!(p.cost(), 80);
        assert_eq!(p.duration(), 6);
    }

    #[test]
    fn rushed_completion_truncates_doom_and_adds_debt() {
        let mut state = blank_state();
        state.resources.doom = 50;
        let mut system = always_succeeds();
        let id = start(&mut system, &mut state, ResearchQuality::Rushed);
        let report = finish(&mut system, &mut state, id, &KeyedRng::new(1)).unwrap();
        assert!(report.success);
        assert_eq!(report.outcome.doom_reduction_fp, 85_000);
        assert_eq!(report.doom_reduced, 8);
        assert_eq!(state.resources.doom, 42);
        assert_eq!(report.debt_change, 2);
        assert_eq!(state.technical_debt.accumulated_debt(), 2);
        assert!(state.technical_debt.is_consistent());
        assert!(system.active_projects().is_empty());
        assert!(system.completed_projects()[0].completed);
    }

    #[test]
    fn thorough_completion_is_more_effective() {
        let mut state = blank_state();
        state.resources.doom = 50;
        state
            .technical_debt
            .add_debt(3, Some(DebtCategory::Testing), &KeyedRng::new(0), "setup");
        let mut system = always_succeeds();
        let rep = state.resources.reputation;
        let id = start(&mut system, &mut state, ResearchQuality::Thorough);
        let report = finish(&mut system, &mut state, id, &KeyedRng::new(1)).unwrap();
        assert_eq!(report.doom_reduced, 12);
        assert_eq!(report.reputation_gained, 3);
        assert_eq!(state.resources.reputation, rep + 3);
        assert_eq!(report.debt_change, -1);
        assert_eq!(state.technical_debt.category_debt(DebtCategory::Testing), 2);
    }

    #[test]
    fn debt_penalty_scales_outcome() {
        let mut state = blank_state();
        state.resources.doom = 50;
        // Critical tier, 0.80 speed
        state
            .technical_debt
            .add_debt(30, Some(DebtCategory::Reliability), &KeyedRng::new(0), "setup");
        let mut system = always_succeeds();
        let id = start(&mut system, &mut state, ResearchQuality::Standard);
        let report = finish(&mut system, &mut state, id, &KeyedRng::new(1)).unwrap();
        assert_eq!(report.doom_reduced, 8);
    }

    #[test]
    fn completion_happens_exactly_once() {
        let mut state = blank_state();
        let mut system = always_succeeds();
        let id = start(&mut system, &mut state, ResearchQuality::Rushed);
        let rng = KeyedRng::new(5);
        finish(&mut system, &mut state, id, &rng).unwrap();
        let err = finish(&mut system, &mut state, id, &rng).unwrap_err();
        assert_eq!(err, SimError::ProjectNotFound(id));
        assert_eq!(state.technical_debt.accumulated_debt(), 2);
        assert_eq!(system.completed_projects().len(), 1);
    }

    #[test]
    fn failed_project_still_carries_debt() {
        let mut state = blank_state();
        state.resources.doom = 50;
        let mut system = ResearchSystem::new(ResearchConstants {
            base_success_rate: pct(5),
            reputation_risk_chance: 0,
        });
        let id = start(&mut system, &mut state, ResearchQuality::Rushed);
        let report = finish(&mut system, &mut state, id, &KeyedRng::new(2)).unwrap();
        assert!(!report.success);
        assert_eq!(state.resources.doom, 50);
        assert_eq!(state.technical_debt.accumulated_debt(), 2);
    }

    #[test]
    fn rushed_work_under_heavy_debt_risks_reputation() {
        let mut state = blank_state();
        state
            .technical_debt
            .add_debt(18, Some(DebtCategory::Safety), &KeyedRng::new(0), "setup");
        let mut system = always_succeeds();
        let id = system.create_research_project("Scaling", 50, 4, &mut state).unwrap();
        system.set_research_quality(ResearchQuality::Rushed, &mut state);
        let rushed = system
            .create_research_project("Scaling II", 50, 4, &mut state)
            .unwrap();
        let rng = KeyedRng::new(3);
        assert_eq!(finish(&mut system, &mut state, id, &rng).unwrap().reputation_lost, 0);
        assert_eq!(finish(&mut system, &mut state, rushed, &rng).unwrap().reputation_lost, 1);
    }

    #[test]
    fn research_heavy_threshold() {
        let mut state = blank_state();
        let mut system = always_succeeds();
        assert!(!system.is_research_heavy(&state));
        system.create_research_project("a", 10, 1, &mut state).unwrap();
        system.create_research_project("b", 10, 1, &mut state).unwrap();
        assert!(system.is_research_heavy(&state));
    }

    #[test]
    fn code_review_reduces_within_range() {
        let mut state = blank_state();
        state
            .technical_debt
            .add_debt(10, Some(DebtCategory::Documentation), &KeyedRng::new(0), "setup");
        let mut system = always_succeeds();
        let reduced = system
            .execute_debt_reduction_action("Code Review", &mut state, &KeyedRng::new(9))
            .unwrap();
        assert!((1..=2).contains(&reduced));
        assert_eq!(state.technical_debt.accumulated_debt(), 10 - reduced);
        assert_eq!(state.resources.money, 270);
        assert_eq!(state.action_points, 2);
    }

    #[test]
    fn safety_audit_only_touches_safety() {
        let mut state = blank_state();
        state.turn = 3;
        let rng = KeyedRng::new(0);
        state.technical_debt.add_debt(1, Some(DebtCategory::Safety), &rng, "setup");
        state.technical_debt.add_debt(9, Some(DebtCategory::Testing), &rng, "setup");
        let mut system = always_succeeds();
        let reduced = system.execute_debt_reduction_action("Safety Audit", &mut state, &rng).unwrap();
        assert_eq!(reduced, 1);
        assert_eq!(state.technical_debt.category_debt(DebtCategory::Safety), 0);
        assert_eq!(state.technical_debt.category_debt(DebtCategory::Testing), 9);
    }

    #[test]
    fn requirements_gate_actions() {
        let mut state = blank_state();
        let mut system = always_succeeds();
        let rng = KeyedRng::new(0);
        assert_eq!(
            system.available_debt_reduction_actions(&state),
            vec![DebtReductionAction::CodeReview]
        );
        let err = system
            .execute_debt_reduction_action("Refactoring Sprint", &mut state, &rng)
            .unwrap_err();
        assert_eq!(err, SimError::ActionUnavailable("Refactoring Sprint".to_string()));
        let err = system.execute_debt_reduction_action("Safety Audit", &mut state, &rng).unwrap_err();
        assert_eq!(err, SimError::ActionUnavailable("Safety Audit".to_string()));
        assert_eq!(state.resources.money, 300);

        state.resources.staff = 3;
        state.turn = 3;
        assert_eq!(system.available_debt_reduction_actions(&state).len(), 3);
    }

    #[test]
    fn rejected_actions_cost_nothing() {
        let mut state = blank_state();
        state.resources.staff = 3;
        state.action_points = 1;
        let mut system = always_succeeds();
        let rng = KeyedRng::new(0);
        let err = system
            .execute_debt_reduction_action("Refactoring Sprint", &mut state, &rng)
            .unwrap_err();
        assert_eq!(err, SimError::action_points(2, 1));
        assert_eq!(state.resources.money, 300);

        let err = system.execute_debt_reduction_action("Pair Programming", &mut state, &rng).unwrap_err();
        assert_eq!(err, SimError::UnknownAction("Pair Programming".to_string()));
        assert_eq!(state.messages.len(), 2);
    }

    #[test]
    fn summary_counts_by_quality() {
        let mut state = blank_state();
        state.resources.money = 1_000;
        let mut system = always_succeeds();
        let rng = KeyedRng::new(4);
        let a = start(&mut system, &mut state, ResearchQuality::Rushed);
        let b = start(&mut system, &mut state, ResearchQuality::Thorough);
        start(&mut system, &mut state, ResearchQuality::Thorough);
        finish(&mut system, &mut state, a, &rng).unwrap();
        finish(&mut system, &mut state, b, &rng).unwrap();
        let s = system.get_research_summary();
        assert_eq!(s.active_projects, 1);
        assert_eq!(s.completed_projects, 2);
        assert_eq!(s.completed_by_quality[&ResearchQuality::Thorough], 1);
        assert_eq!(s.current_quality, ResearchQuality::Thorough);
    }

    #[test]
    fn creation_pays_quality_adjusted_cost() {
        let mut state = blank_state();
        state.resources.money = 1_000;
        let mut system = always_succeeds();
        start(&mut system, &mut state, ResearchQuality::Rushed);
        assert_eq!(state.resources.money, 920);
        start(&mut system, &mut state, ResearchQuality::Standard);
        assert_eq!(state.resources.money, 820);
        start(&mut system, &mut state, ResearchQuality::Thorough);
        assert_eq!(state.resources.money, 680);
    }

    #[test]
    fn unaffordable_project_is_not_started() {
        let mut state = blank_state();
        state.resources.money = 120;
        let mut system = always_succeeds();
        system.set_research_quality(ResearchQuality::Thorough, &mut state);
        let err = system
            .create_research_project("Interpretability", 100, 10, &mut state)
            .unwrap_err();
        assert_eq!(err, SimError::money(140, 120));
        assert_eq!(state.resources.money, 120);
        assert!(system.active_projects().is_empty());
        assert!(state.messages.last().unwrap().starts_with("Cannot start Interpretability"));

        // The same project rushed fits the budget.
        system.set_research_quality(ResearchQuality::Rushed, &mut state);
        let id = system
            .create_research_project("Interpretability", 100, 10, &mut state)
            .unwrap();
        assert_eq!(id, 1);
        assert_eq!(state.resources.money, 40);

        let err = system.create_research_project("Free lunch", -50, 1, &mut state).unwrap_err();
        assert!(matches!(err, SimError::NegativeCost { .. }));
        assert_eq!(state.resources.money, 40);
    }

    #[test]
    fn completion_waits_for_duration() {
        let mut state = blank_state();
        state.resources.doom = 50;
        state.resources.money = 1_000;
        let mut system = always_succeeds();
        let rng = KeyedRng::new(6);
        let rushed = start(&mut system, &mut state, ResearchQuality::Rushed);
        let thorough = start(&mut system, &mut state, ResearchQuality::Thorough);
        assert_eq!(system.project(rushed).unwrap().ready_turn(), 6);
        assert_eq!(system.project(thorough).unwrap().ready_turn(), 16);

        let err = system.complete_research_project(rushed, &mut state, &rng).unwrap_err();
        assert_eq!(err, SimError::ProjectInProgress { id: rushed, turns_left: 6 });
        assert_eq!(state.resources.doom, 50);
        assert_eq!(state.technical_debt.accumulated_debt(), 0);

        state.turn = 6;
        assert!(system.complete_research_project(rushed, &mut state, &rng).unwrap().success);
        let err = system.complete_research_project(thorough, &mut state, &rng).unwrap_err();
        assert_eq!(err, SimError::ProjectInProgress { id: thorough, turns_left: 10 });
        assert_eq!(system.active_projects().len(), 1);

        state.turn = 16;
        assert!(system.complete_research_project(thorough, &mut state, &rng).is_ok());
        assert!(system.active_projects().is_empty());
    }
}
