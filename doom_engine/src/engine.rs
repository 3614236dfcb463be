//! GameEngine: the per-turn driver.
//!
//! Owns the hosting state and every subsystem. External code mutates only
//! through the methods below and reads through the accessors and summaries.
//!
//! `end_turn` order: events, cascade check, invariant check, turn advance.

use serde::{Deserialize, Serialize};

use crate::cascade::{
    CascadeResponse, CascadeTurnReport, FailureCascadeEngine, FailureCascadeSummary, FailureOutcome,
    FailureType, SingleFailureResponse,
};
use crate::catalog::default_registry;
use crate::config::EngineConfig;
use crate::debt::DebtSummary;
use crate::domain::{EconomicCycle, GameState, Opponent, Researcher, TurnLog};
use crate::error::SimResult;
use crate::events::{Event, EventAction, RegisteredEvent};
use crate::invariants::try_validate_invariants;
use crate::orchestrator::{EventOrchestrator, TurnReport};
use crate::quality::ResearchQuality;
use crate::random::KeyedRng;
use crate::research::{ProjectId, ProjectReport, ResearchSummary, ResearchSystem};
use crate::state::create_initial_state;

/// Everything that happened during one `end_turn`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndTurnReport {
    /// The turn that just ended.
    pub turn: u32,
    pub events: TurnReport,
    pub cascades: CascadeTurnReport,
    pub invariant_violation: Option<String>,
}

pub struct GameEngine {
    config: EngineConfig,
    rng: KeyedRng,
    state: GameState,
    orchestrator: EventOrchestrator,
    cascades: FailureCascadeEngine,
    research: ResearchSystem,
    turn_log: TurnLog,
    /// Turn whose events have already fired.
    events_triggered_turn: Option<u32>,
}

impl GameEngine {
    /// Engine with the default event registry.
    pub fn new(config: EngineConfig) -> SimResult<Self> {
        Self::with_registry(config, default_registry())
    }

    pub fn with_registry(config: EngineConfig, registry: Vec<RegisteredEvent>) -> SimResult<Self> {
        config.validate()?;
        tracing::info!(seed = config.seed, events = registry.len(), "engine created");
        Ok(Self {
            rng: KeyedRng::new(config.seed),
            state: create_initial_state(&config),
            orchestrator: EventOrchestrator::new(registry),
            cascades: FailureCascadeEngine::new(config.cascade.clone()),
            research: ResearchSystem::new(config.research.clone()),
            turn_log: TurnLog::default(),
            events_triggered_turn: None,
            config,
        })
    }

    // ── Accessors ──────────────────────────────────────────────────

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn rng(&self) -> &KeyedRng {
        &self.rng
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn orchestrator(&self) -> &EventOrchestrator {
        &self.orchestrator
    }

    pub fn cascades(&self) -> &FailureCascadeEngine {
        &self.cascades
    }

    pub fn research(&self) -> &ResearchSystem {
        &self.research
    }

    pub fn turn_log(&self) -> &TurnLog {
        &self.turn_log
    }

    pub fn events_triggered_turn(&self) -> Option<u32> {
        self.events_triggered_turn
    }

    pub fn debt_summary(&self) -> DebtSummary {
        self.state.technical_debt.summary()
    }

    // ── Host wiring ────────────────────────────────────────────────

    pub fn attach_researchers(&mut self, researchers: Vec<Researcher>) {
        self.state.researchers = Some(researchers);
    }

    pub fn attach_opponents(&mut self, opponents: Vec<Opponent>) {
        self.state.opponents = Some(opponents);
    }

    pub fn attach_economic_cycle(&mut self, cycle: EconomicCycle) {
        self.state.economic_cycle = Some(cycle);
    }

    pub fn set_milestone(&mut self, flag: &str) {
        self.state.milestones.insert(flag.to_string());
    }

    pub fn grant_upgrade(&mut self, key: &str) {
        self.state.upgrades.insert(key.to_string());
    }

    // ── Turn driver ────────────────────────────────────────────────

    /// Close the current turn. Events fire before the cascade check, so
    /// debt changed earlier in the turn is visible to this turn's roll.
    pub fn end_turn(&mut self) -> EndTurnReport {
        let turn = self.state.turn;
        let events = self.trigger_events();
        let research_heavy = self.research.is_research_heavy(&self.state);
        let cascades = self
            .cascades
            .check_for_cascades(&mut self.state, &self.rng, research_heavy);

        let invariant_violation = try_validate_invariants(self).err();
        if let Some(violation) = &invariant_violation {
            tracing::warn!(turn, violation = violation.as_str(), "invariant violated");
        }

        self.state.turn += 1;
        self.state.action_points = self.config.action_points_per_turn;
        tracing::debug!(turn, fired = events.fired.len(), "turn ended");

        EndTurnReport {
            turn,
            events,
            cascades,
            invariant_violation,
        }
    }

    /// One pass of the event registry for the current turn.
    ///
    /// Events fire at most once per turn. `end_turn` calls this too, so a
    /// host that triggers events early gets an empty report from the
    /// second call.
    pub fn trigger_events(&mut self) -> TurnReport {
        let turn = self.state.turn;
        if self.events_triggered_turn == Some(turn) {
            tracing::debug!(turn, "events already triggered this turn");
            return TurnReport::default();
        }
        self.events_triggered_turn = Some(turn);
        self.orchestrator
            .trigger_events(&mut self.state, &self.rng, &mut self.turn_log)
    }

    // ── Events ─────────────────────────────────────────────────────

    pub fn pending_popup_events(&self) -> Vec<&Event> {
        self.orchestrator.pending_popup_events()
    }

    pub fn deferred_events(&self) -> Vec<&Event> {
        self.orchestrator.deferred_events()
    }

    pub fn handle_popup_event_action(&mut self, name: &str, action: EventAction) -> SimResult<()> {
        self.orchestrator
            .handle_popup_event_action(name, action, &mut self.state, &self.rng)
    }

    pub fn handle_deferred_event_action(&mut self, name: &str, action: EventAction) -> SimResult<()> {
        self.orchestrator
            .handle_deferred_event_action(name, action, &mut self.state, &self.rng)
    }

    // ── Failures and cascades ──────────────────────────────────────

    pub fn get_failure_cascade_summary(&self) -> FailureCascadeSummary {
        self.cascades.get_failure_cascade_summary()
    }

    pub fn get_resilience_bonus(&self, failure_type: FailureType) -> f64 {
        self.cascades.get_resilience_bonus(failure_type)
    }

    /// Inject a failure outside the per-turn roll.
    pub fn trigger_failure(&mut self, forced_type: Option<FailureType>) -> FailureOutcome {
        let research_heavy = self.research.is_research_heavy(&self.state);
        self.cascades
            .trigger_failure(&mut self.state, &self.rng, forced_type, research_heavy)
    }

    pub fn respond_to_failure(&mut self, response_id: u64, response: SingleFailureResponse) -> SimResult<()> {
        self.cascades
            .respond_to_failure(response_id, response, &mut self.state, &self.rng)
    }

    pub fn respond_to_cascade(&mut self, response_id: u64, response: CascadeResponse) -> SimResult<bool> {
        self.cascades
            .respond_to_cascade(response_id, response, &mut self.state, &self.rng)
    }

    pub fn upgrade_incident_response(&mut self, cost: i64) -> SimResult<u32> {
        self.cascades.upgrade_incident_response(cost, &mut self.state)
    }

    pub fn upgrade_monitoring_systems(&mut self, cost: i64) -> SimResult<u32> {
        self.cascades.upgrade_monitoring_systems(cost, &mut self.state)
    }

    pub fn upgrade_communication_protocols(&mut self, cost: i64) -> SimResult<u32> {
        self.cascades
            .upgrade_communication_protocols(cost, &mut self.state)
    }

    // ── Research ───────────────────────────────────────────────────

    pub fn set_research_quality(&mut self, quality: ResearchQuality) {
        self.research.set_research_quality(quality, &mut self.state);
    }

    pub fn create_research_project(
        &mut self,
        name: &str,
        base_cost: i64,
        base_duration: i64,
    ) -> SimResult<ProjectId> {
        self.research
            .create_research_project(name, base_cost, base_duration, &mut self.state)
    }

    pub fn set_project_impact(
        &mut self,
        id: ProjectId,
        base_doom_reduction: i64,
        base_reputation_gain: i64,
    ) -> SimResult<()> {
        self.research
            .set_project_impact(id, base_doom_reduction, base_reputation_gain)
    }

    pub fn complete_research_project(&mut self, id: ProjectId) -> SimResult<ProjectReport> {
        self.research
            .complete_research_project(id, &mut self.state, &self.rng)
    }

    pub fn execute_debt_reduction_action(&mut self, name: &str) -> SimResult<i64> {
        self.research
            .execute_debt_reduction_action(name, &mut self.state, &self.rng)
    }

    pub fn get_research_summary(&self) -> ResearchSummary {
        self.research.get_research_summary()
    }
}
