//! Failure cascade engine.
//!
//! Each turn: stale player decisions are auto-resolved, active cascades
//! advance one tick in creation order, then the debt ledger's accident
//! chance may start a new failure. A failure is either a near miss (no
//! impact, a lesson learned) or an actual failure whose cascade roll
//! decides between a single-failure response and a multi-turn cascade.
//!
//! Player choices are explicit `PendingResponse` values resolved by id;
//! nothing closes over engine state.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::arithmetic::{clamp_probability, fp_mul, pct, scale_mul, to_f64, SCALE};
use crate::config::CascadeConstants;
use crate::domain::{GameState, Resource};
use crate::error::{SimError, SimResult};
use crate::random::{Draw, KeyedRng};

/// Lessons beyond this stop adding resilience.
const MAX_RESILIENCE_FP: i64 = pct(50);
const RESILIENCE_PER_LESSON_FP: i64 = pct(10);

// ── Failure types ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    ResearchSetback,
    SafetyIncident,
    SecurityBreach,
    DataLoss,
    SystemCrash,
    CommunicationBreakdown,
    InfrastructureFailure,
}

impl FailureType {
    pub const ALL: [FailureType; 7] = [
        FailureType::ResearchSetback,
        FailureType::SafetyIncident,
        FailureType::SecurityBreach,
        FailureType::DataLoss,
        FailureType::SystemCrash,
        FailureType::CommunicationBreakdown,
        FailureType::InfrastructureFailure,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FailureType::ResearchSetback => "Research Setback",
            FailureType::SafetyIncident => "Safety Incident",
            FailureType::SecurityBreach => "Security Breach",
            FailureType::DataLoss => "Data Loss",
            FailureType::SystemCrash => "System Crash",
            FailureType::CommunicationBreakdown => "Communication Breakdown",
            FailureType::InfrastructureFailure => "Infrastructure Failure",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            FailureType::ResearchSetback => "an experiment invalidates weeks of results",
            FailureType::SafetyIncident => "a model behaves outside its tested envelope",
            FailureType::SecurityBreach => "an intruder reaches internal research systems",
            FailureType::DataLoss => "training data and checkpoints are corrupted",
            FailureType::SystemCrash => "core training infrastructure goes down",
            FailureType::CommunicationBreakdown => "teams act on conflicting information",
            FailureType::InfrastructureFailure => "the compute cluster fails under load",
        }
    }

    pub fn base_cascade_chance(&self) -> i64 {
        match self {
            FailureType::ResearchSetback => pct(20),
            FailureType::SafetyIncident => pct(35),
            FailureType::SecurityBreach => pct(30),
            FailureType::DataLoss => pct(25),
            FailureType::SystemCrash => pct(30),
            FailureType::CommunicationBreakdown => pct(20),
            FailureType::InfrastructureFailure => pct(35),
        }
    }

    pub fn cascade_targets(&self) -> BTreeSet<FailureType> {
        use FailureType::*;
        let targets: &[FailureType] = match self {
            ResearchSetback => &[DataLoss, CommunicationBreakdown],
            SafetyIncident => &[ResearchSetback, SecurityBreach, CommunicationBreakdown],
            SecurityBreach => &[SafetyIncident, DataLoss],
            DataLoss => &[ResearchSetback, SystemCrash],
            SystemCrash => &[DataLoss, InfrastructureFailure],
            CommunicationBreakdown => &[ResearchSetback, SafetyIncident],
            InfrastructureFailure => &[DataLoss, SystemCrash],
        };
        targets.iter().copied().collect()
    }

    /// Unmitigated resource impact at a given severity. Zero entries are omitted.
    pub fn base_impact(&self, severity: i64) -> BTreeMap<Resource, i64> {
        let s = severity;
        let entries: [(Resource, i64); 2] = match self {
            FailureType::ResearchSetback => [(Resource::Money, -2 * s), (Resource::Reputation, -(s / 3))],
            FailureType::SafetyIncident => [(Resource::Reputation, -(s / 2)), (Resource::Doom, s / 2)],
            FailureType::SecurityBreach => [(Resource::Money, -3 * s), (Resource::Reputation, -(s / 2))],
            FailureType::DataLoss => [(Resource::Money, -s), (Resource::Compute, -(s / 2))],
            FailureType::SystemCrash => [(Resource::Money, -2 * s), (Resource::Compute, -(s / 2))],
            FailureType::CommunicationBreakdown => [(Resource::Money, -s), (Resource::Reputation, -(s / 3))],
            FailureType::InfrastructureFailure => [(Resource::Money, -3 * s), (Resource::Compute, -(s / 2))],
        };
        entries.into_iter().filter(|(_, v)| *v != 0).collect()
    }
}

pub fn severity_label(severity: i64) -> &'static str {
    match severity {
        i64::MIN..=3 => "Minor",
        4..=6 => "Moderate",
        7..=8 => "Major",
        _ => "Critical",
    }
}

// ── Failure and cascade records ────────────────────────────────────

/// A failure that actually happened. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEvent {
    pub id: u64,
    pub failure_type: FailureType,
    /// 1..=10
    pub severity: i64,
    pub description: String,
    pub immediate_impact: BTreeMap<Resource, i64>,
    /// Fixed-point, within [0, SCALE].
    pub cascade_chance: i64,
    pub cascade_targets: BTreeSet<FailureType>,
    pub turn: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeState {
    pub id: u64,
    pub initiating_failure: FailureEvent,
    pub subsequent_failures: Vec<FailureEvent>,
    pub total_turns: u32,
    pub is_contained: bool,
    /// Fixed-point, within [0, SCALE].
    pub transparency_level: i64,
}

impl CascadeState {
    pub fn total_failures(&self) -> i64 {
        1 + self.subsequent_failures.len() as i64
    }

    pub fn failures(&self) -> impl Iterator<Item = &FailureEvent> {
        std::iter::once(&self.initiating_failure).chain(self.subsequent_failures.iter())
    }
}

// ── Player decisions ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SingleFailureResponse {
    Transparency,
    Investigation,
    CoverUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeResponse {
    AllHands,
    Systematic,
    Minimize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingKind {
    SingleFailure { failure: FailureEvent },
    Cascade { cascade_id: u64 },
}

/// A decision the player owes the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingResponse {
    pub id: u64,
    pub kind: PendingKind,
    pub raised_turn: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureOutcome {
    NearMiss {
        failure_type: FailureType,
        severity: i64,
    },
    Failure {
        failure_id: u64,
        failure_type: FailureType,
        severity: i64,
        response_id: u64,
        cascade_id: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CascadeTurnReport {
    pub auto_resolved: Vec<u64>,
    pub resolved_cascades: Vec<u64>,
    pub new_failure: Option<FailureOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeKind {
    IncidentResponse,
    MonitoringSystems,
    CommunicationProtocols,
}

impl UpgradeKind {
    pub fn label(&self) -> &'static str {
        match self {
            UpgradeKind::IncidentResponse => "Incident Response",
            UpgradeKind::MonitoringSystems => "Monitoring Systems",
            UpgradeKind::CommunicationProtocols => "Communication Protocols",
        }
    }
}

/// Read-only snapshot for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCascadeSummary {
    pub active_cascades: usize,
    pub total_failures: u64,
    pub near_misses: u64,
    /// Fixed-point.
    pub transparency_reputation: i64,
    pub cover_up_debt: i64,
    pub incident_response_level: u32,
    pub monitoring_systems: u32,
    pub communication_protocols: u32,
    pub lessons_learned: BTreeMap<FailureType, u32>,
    pub pending_responses: usize,
}

// ── Engine ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCascadeEngine {
    constants: CascadeConstants,
    active_cascades: Vec<CascadeState>,
    pending_responses: Vec<PendingResponse>,
    next_failure_id: u64,
    next_cascade_id: u64,
    next_response_id: u64,
    failure_attempts: u64,
    total_failures: u64,
    near_misses: u64,
    transparency_reputation: i64,
    cover_up_debt: i64,
    incident_response_level: u32,
    monitoring_systems: u32,
    communication_protocols: u32,
    lessons_learned: BTreeMap<FailureType, u32>,
}

impl FailureCascadeEngine {
    pub fn new(constants: CascadeConstants) -> Self {
        Self {
            constants,
            active_cascades: Vec::new(),
            pending_responses: Vec::new(),
            next_failure_id: 1,
            next_cascade_id: 1,
            next_response_id: 1,
            failure_attempts: 0,
            total_failures: 0,
            near_misses: 0,
            transparency_reputation: 0,
            cover_up_debt: 0,
            incident_response_level: 0,
            monitoring_systems: 0,
            communication_protocols: 0,
            lessons_learned: BTreeMap::new(),
        }
    }

    pub fn constants(&self) -> &CascadeConstants {
        &self.constants
    }

    pub fn active_cascades(&self) -> &[CascadeState] {
        &self.active_cascades
    }

    pub fn pending_responses(&self) -> &[PendingResponse] {
        &self.pending_responses
    }

    pub fn incident_response_level(&self) -> u32 {
        self.incident_response_level
    }

    pub fn monitoring_systems(&self) -> u32 {
        self.monitoring_systems
    }

    pub fn communication_protocols(&self) -> u32 {
        self.communication_protocols
    }

    pub fn lessons_learned(&self, failure_type: FailureType) -> u32 {
        self.lessons_learned.get(&failure_type).copied().unwrap_or(0)
    }

    pub fn resilience_fp(&self, failure_type: FailureType) -> i64 {
        (RESILIENCE_PER_LESSON_FP * self.lessons_learned(failure_type) as i64).min(MAX_RESILIENCE_FP)
    }

    /// Fraction of failure impact absorbed thanks to past lessons. Never above 0.5.
    pub fn get_resilience_bonus(&self, failure_type: FailureType) -> f64 {
        to_f64(self.resilience_fp(failure_type))
    }

    pub fn get_failure_cascade_summary(&self) -> FailureCascadeSummary {
        FailureCascadeSummary {
            active_cascades: self.active_cascades.len(),
            total_failures: self.total_failures,
            near_misses: self.near_misses,
            transparency_reputation: self.transparency_reputation,
            cover_up_debt: self.cover_up_debt,
            incident_response_level: self.incident_response_level,
            monitoring_systems: self.monitoring_systems,
            communication_protocols: self.communication_protocols,
            lessons_learned: self.lessons_learned.clone(),
            pending_responses: self.pending_responses.len(),
        }
    }

    fn learn(&mut self, failure_type: FailureType, lessons: u32) {
        *self.lessons_learned.entry(failure_type).or_insert(0) += lessons;
    }

    // ── Per-turn driver ────────────────────────────────────────────

    /// One turn of the cascade state machine.
    pub fn check_for_cascades(
        &mut self,
        state: &mut GameState,
        rng: &KeyedRng,
        research_heavy: bool,
    ) -> CascadeTurnReport {
        let mut report = CascadeTurnReport {
            auto_resolved: self.auto_resolve_stale(state, rng),
            ..CascadeTurnReport::default()
        };

        let ids: Vec<u64> = self.active_cascades.iter().map(|c| c.id).collect();
        for id in ids {
            if self.update_cascade(id, state, rng) {
                report.resolved_cascades.push(id);
            }
        }

        let accident = state.technical_debt.accident_chance_fp();
        if accident > 0 {
            let attempt = fp_mul(accident, self.constants.failure_attempt_factor);
            let key = format!("failure_check_turn_{}", state.turn);
            if rng.chance(&key, attempt) {
                report.new_failure = Some(self.trigger_failure(state, rng, None, research_heavy));
            }
        }
        report
    }

    /// Player decisions left open since an earlier turn get the default answer.
    fn auto_resolve_stale(&mut self, state: &mut GameState, rng: &KeyedRng) -> Vec<u64> {
        let stale: Vec<(u64, bool)> = self
            .pending_responses
            .iter()
            .filter(|p| p.raised_turn < state.turn)
            .map(|p| (p.id, matches!(p.kind, PendingKind::Cascade { .. })))
            .collect();
        let mut resolved = Vec::new();
        for (id, is_cascade) in stale {
            let result = if is_cascade {
                self.resolve_cascade_response(id, CascadeResponse::Systematic, state, rng, true)
                    .map(|_| ())
            } else {
                self.resolve_failure_response(id, SingleFailureResponse::Investigation, state, rng, true)
            };
            if result.is_ok() {
                resolved.push(id);
            }
        }
        resolved
    }

    // ── Failure generation ─────────────────────────────────────────

    /// Weighted draw of the next failure type given the lab's situation.
    pub fn select_failure_type(&self, state: &GameState, research_heavy: bool, draw: &Draw) -> FailureType {
        let weights: Vec<i64> = FailureType::ALL
            .iter()
            .map(|t| {
                let mut w = SCALE;
                match t {
                    FailureType::ResearchSetback | FailureType::DataLoss if research_heavy => w *= 2,
                    FailureType::SystemCrash | FailureType::InfrastructureFailure
                        if state.technical_debt.accumulated_debt() > 10 =>
                    {
                        w *= 2
                    }
                    FailureType::CommunicationBreakdown if state.resources.staff > 8 => w *= 2,
                    FailureType::SafetyIncident | FailureType::SecurityBreach
                        if state.resources.doom > 50 || state.resources.reputation < 5 =>
                    {
                        w *= 2
                    }
                    _ => {}
                }
                if *t == FailureType::CommunicationBreakdown {
                    w = scale_mul(w, SCALE - pct(10) * self.communication_protocols as i64);
                }
                w
            })
            .collect();
        draw.weighted_index("type", &weights)
            .map(|i| FailureType::ALL[i])
            .unwrap_or(FailureType::ResearchSetback)
    }

    /// `clamp(1, 10, base(3..=7) + debt/5 (<=3) + doom/25 (<=2) - response level (<=3))`.
    pub fn calculate_failure_severity(&self, state: &GameState, draw: &Draw) -> i64 {
        let base = draw.integer("severity", 3, 7);
        let debt_bonus = (state.technical_debt.accumulated_debt() / 5).clamp(0, 3);
        let doom_bonus = (state.resources.doom / 25).clamp(0, 2);
        let response_bonus = (self.incident_response_level as i64).min(3);
        (base + debt_bonus + doom_bonus - response_bonus).clamp(1, 10)
    }

    /// `base × severity/5 × (1 − 0.1 × incident response level)`, clamped to [0, SCALE].
    pub fn cascade_chance(&self, failure_type: FailureType, severity: i64) -> i64 {
        let scaled = failure_type.base_cascade_chance() * severity / 5;
        let mitigation = SCALE - pct(10) * self.incident_response_level as i64;
        clamp_probability(fp_mul(scaled, mitigation))
    }

    fn build_failure(&mut self, failure_type: FailureType, severity: i64, turn: u32) -> FailureEvent {
        let absorbed = self.resilience_fp(failure_type);
        let immediate_impact = failure_type
            .base_impact(severity)
            .into_iter()
            .map(|(r, v)| (r, scale_mul(v, SCALE - absorbed)))
            .filter(|(_, v)| *v != 0)
            .collect();
        let id = self.next_failure_id;
        self.next_failure_id += 1;
        FailureEvent {
            id,
            failure_type,
            severity,
            description: failure_type.description().to_string(),
            immediate_impact,
            cascade_chance: self.cascade_chance(failure_type, severity),
            cascade_targets: failure_type.cascade_targets(),
            turn,
        }
    }

    fn apply_impact(&mut self, failure: &FailureEvent, state: &mut GameState) {
        for (resource, delta) in &failure.immediate_impact {
            state.add(*resource, *delta, Some(failure.failure_type.name()));
        }
        self.total_failures += 1;
    }

    /// Roll a failure now. `forced_type` skips the weighted type draw.
    pub fn trigger_failure(
        &mut self,
        state: &mut GameState,
        rng: &KeyedRng,
        forced_type: Option<FailureType>,
        research_heavy: bool,
    ) -> FailureOutcome {
        self.failure_attempts += 1;
        let draw = rng.draw(format!("failure_{}_turn_{}", self.failure_attempts, state.turn));

        let failure_type = match forced_type {
            Some(t) => t,
            None => self.select_failure_type(state, research_heavy, &draw),
        };
        let severity = self.calculate_failure_severity(state, &draw);

        let near_miss_chance = self.constants.near_miss_base
            + self.constants.near_miss_per_monitoring * self.monitoring_systems as i64;
        if draw.chance_for("near_miss", near_miss_chance) {
            self.near_misses += 1;
            self.learn(failure_type, 1);
            if self.incident_response_level > 2 {
                state.add(Resource::Reputation, 1, Some("near miss handled well"));
            }
            state.push_message(format!(
                "Near miss: {} (severity {}) caught before it caused damage.",
                failure_type.name(),
                severity
            ));
            tracing::info!(failure = failure_type.name(), severity, "near miss");
            return FailureOutcome::NearMiss {
                failure_type,
                severity,
            };
        }

        let failure = self.build_failure(failure_type, severity, state.turn);
        self.apply_impact(&failure, state);
        state.push_message(format!(
            "{} {} (severity {}): {}.",
            severity_label(severity),
            failure_type.name(),
            severity,
            failure.description
        ));
        tracing::info!(
            failure = failure_type.name(),
            severity,
            cascade_chance = failure.cascade_chance,
            "failure occurred"
        );

        let failure_id = failure.id;
        let response_id = self.next_response_id;
        self.next_response_id += 1;

        let cascade_id = if draw.chance_for("cascade", failure.cascade_chance) {
            let id = self.next_cascade_id;
            self.next_cascade_id += 1;
            let transparency = (pct(50) + pct(5) * self.communication_protocols as i64).min(SCALE);
            self.active_cascades.push(CascadeState {
                id,
                initiating_failure: failure,
                subsequent_failures: Vec::new(),
                total_turns: 0,
                is_contained: false,
                transparency_level: transparency,
            });
            self.pending_responses.push(PendingResponse {
                id: response_id,
                kind: PendingKind::Cascade { cascade_id: id },
                raised_turn: state.turn,
            });
            state.push_message(format!(
                "The {} is cascading! Choose a containment strategy.",
                failure_type.name()
            ));
            tracing::warn!(cascade = id, failure = failure_type.name(), "cascade started");
            Some(id)
        } else {
            self.pending_responses.push(PendingResponse {
                id: response_id,
                kind: PendingKind::SingleFailure { failure },
                raised_turn: state.turn,
            });
            None
        };

        FailureOutcome::Failure {
            failure_id,
            failure_type,
            severity,
            response_id,
            cascade_id,
        }
    }

    // ── Player responses ───────────────────────────────────────────

    /// Answer a single (non-cascading) failure.
    pub fn respond_to_failure(
        &mut self,
        response_id: u64,
        response: SingleFailureResponse,
        state: &mut GameState,
        rng: &KeyedRng,
    ) -> SimResult<()> {
        self.resolve_failure_response(response_id, response, state, rng, false)
    }

    fn resolve_failure_response(
        &mut self,
        response_id: u64,
        response: SingleFailureResponse,
        state: &mut GameState,
        rng: &KeyedRng,
        automatic: bool,
    ) -> SimResult<()> {
        let pos = self.pending_responses.iter().position(|p| {
            p.id == response_id && matches!(p.kind, PendingKind::SingleFailure { .. })
        });
        let Some(pos) = pos else {
            return reject(state, SimError::ResponseNotFound(response_id));
        };
        let pending = self.pending_responses.remove(pos);
        let PendingKind::SingleFailure { failure } = pending.kind else {
            return reject(state, SimError::ResponseNotFound(response_id));
        };

        let sev = failure.severity;
        let kind = failure.failure_type;
        let label = kind.name();
        match response {
            SingleFailureResponse::Transparency => {
                state.add(Resource::Reputation, -(sev / 2), Some("public disclosure"));
                self.transparency_reputation += pct(50);
                self.learn(kind, 2);
            }
            SingleFailureResponse::Investigation => {
                state.add(Resource::Reputation, -(sev / 3).max(1), Some("internal investigation"));
                state.add(Resource::Money, -(5 + 2 * sev), Some("internal investigation"));
                self.learn(kind, 1);
            }
            SingleFailureResponse::CoverUp => {
                self.cover_up_debt += sev;
                state.add(Resource::Money, -(3 * sev), Some("cover-up"));
                let key = format!("response_{}_turn_{}_debt", response_id, state.turn);
                state.technical_debt.add_debt(sev / 2, None, rng, &key);
            }
        }
        let prefix = if automatic { "(auto) " } else { "" };
        state.push_message(format!("{}{} response to {}: {:?}", prefix, label, failure.id, response));
        tracing::info!(response_id, ?response, automatic, "failure response applied");
        Ok(())
    }

    /// Choose a containment strategy for a cascade. Returns whether it is now contained.
    pub fn respond_to_cascade(
        &mut self,
        response_id: u64,
        response: CascadeResponse,
        state: &mut GameState,
        rng: &KeyedRng,
    ) -> SimResult<bool> {
        self.resolve_cascade_response(response_id, response, state, rng, false)
    }

    fn resolve_cascade_response(
        &mut self,
        response_id: u64,
        response: CascadeResponse,
        state: &mut GameState,
        rng: &KeyedRng,
        automatic: bool,
    ) -> SimResult<bool> {
        let found = self.pending_responses.iter().position(|p| p.id == response_id).and_then(|pos| {
            match self.pending_responses[pos].kind {
                PendingKind::Cascade { cascade_id } => Some((pos, cascade_id)),
                PendingKind::SingleFailure { .. } => None,
            }
        });
        let Some((pos, cascade_id)) = found else {
            return reject(state, SimError::ResponseNotFound(response_id));
        };
        self.pending_responses.remove(pos);
        let Some(idx) = self.active_cascades.iter().position(|c| c.id == cascade_id) else {
            return reject(state, SimError::ResponseNotFound(response_id));
        };

        let sev = self.active_cascades[idx].initiating_failure.severity;
        let irl = self.incident_response_level as i64;
        let comm_bonus = pct(5) * self.communication_protocols as i64;
        let draw = rng.draw(format!("response_{}_turn_{}", response_id, state.turn));

        let (contained, transparency) = match response {
            CascadeResponse::AllHands => {
                state.add(Resource::Money, -(20 + 5 * sev), Some("all-hands containment"));
                if state.resources.staff > 1 {
                    state.add(Resource::Staff, -1, Some("all-hands containment"));
                }
                (true, pct(80))
            }
            CascadeResponse::Systematic => {
                state.add(Resource::Money, -(10 + 2 * sev), Some("systematic containment"));
                (draw.chance_for("contain", pct(50) + pct(10) * irl), pct(60))
            }
            CascadeResponse::Minimize => (draw.chance_for("contain", pct(30) + pct(5) * irl), pct(20)),
        };

        {
            let cascade = &mut self.active_cascades[idx];
            cascade.is_contained = contained;
            cascade.transparency_level = (transparency + comm_bonus).min(SCALE);
        }
        if !contained && response == CascadeResponse::Minimize {
            self.spawn_subsequent(idx, state, &draw.sub("spread"));
        }

        let prefix = if automatic { "(auto) " } else { "" };
        state.push_message(format!(
            "{}Cascade {} response {:?}: {}",
            prefix,
            cascade_id,
            response,
            if contained { "contained" } else { "still spreading" }
        ));
        tracing::info!(cascade = cascade_id, ?response, contained, automatic, "cascade response applied");
        Ok(contained)
    }

    // ── Cascade progression ────────────────────────────────────────

    /// Add one more failure to a cascade, drawn from the initiator's targets.
    fn spawn_subsequent(&mut self, idx: usize, state: &mut GameState, draw: &Draw) {
        let (targets, initiating_sev, initiating_name) = {
            let c = &self.active_cascades[idx];
            let targets: Vec<FailureType> = c.initiating_failure.cascade_targets.iter().copied().collect();
            (targets, c.initiating_failure.severity, c.initiating_failure.failure_type.name())
        };
        let Some(target) = draw.pick_one("target", &targets).copied() else {
            return;
        };
        let severity = (initiating_sev - draw.integer("drop", 1, 3)).max(1);
        let failure = self.build_failure(target, severity, state.turn);
        self.apply_impact(&failure, state);
        state.push_message(format!(
            "Cascade: {} (severity {}) spreads from the {}.",
            target.name(),
            severity,
            initiating_name
        ));
        tracing::info!(failure = target.name(), severity, "cascade spread");
        self.active_cascades[idx].subsequent_failures.push(failure);
    }

    /// One tick of a cascade. Returns true if it resolved (and was removed).
    fn update_cascade(&mut self, cascade_id: u64, state: &mut GameState, rng: &KeyedRng) -> bool {
        let Some(idx) = self.active_cascades.iter().position(|c| c.id == cascade_id) else {
            return false;
        };
        if self.active_cascades[idx].is_contained {
            self.resolve_cascade(idx, state);
            return true;
        }

        let max_turns = self.constants.max_cascade_turns;
        let total_turns = {
            let c = &mut self.active_cascades[idx];
            c.total_turns += 1;
            c.total_turns
        };
        let draw = rng.draw(format!(
            "cascade_{}_tick_{}_turn_{}",
            cascade_id, total_turns, state.turn
        ));
        if total_turns <= max_turns && draw.chance(self.constants.subsequent_failure_chance) {
            self.spawn_subsequent(idx, state, &draw);
        }
        if total_turns >= max_turns {
            self.resolve_cascade(idx, state);
            return true;
        }
        false
    }

    fn resolve_cascade(&mut self, idx: usize, state: &mut GameState) {
        let cascade = self.active_cascades.remove(idx);
        self.pending_responses.retain(|p| p.kind != PendingKind::Cascade { cascade_id: cascade.id });

        if cascade.transparency_level > pct(70) {
            self.transparency_reputation += SCALE;
        } else if cascade.transparency_level < pct(30) {
            self.cover_up_debt += cascade.total_failures() * 2;
        }
        let types: Vec<FailureType> = cascade.failures().map(|f| f.failure_type).collect();
        for t in types {
            self.learn(t, 1);
        }

        let how = if cascade.is_contained { "contained" } else { "burned out" };
        state.push_message(format!(
            "Cascade {} {} after {} turn(s) and {} failure(s).",
            cascade.id,
            how,
            cascade.total_turns,
            cascade.total_failures()
        ));
        tracing::info!(
            cascade = cascade.id,
            contained = cascade.is_contained,
            turns = cascade.total_turns,
            failures = cascade.total_failures(),
            "cascade resolved"
        );
    }

    // ── Upgrades ───────────────────────────────────────────────────

    pub fn upgrade(&mut self, kind: UpgradeKind, cost: i64, state: &mut GameState) -> SimResult<u32> {
        let max = self.constants.max_upgrade_level;
        let current = match kind {
            UpgradeKind::IncidentResponse => self.incident_response_level,
            UpgradeKind::MonitoringSystems => self.monitoring_systems,
            UpgradeKind::CommunicationProtocols => self.communication_protocols,
        };
        if current >= max {
            return reject(state, SimError::UpgradeAtMaximum(kind.label().to_string()));
        }
        let label = format!("upgrade {}", kind.label());
        state.check_costs(&label, cost, 0)?;
        state.pay(&label, cost, 0);

        let slot = match kind {
            UpgradeKind::IncidentResponse => &mut self.incident_response_level,
            UpgradeKind::MonitoringSystems => &mut self.monitoring_systems,
            UpgradeKind::CommunicationProtocols => &mut self.communication_protocols,
        };
        *slot += 1;
        let level = *slot;
        state.push_message(format!("{} upgraded to level {}.", kind.label(), level));
        tracing::info!(upgrade = kind.label(), level, cost, "upgrade purchased");
        Ok(level)
    }

    pub fn upgrade_incident_response(&mut self, cost: i64, state: &mut GameState) -> SimResult<u32> {
        self.upgrade(UpgradeKind::IncidentResponse, cost, state)
    }

    pub fn upgrade_monitoring_systems(&mut self, cost: i64, state: &mut GameState) -> SimResult<u32> {
        self.upgrade(UpgradeKind::MonitoringSystems, cost, state)
    }

    pub fn upgrade_communication_protocols(&mut self, cost: i64, state: &mut GameState) -> SimResult<u32> {
        self.upgrade(UpgradeKind::CommunicationProtocols, cost, state)
    }
}

fn reject<T>(state: &mut GameState, err: SimError) -> SimResult<T> {
    tracing::warn!(error = %err, "cascade operation rejected");
    state.push_message(err.to_string());
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debt::DebtCategory;
    use crate::state::blank_state;
    use proptest::prelude::*;

    fn engine() -> FailureCascadeEngine {
        FailureCascadeEngine::new(CascadeConstants::default())
    }

    /// Constants that never produce near misses, so every roll is a real failure.
    fn no_near_misses() -> CascadeConstants {
        CascadeConstants {
            near_miss_base: 0,
            near_miss_per_monitoring: 0,
            ..CascadeConstants::default()
        }
    }

    fn with_debt(state: &mut GameState, debt: i64) {
        state
            .technical_debt
            .add_debt(debt, Some(DebtCategory::Reliability), &KeyedRng::new(0), "setup");
    }

    /// Push a cascade directly, bypassing the rolls.
    fn seed_cascade(engine: &mut FailureCascadeEngine, severity: i64, transparency: i64) -> u64 {
        let failure = engine.build_failure(FailureType::SystemCrash, severity, 0);
        let id = engine.next_cascade_id;
        engine.next_cascade_id += 1;
        engine.active_cascades.push(CascadeState {
            id,
            initiating_failure: failure,
            subsequent_failures: Vec::new(),
            total_turns: 0,
            is_contained: false,
            transparency_level: transparency,
        });
        id
    }

    #[test]
    fn severity_bounds_at_extremes() {
        let rng = KeyedRng::new(1);
        let mut high = blank_state();
        with_debt(&mut high, 100);
        high.resources.doom = 100;
        let mut low = blank_state();
        low.resources.doom = 0;
        let calm = engine();
        let mut drilled = engine();
        drilled.incident_response_level = 5;

        for i in 0..200 {
            let draw = rng.draw(format!("s{}", i));
            // base 3..=7 plus the full debt and doom bonuses
            assert!(calm.calculate_failure_severity(&high, &draw) >= 8);
            let s = drilled.calculate_failure_severity(&low, &draw);
            assert!((1..=4).contains(&s));
        }
    }

    #[test]
    fn cascade_chance_formula() {
        let e = engine();
        // 0.30 * 5/5 = 0.30
        assert_eq!(e.cascade_chance(FailureType::SystemCrash, 5), pct(30));
        // 0.35 * 10/5 = 0.70
        assert_eq!(e.cascade_chance(FailureType::SafetyIncident, 10), pct(70));
        let mut drilled = engine();
        drilled.incident_response_level = 5;
        // 0.30 * 0.5
        assert_eq!(drilled.cascade_chance(FailureType::SystemCrash, 5), pct(15));
    }

    #[test]
    fn resilience_is_capped() {
        let mut e = engine();
        assert_eq!(e.get_resilience_bonus(FailureType::DataLoss), 0.0);
        e.learn(FailureType::DataLoss, 3);
        assert_eq!(e.resilience_fp(FailureType::DataLoss), pct(30));
        e.learn(FailureType::DataLoss, 50);
        assert_eq!(e.get_resilience_bonus(FailureType::DataLoss), 0.5);
    }

    #[test]
    fn resilience_shrinks_impact() {
        let mut e = engine();
        let raw = e.build_failure(FailureType::SecurityBreach, 8, 0);
        assert_eq!(raw.immediate_impact[&Resource::Money], -24);
        e.learn(FailureType::SecurityBreach, 5);
        let hardened = e.build_failure(FailureType::SecurityBreach, 8, 0);
        assert_eq!(hardened.immediate_impact[&Resource::Money], -12);
    }

    #[test]
    fn near_miss_has_no_impact() {
        let mut e = FailureCascadeEngine::new(CascadeConstants {
            near_miss_base: SCALE,
            ..CascadeConstants::default()
        });
        e.incident_response_level = 3;
        let mut state = blank_state();
        let before = state.resources;
        let outcome = e.trigger_failure(&mut state, &KeyedRng::new(4), Some(FailureType::DataLoss), false);
        assert!(matches!(outcome, FailureOutcome::NearMiss { failure_type: FailureType::DataLoss, .. }));
        assert_eq!(state.resources.money, before.money);
        assert_eq!(state.resources.reputation, before.reputation + 1);
        assert_eq!(e.near_misses, 1);
        assert_eq!(e.total_failures, 0);
        assert_eq!(e.lessons_learned(FailureType::DataLoss), 1);
        assert!(e.pending_responses().is_empty());
    }

    #[test]
    fn actual_failure_raises_a_pending_response() {
        let mut e = FailureCascadeEngine::new(no_near_misses());
        let mut state = blank_state();
        let money = state.resources.money;
        let outcome = e.trigger_failure(&mut state, &KeyedRng::new(8), Some(FailureType::SystemCrash), false);
        let FailureOutcome::Failure { response_id, cascade_id, severity, .. } = outcome else {
            panic!("expected a failure");
        };
        assert!(state.resources.money < money);
        assert_eq!(e.total_failures, 1);
        assert_eq!(e.pending_responses().len(), 1);
        assert_eq!(e.pending_responses()[0].id, response_id);
        assert_eq!(cascade_id.is_some(), e.active_cascades().len() == 1);
        assert!(state.messages.iter().any(|m| m.contains(severity_label(severity))));
    }

    #[test]
    fn single_failure_responses() {
        let rng = KeyedRng::new(2);
        for (response, check) in [
            (SingleFailureResponse::Transparency, 0),
            (SingleFailureResponse::Investigation, 1),
            (SingleFailureResponse::CoverUp, 2),
        ] {
            let mut e = FailureCascadeEngine::new(no_near_misses());
            let mut state = blank_state();
            let failure = e.build_failure(FailureType::DataLoss, 6, 0);
            e.pending_responses.push(PendingResponse {
                id: 77,
                kind: PendingKind::SingleFailure { failure },
                raised_turn: 0,
            });
            let rep = state.resources.reputation;
            let money = state.resources.money;
            e.respond_to_failure(77, response, &mut state, &rng).unwrap();
            assert!(e.pending_responses().is_empty());
            match check {
                0 => {
                    assert_eq!(state.resources.reputation, rep - 3);
                    assert_eq!(e.transparency_reputation, pct(50));
                    assert_eq!(e.lessons_learned(FailureType::DataLoss), 2);
                }
                1 => {
                    assert_eq!(state.resources.reputation, rep - 2);
                    assert_eq!(state.resources.money, money - 17);
                    assert_eq!(e.lessons_learned(FailureType::DataLoss), 1);
                }
                _ => {
                    assert_eq!(state.resources.reputation, rep);
                    assert_eq!(e.cover_up_debt, 6);
                    assert_eq!(state.resources.money, money - 18);
                    assert_eq!(state.technical_debt.accumulated_debt(), 3);
                }
            }
        }
    }

    #[test]
    fn unknown_response_is_rejected() {
        let mut e = engine();
        let mut state = blank_state();
        let err = e
            .respond_to_failure(9, SingleFailureResponse::Transparency, &mut state, &KeyedRng::new(0))
            .unwrap_err();
        assert_eq!(err, SimError::ResponseNotFound(9));
        let err = e
            .respond_to_cascade(9, CascadeResponse::AllHands, &mut state, &KeyedRng::new(0))
            .unwrap_err();
        assert_eq!(err, SimError::ResponseNotFound(9));
        assert_eq!(state.messages.len(), 2);
    }

    #[test]
    fn all_hands_contains_and_resolves_next_tick() {
        let rng = KeyedRng::new(3);
        let mut e = engine();
        let mut state = blank_state();
        state.resources.staff = 4;
        let cid = seed_cascade(&mut e, 6, pct(50));
        e.pending_responses.push(PendingResponse {
            id: 1,
            kind: PendingKind::Cascade { cascade_id: cid },
            raised_turn: 0,
        });
        let money = state.resources.money;
        assert!(e.respond_to_cascade(1, CascadeResponse::AllHands, &mut state, &rng).unwrap());
        assert_eq!(state.resources.money, money - 50);
        assert_eq!(state.resources.staff, 3);
        assert!(e.active_cascades()[0].is_contained);

        let report = e.check_for_cascades(&mut state, &rng, false);
        assert_eq!(report.resolved_cascades, vec![cid]);
        assert!(e.active_cascades().is_empty());
        // transparency 0.8 > 0.7
        assert_eq!(e.transparency_reputation, SCALE);
        assert_eq!(e.lessons_learned(FailureType::SystemCrash), 1);
    }

    /// Seed a cascade and raise the player decision for it as response 1.
    fn awaiting_strategy(engine: &mut FailureCascadeEngine, severity: i64) -> u64 {
        let cid = seed_cascade(engine, severity, pct(50));
        engine.pending_responses.push(PendingResponse {
            id: 1,
            kind: PendingKind::Cascade { cascade_id: cid },
            raised_turn: 0,
        });
        cid
    }

    #[test]
    fn systematic_response_costs_money_and_contains_with_drills() {
        let mut e = engine();
        e.incident_response_level = 5;
        e.communication_protocols = 2;
        let mut state = blank_state();
        awaiting_strategy(&mut e, 6);
        let money = state.resources.money;
        // 0.5 + 0.1 * 5 = 1.0
        assert!(e
            .respond_to_cascade(1, CascadeResponse::Systematic, &mut state, &KeyedRng::new(7))
            .unwrap());
        assert_eq!(state.resources.money, money - 22);
        let c = &e.active_cascades()[0];
        assert!(c.is_contained);
        assert_eq!(c.transparency_level, pct(70));
        assert!(e.pending_responses().is_empty());
    }

    #[test]
    fn systematic_response_without_drills_can_fail() {
        let mut contained = 0;
        let mut spreading = 0;
        for seed in 0..64 {
            let mut e = engine();
            let mut state = blank_state();
            awaiting_strategy(&mut e, 4);
            let money = state.resources.money;
            let ok = e
                .respond_to_cascade(1, CascadeResponse::Systematic, &mut state, &KeyedRng::new(seed))
                .unwrap();
            let c = &e.active_cascades()[0];
            assert_eq!(c.is_contained, ok);
            assert_eq!(c.transparency_level, pct(60));
            assert!(c.subsequent_failures.is_empty());
            assert_eq!(state.resources.money, money - 18);
            if ok {
                contained += 1;
            } else {
                spreading += 1;
            }
        }
        assert!(contained > 0 && spreading > 0);
    }

    #[test]
    fn failed_minimize_spreads_immediately() {
        let mut contained = 0;
        let mut spreading = 0;
        for seed in 0..64 {
            let mut e = engine();
            let mut state = blank_state();
            awaiting_strategy(&mut e, 6);
            let ok = e
                .respond_to_cascade(1, CascadeResponse::Minimize, &mut state, &KeyedRng::new(seed))
                .unwrap();
            let c = &e.active_cascades()[0];
            assert_eq!(c.transparency_level, pct(20));
            if ok {
                assert!(c.is_contained);
                assert!(c.subsequent_failures.is_empty());
                contained += 1;
            } else {
                assert!(!c.is_contained);
                assert_eq!(c.subsequent_failures.len(), 1);
                assert!(FailureType::SystemCrash
                    .cascade_targets()
                    .contains(&c.subsequent_failures[0].failure_type));
                spreading += 1;
            }
        }
        assert!(contained > 0 && spreading > 0);
    }

    #[test]
    fn minimize_with_drills_always_contains() {
        let mut e = engine();
        // 0.3 + 0.05 * 14 = 1.0
        e.incident_response_level = 14;
        e.communication_protocols = 5;
        let mut state = blank_state();
        awaiting_strategy(&mut e, 8);
        let money = state.resources.money;
        assert!(e
            .respond_to_cascade(1, CascadeResponse::Minimize, &mut state, &KeyedRng::new(0))
            .unwrap());
        let c = &e.active_cascades()[0];
        assert_eq!(c.transparency_level, pct(45));
        assert!(c.subsequent_failures.is_empty());
        assert_eq!(state.resources.money, money);
    }

    #[test]
    fn communication_bonus_caps_transparency() {
        let mut e = engine();
        e.communication_protocols = 5;
        let mut state = blank_state();
        awaiting_strategy(&mut e, 3);
        e.respond_to_cascade(1, CascadeResponse::AllHands, &mut state, &KeyedRng::new(0))
            .unwrap();
        assert_eq!(e.active_cascades()[0].transparency_level, SCALE);
    }

    #[test]
    fn uncontained_cascade_force_resolves_on_third_tick() {
        let mut e = engine();
        let mut state = blank_state();
        let cid = seed_cascade(&mut e, 9, pct(50));
        let rng = KeyedRng::new(11);
        assert!(!e.update_cascade(cid, &mut state, &rng));
        assert_eq!(e.active_cascades()[0].total_turns, 1);
        assert!(!e.update_cascade(cid, &mut state, &rng));
        assert_eq!(e.active_cascades()[0].total_turns, 2);
        assert!(e.update_cascade(cid, &mut state, &rng));
        assert!(e.active_cascades().is_empty());
        assert!(state.messages.last().unwrap().contains("after 3 turn(s)"));
    }

    #[test]
    fn low_transparency_resolution_adds_cover_up_debt() {
        let mut e = engine();
        let mut state = blank_state();
        let cid = seed_cascade(&mut e, 5, pct(20));
        let idx = 0;
        e.spawn_subsequent(idx, &mut state, &KeyedRng::new(1).draw("x"));
        assert_eq!(e.active_cascades()[0].total_failures(), 2);
        e.active_cascades[0].is_contained = true;
        assert!(e.update_cascade(cid, &mut state, &KeyedRng::new(1)));
        assert_eq!(e.cover_up_debt, 4);
    }

    #[test]
    fn subsequent_failures_come_from_targets_and_are_milder() {
        let mut e = engine();
        let mut state = blank_state();
        seed_cascade(&mut e, 2, pct(50));
        for i in 0..10 {
            e.spawn_subsequent(0, &mut state, &KeyedRng::new(i).draw("spawn"));
        }
        let c = &e.active_cascades()[0];
        let targets = FailureType::SystemCrash.cascade_targets();
        for f in &c.subsequent_failures {
            assert!(targets.contains(&f.failure_type));
            assert_eq!(f.severity, 1);
        }
    }

    #[test]
    fn stale_responses_are_auto_resolved() {
        let rng = KeyedRng::new(5);
        let mut e = FailureCascadeEngine::new(no_near_misses());
        let mut state = blank_state();
        let failure = e.build_failure(FailureType::ResearchSetback, 4, 0);
        e.pending_responses.push(PendingResponse {
            id: 3,
            kind: PendingKind::SingleFailure { failure },
            raised_turn: 0,
        });
        // Same turn: still pending.
        let report = e.check_for_cascades(&mut state, &rng, false);
        assert!(report.auto_resolved.is_empty());
        state.turn = 1;
        let report = e.check_for_cascades(&mut state, &rng, false);
        assert_eq!(report.auto_resolved, vec![3]);
        assert!(state.messages.iter().any(|m| m.starts_with("(auto)")));
    }

    #[test]
    fn no_failure_roll_without_accident_chance() {
        let mut e = engine();
        let mut state = blank_state();
        let rng = KeyedRng::new(1);
        for t in 0..200 {
            state.turn = t;
            assert!(e.check_for_cascades(&mut state, &rng, false).new_failure.is_none());
        }
    }

    #[test]
    fn heavy_debt_eventually_rolls_failures() {
        let mut e = engine();
        let mut state = blank_state();
        with_debt(&mut state, 25);
        let rng = KeyedRng::new(1);
        let rolled = (0..400).any(|t| {
            state.turn = t;
            e.check_for_cascades(&mut state, &rng, false).new_failure.is_some()
        });
        assert!(rolled);
    }

    #[test]
    fn weighted_type_selection_respects_biases() {
        let e = engine();
        let rng = KeyedRng::new(6);
        let mut state = blank_state();
        state.resources.staff = 2;
        let biased = (0..700)
            .filter(|i| {
                e.select_failure_type(&state, true, &rng.draw(format!("w{}", i)))
                    == FailureType::ResearchSetback
            })
            .count();
        let baseline = (0..700)
            .filter(|i| {
                e.select_failure_type(&state, false, &rng.draw(format!("w{}", i)))
                    == FailureType::ResearchSetback
            })
            .count();
        assert!(biased > baseline);
    }

    #[test]
    fn upgrades_cost_money_and_cap() {
        let mut e = engine();
        let mut state = blank_state();
        state.resources.money = 1_000;
        for level in 1..=5 {
            assert_eq!(e.upgrade_incident_response(10, &mut state).unwrap(), level);
        }
        assert_eq!(state.resources.money, 950);
        let err = e.upgrade_incident_response(10, &mut state).unwrap_err();
        assert_eq!(err, SimError::UpgradeAtMaximum("Incident Response".to_string()));

        state.resources.money = 5;
        let err = e.upgrade_monitoring_systems(10, &mut state).unwrap_err();
        assert_eq!(err, SimError::money(10, 5));
        assert_eq!(e.monitoring_systems(), 0);
        assert_eq!(e.upgrade_communication_protocols(5, &mut state).unwrap(), 1);
        assert_eq!(state.resources.money, 0);
    }

    #[test]
    fn negative_upgrade_cost_is_rejected() {
        let mut e = engine();
        let mut state = blank_state();
        let money = state.resources.money;
        let err = e.upgrade_incident_response(-500, &mut state).unwrap_err();
        assert!(matches!(err, SimError::NegativeCost { amount: -500, .. }));
        assert_eq!(state.resources.money, money);
        assert_eq!(e.incident_response_level(), 0);
        assert_eq!(state.messages.len(), 1);
    }

    #[test]
    fn summary_reflects_engine() {
        let mut e = engine();
        e.near_misses = 2;
        e.learn(FailureType::SafetyIncident, 1);
        let s = e.get_failure_cascade_summary();
        assert_eq!(s.near_misses, 2);
        assert_eq!(s.lessons_learned[&FailureType::SafetyIncident], 1);
        assert_eq!(s.active_cascades, 0);
    }

    proptest! {
        #[test]
        fn severity_always_in_range(
            seed in any::<u64>(),
            debt in 0i64..200,
            doom in 0i64..=100,
            irl in 0u32..=5,
        ) {
            let mut state = blank_state();
            with_debt(&mut state, debt);
            state.resources.doom = doom;
            let mut e = engine();
            e.incident_response_level = irl;
            let s = e.calculate_failure_severity(&state, &KeyedRng::new(seed).draw("p"));
            prop_assert!((1..=10).contains(&s));
        }

        #[test]
        fn resilience_never_exceeds_half(lessons in 0u32..10_000) {
            let mut e = engine();
            e.learn(FailureType::SystemCrash, lessons);
            prop_assert!(e.get_resilience_bonus(FailureType::SystemCrash) <= 0.5);
        }

        #[test]
        fn cascades_terminate_within_three_ticks(seed in any::<u64>(), severity in 1i64..=10) {
            let mut e = engine();
            let mut state = blank_state();
            let cid = seed_cascade(&mut e, severity, pct(50));
            let rng = KeyedRng::new(seed);
            let mut ticks = 0;
            while e.active_cascades().iter().any(|c| c.id == cid) {
                e.update_cascade(cid, &mut state, &rng);
                ticks += 1;
                prop_assert!(ticks <= 3);
            }
        }
    }
}
