//! Drift detection: determinism verification and state comparison.
//!
//! Every numeric field is an integer; fractional values stay fixed-point
//! (SCALE = 10_000).

use std::collections::BTreeMap;

use thiserror::Error;

use doom_engine::cascade::FailureType;
use doom_engine::domain::Resource;
use doom_engine::{EngineConfig, GameEngine, SimError};

use crate::commands::PlayerCommand;
use crate::replay;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DriftError {
    #[error("two replays produced different hashes: {first} vs {second}")]
    DeterminismFailure { first: String, second: String },
    #[error("replay failed: {0}")]
    Replay(#[from] SimError),
}

/// Replay the same log twice and require identical hashes. Returns the hash.
pub fn verify_determinism(config: &EngineConfig, commands: &[PlayerCommand]) -> Result<String, DriftError> {
    let first = replay::rebuild_hash(config, commands)?;
    let second = replay::rebuild_hash(config, commands)?;
    if first != second {
        tracing::warn!(first = %first, second = %second, "determinism failure");
        return Err(DriftError::DeterminismFailure { first, second });
    }
    Ok(first)
}

/// Integer deltas between two engines (`b - a`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftReport {
    pub turn_delta: i64,
    pub resource_deltas: BTreeMap<Resource, i64>,
    pub debt_a: i64,
    pub debt_b: i64,
    pub debt_delta: i64,
    pub total_failures_delta: i64,
    pub near_misses_delta: i64,
    pub cover_up_debt_delta: i64,
    /// Fixed-point.
    pub transparency_reputation_delta: i64,
    pub active_cascades_delta: i64,
    pub completed_projects_delta: i64,
    pub lessons_delta: BTreeMap<FailureType, i64>,
    pub added_milestones: Vec<String>,
    pub removed_milestones: Vec<String>,
    /// Index of the first message where the logs differ, if they do.
    pub first_divergent_message: Option<usize>,
}

impl DriftReport {
    pub fn is_identical(&self) -> bool {
        self.turn_delta == 0
            && self.resource_deltas.values().all(|d| *d == 0)
            && self.debt_delta == 0
            && self.total_failures_delta == 0
            && self.near_misses_delta == 0
            && self.cover_up_debt_delta == 0
            && self.transparency_reputation_delta == 0
            && self.active_cascades_delta == 0
            && self.completed_projects_delta == 0
            && self.lessons_delta.values().all(|d| *d == 0)
            && self.added_milestones.is_empty()
            && self.removed_milestones.is_empty()
            && self.first_divergent_message.is_none()
    }
}

pub fn compare_states(a: &GameEngine, b: &GameEngine) -> DriftReport {
    let (sa, sb) = (a.state(), b.state());
    let (ca, cb) = (a.get_failure_cascade_summary(), b.get_failure_cascade_summary());

    let resource_deltas = Resource::ALL
        .into_iter()
        .map(|r| (r, sb.get(r) - sa.get(r)))
        .collect();

    let lessons_delta = FailureType::ALL
        .into_iter()
        .map(|t| {
            let la = ca.lessons_learned.get(&t).copied().unwrap_or(0) as i64;
            let lb = cb.lessons_learned.get(&t).copied().unwrap_or(0) as i64;
            (t, lb - la)
        })
        .filter(|(_, d)| *d != 0)
        .collect();

    let first_divergent_message = sa
        .messages
        .iter()
        .zip(sb.messages.iter())
        .position(|(x, y)| x != y)
        .or_else(|| {
            (sa.messages.len() != sb.messages.len()).then(|| sa.messages.len().min(sb.messages.len()))
        });

    let debt_a = sa.technical_debt.accumulated_debt();
    let debt_b = sb.technical_debt.accumulated_debt();

    DriftReport {
        turn_delta: sb.turn as i64 - sa.turn as i64,
        resource_deltas,
        debt_a,
        debt_b,
        debt_delta: debt_b - debt_a,
        total_failures_delta: cb.total_failures as i64 - ca.total_failures as i64,
        near_misses_delta: cb.near_misses as i64 - ca.near_misses as i64,
        cover_up_debt_delta: cb.cover_up_debt - ca.cover_up_debt,
        transparency_reputation_delta: cb.transparency_reputation - ca.transparency_reputation,
        active_cascades_delta: cb.active_cascades as i64 - ca.active_cascades as i64,
        completed_projects_delta: b.research().completed_projects().len() as i64
            - a.research().completed_projects().len() as i64,
        lessons_delta,
        added_milestones: sb.milestones.difference(&sa.milestones).cloned().collect(),
        removed_milestones: sa.milestones.difference(&sb.milestones).cloned().collect(),
        first_divergent_message,
    }
}
