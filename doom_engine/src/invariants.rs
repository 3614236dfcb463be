//! Invariant checks over a whole engine.
//!
//! `try_validate_invariants` returns the first violation as a message;
//! `validate_invariants` wraps it in `SimError::InvariantViolation`.
//! Neither panics: `end_turn` logs violations and carries on.

use std::collections::BTreeSet;

use crate::arithmetic::SCALE;
use crate::cascade::PendingKind;
use crate::domain::{Resource, DOOM_MAX};
use crate::engine::GameEngine;
use crate::error::{SimError, SimResult};

pub fn validate_invariants(engine: &GameEngine) -> SimResult<()> {
    try_validate_invariants(engine).map_err(SimError::InvariantViolation)
}

/// Run every check; `Err(message)` on the first failure.
pub fn try_validate_invariants(engine: &GameEngine) -> Result<(), String> {
    check_resources(engine)?;
    check_debt_ledger(engine)?;
    check_upgrade_levels(engine)?;
    check_active_cascades(engine)?;
    check_pending_responses(engine)?;
    check_projects(engine)?;
    Ok(())
}

fn check_resources(engine: &GameEngine) -> Result<(), String> {
    let state = engine.state();
    for r in Resource::ALL {
        let v = state.get(r);
        if v < 0 {
            return Err(format!("[resources] {} is negative: {}", r.name(), v));
        }
    }
    if state.resources.doom > DOOM_MAX {
        return Err(format!("[resources] doom {} exceeds {}", state.resources.doom, DOOM_MAX));
    }
    if state.action_points < 0 {
        return Err(format!("[resources] action points negative: {}", state.action_points));
    }
    Ok(())
}

/// accumulated_debt == sum(per_category), nothing negative.
fn check_debt_ledger(engine: &GameEngine) -> Result<(), String> {
    let ledger = &engine.state().technical_debt;
    if !ledger.is_consistent() {
        let sum: i64 = ledger.per_category().values().sum();
        return Err(format!(
            "[debt] accumulated {} does not match category sum {} or a category is negative",
            ledger.accumulated_debt(),
            sum
        ));
    }
    Ok(())
}

fn check_upgrade_levels(engine: &GameEngine) -> Result<(), String> {
    let cascades = engine.cascades();
    let max = cascades.constants().max_upgrade_level;
    for (label, level) in [
        ("incident response", cascades.incident_response_level()),
        ("monitoring systems", cascades.monitoring_systems()),
        ("communication protocols", cascades.communication_protocols()),
    ] {
        if level > max {
            return Err(format!("[upgrades] {} level {} exceeds {}", label, level, max));
        }
    }
    Ok(())
}

/// Active cascades are still live: under the turn cap, values in range.
fn check_active_cascades(engine: &GameEngine) -> Result<(), String> {
    let max_turns = engine.cascades().constants().max_cascade_turns;
    let mut ids = BTreeSet::new();
    for c in engine.cascades().active_cascades() {
        if !ids.insert(c.id) {
            return Err(format!("[cascade] duplicate cascade id {}", c.id));
        }
        if c.total_turns >= max_turns {
            return Err(format!(
                "[cascade] cascade {} still active after {} turns",
                c.id, c.total_turns
            ));
        }
        if !(0..=SCALE).contains(&c.transparency_level) {
            return Err(format!(
                "[cascade] cascade {} transparency {} out of range",
                c.id, c.transparency_level
            ));
        }
        for f in c.failures() {
            if !(1..=10).contains(&f.severity) {
                return Err(format!("[cascade] failure {} severity {} out of range", f.id, f.severity));
            }
            if !(0..=SCALE).contains(&f.cascade_chance) {
                return Err(format!(
                    "[cascade] failure {} cascade chance {} out of range",
                    f.id, f.cascade_chance
                ));
            }
        }
    }
    Ok(())
}

fn check_pending_responses(engine: &GameEngine) -> Result<(), String> {
    let cascades = engine.cascades();
    for p in cascades.pending_responses() {
        if let PendingKind::Cascade { cascade_id } = p.kind {
            if !cascades.active_cascades().iter().any(|c| c.id == cascade_id) {
                return Err(format!(
                    "[cascade] response {} points at resolved cascade {}",
                    p.id, cascade_id
                ));
            }
        }
    }
    Ok(())
}

fn check_projects(engine: &GameEngine) -> Result<(), String> {
    let research = engine.research();
    let mut ids = BTreeSet::new();
    for p in research.active_projects() {
        if p.completed {
            return Err(format!("[research] active project {} is marked completed", p.id));
        }
        if !ids.insert(p.id) {
            return Err(format!("[research] duplicate project id {}", p.id));
        }
    }
    for p in research.completed_projects() {
        if !p.completed {
            return Err(format!("[research] completed project {} is not marked completed", p.id));
        }
        if !ids.insert(p.id) {
            return Err(format!("[research] duplicate project id {}", p.id));
        }
    }
    Ok(())
}
