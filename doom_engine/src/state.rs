//! State construction.

use std::collections::BTreeSet;

use crate::config::EngineConfig;
use crate::debt::TechnicalDebtLedger;
use crate::domain::GameState;

/// Create a fresh turn-zero state from a configuration.
///
/// Optional collaborators start absent; hosts that model researchers,
/// opponents or an economic cycle attach them afterwards.
pub fn create_initial_state(config: &EngineConfig) -> GameState {
    GameState {
        turn: 0,
        resources: config.starting_resources,
        action_points: config.action_points_per_turn,
        messages: Vec::new(),
        milestones: BTreeSet::new(),
        upgrades: BTreeSet::new(),
        technical_debt: TechnicalDebtLedger::new(),
        researchers: None,
        opponents: None,
        economic_cycle: None,
    }
}

/// Default-configured initial state.
pub fn blank_state() -> GameState {
    create_initial_state(&EngineConfig::default())
}
