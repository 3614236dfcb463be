//! Replay: rebuild an engine from its config and command log.
//!
//! All behavior comes from the engine; replay adds nothing but ordering.

use doom_engine::hashing::canonical_hash;
use doom_engine::{EngineConfig, GameEngine, SimResult};

use crate::commands::PlayerCommand;

/// Rebuild from scratch.
///
/// 1. Create a fresh engine from `config`
/// 2. Apply each command in order
/// 3. Return (engine, canonical_hash)
pub fn rebuild_state(config: &EngineConfig, commands: &[PlayerCommand]) -> SimResult<(GameEngine, String)> {
    let mut engine = GameEngine::new(config.clone())?;
    for command in commands {
        command.apply(&mut engine);
    }
    let hash = canonical_hash(&engine);
    tracing::debug!(commands = commands.len(), hash = %hash, "replay complete");
    Ok((engine, hash))
}

pub fn rebuild_hash(config: &EngineConfig, commands: &[PlayerCommand]) -> SimResult<String> {
    rebuild_state(config, commands).map(|(_, hash)| hash)
}
