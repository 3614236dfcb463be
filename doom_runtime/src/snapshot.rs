//! Snapshot layer: canonical JSON + hash of an engine at a point in its log.
//!
//! Snapshots hold no timestamps. A snapshot is trusted only if its hash
//! matches its JSON and a replay of the log prefix reproduces it.

use serde::{Deserialize, Serialize};
use doom_engine::hashing::{canonical_hash, canonical_serialize, hex_digest};
use doom_engine::{EngineConfig, GameEngine, ENGINE_VERSION};

use crate::commands::PlayerCommand;
use crate::error::{RuntimeError, RuntimeResult};
use crate::replay;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Number of commands applied when the snapshot was taken.
    pub command_index: usize,
    pub turn: u32,
    /// Canonical JSON of the engine (UTF-8).
    pub canonical_json: String,
    /// SHA-256 of the canonical JSON.
    pub hash: String,
    pub engine_version: u32,
}

impl Snapshot {
    pub fn to_json(&self) -> RuntimeResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> RuntimeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

pub fn take_snapshot(engine: &GameEngine, command_index: usize) -> Snapshot {
    let canonical_json = String::from_utf8_lossy(&canonical_serialize(engine)).into_owned();
    Snapshot {
        command_index,
        turn: engine.state().turn,
        canonical_json,
        hash: canonical_hash(engine),
        engine_version: ENGINE_VERSION,
    }
}

/// True if the hash matches the canonical JSON content.
pub fn verify_snapshot_hash(snap: &Snapshot) -> bool {
    hex_digest(snap.canonical_json.as_bytes()) == snap.hash
}

/// Check a snapshot against a replay of the first `command_index` commands.
pub fn verify_snapshot(snap: &Snapshot, config: &EngineConfig, commands: &[PlayerCommand]) -> RuntimeResult<()> {
    if snap.engine_version != ENGINE_VERSION {
        return Err(RuntimeError::VersionMismatch {
            found: snap.engine_version,
            current: ENGINE_VERSION,
        });
    }
    if !verify_snapshot_hash(snap) {
        return Err(RuntimeError::CorruptSnapshot {
            command_index: snap.command_index,
        });
    }
    let Some(prefix) = commands.get(..snap.command_index) else {
        return Err(RuntimeError::SnapshotBeyondLog {
            command_index: snap.command_index,
            available: commands.len(),
        });
    };
    let actual = replay::rebuild_hash(config, prefix)?;
    if actual != snap.hash {
        tracing::warn!(command_index = snap.command_index, "snapshot does not match replay");
        return Err(RuntimeError::SnapshotMismatch {
            command_index: snap.command_index,
            expected: snap.hash.clone(),
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn played(turns: usize) -> (EngineConfig, Vec<PlayerCommand>, GameEngine) {
        let config = EngineConfig::with_seed(12);
        let commands = vec![PlayerCommand::EndTurn; turns];
        let (engine, _) = replay::rebuild_state(&config, &commands).unwrap();
        (config, commands, engine)
    }

    #[test]
    fn snapshot_verifies_against_replay() {
        let (config, commands, engine) = played(6);
        let snap = take_snapshot(&engine, commands.len());
        assert_eq!(snap.turn, 6);
        assert!(verify_snapshot_hash(&snap));
        verify_snapshot(&snap, &config, &commands).unwrap();
    }

    #[test]
    fn tampered_json_is_corrupt() {
        let (config, commands, engine) = played(2);
        let mut snap = take_snapshot(&engine, commands.len());
        snap.canonical_json.push(' ');
        assert!(matches!(
            verify_snapshot(&snap, &config, &commands),
            Err(RuntimeError::CorruptSnapshot { .. })
        ));
    }

    #[test]
    fn wrong_prefix_is_a_mismatch() {
        let (config, commands, engine) = played(4);
        let snap = take_snapshot(&engine, 3);
        assert!(matches!(
            verify_snapshot(&snap, &config, &commands),
            Err(RuntimeError::SnapshotMismatch { .. })
        ));
        let snap = take_snapshot(&engine, 10);
        assert!(matches!(
            verify_snapshot(&snap, &config, &commands),
            Err(RuntimeError::SnapshotBeyondLog { .. })
        ));
    }

    #[test]
    fn json_roundtrip() {
        let (_, _, engine) = played(1);
        let snap = take_snapshot(&engine, 1);
        assert_eq!(Snapshot::from_json(&snap.to_json().unwrap()).unwrap(), snap);
    }
}
