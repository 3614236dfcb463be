//! Session manager: one engine plus its ordered command log.
//!
//! Apply-then-record order:
//!   1. command.apply(engine)   (rejections still change the message log)
//!   2. append to the command log
//!   3. snapshot if an end of turn lands on the interval
//!
//! The log exports as JSON together with the config, which is all a
//! replay needs.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use doom_engine::domain::GameState;
use doom_engine::hashing::canonical_hash;
use doom_engine::{EngineConfig, GameEngine};

use crate::commands::{CommandOutcome, PlayerCommand};
use crate::error::{RuntimeError, RuntimeResult};
use crate::replay;
use crate::snapshot::{self, Snapshot};

/// Exported form of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLog {
    pub config: EngineConfig,
    pub commands: Vec<PlayerCommand>,
}

pub struct Session {
    session_id: String,
    config: EngineConfig,
    engine: GameEngine,
    commands: Vec<PlayerCommand>,
    snapshot_interval: u32,
    snapshots: Vec<Snapshot>,
}

impl Session {
    /// `snapshot_interval` is in turns; 0 disables automatic snapshots.
    pub fn new(session_id: &str, config: EngineConfig, snapshot_interval: u32) -> RuntimeResult<Self> {
        let engine = GameEngine::new(config.clone())?;
        tracing::info!(session = session_id, seed = config.seed, "session started");
        Ok(Self {
            session_id: session_id.to_string(),
            config,
            engine,
            commands: Vec::new(),
            snapshot_interval,
            snapshots: Vec::new(),
        })
    }

    /// Restore a session from an exported log by replaying it.
    pub fn from_log_json(session_id: &str, json: &str, snapshot_interval: u32) -> RuntimeResult<Self> {
        let log: CommandLog = serde_json::from_str(json)?;
        let mut session = Self::new(session_id, log.config, snapshot_interval)?;
        for command in log.commands {
            session.apply(command);
        }
        Ok(session)
    }

    pub fn apply(&mut self, command: PlayerCommand) -> CommandOutcome {
        let outcome = command.apply(&mut self.engine);
        if let CommandOutcome::Rejected(err) = &outcome {
            tracing::debug!(session = %self.session_id, command = command.label(), error = %err, "command rejected");
        }
        self.commands.push(command);

        if let CommandOutcome::TurnEnded(report) = &outcome {
            let ended = report.turn + 1;
            if self.snapshot_interval > 0 && ended % self.snapshot_interval == 0 {
                self.snapshots
                    .push(snapshot::take_snapshot(&self.engine, self.commands.len()));
                tracing::debug!(session = %self.session_id, turn = ended, "snapshot taken");
            }
        }
        outcome
    }

    /// Rebuild the engine from the log. Returns the replayed hash.
    pub fn replay_full(&mut self) -> RuntimeResult<String> {
        let (engine, hash) = replay::rebuild_state(&self.config, &self.commands)?;
        self.engine = engine;
        Ok(hash)
    }

    /// Check every stored snapshot against a replay of its log prefix.
    pub fn verify_snapshots(&self) -> RuntimeResult<()> {
        for snap in &self.snapshots {
            snapshot::verify_snapshot(snap, &self.config, &self.commands)?;
        }
        Ok(())
    }

    pub fn export_log(&self) -> RuntimeResult<String> {
        let log = CommandLog {
            config: self.config.clone(),
            commands: self.commands.clone(),
        };
        Ok(serde_json::to_string(&log)?)
    }

    pub fn engine(&self) -> &GameEngine {
        &self.engine
    }

    pub fn state(&self) -> &GameState {
        self.engine.state()
    }

    pub fn current_hash(&self) -> String {
        canonical_hash(&self.engine)
    }

    pub fn commands(&self) -> &[PlayerCommand] {
        &self.commands
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn latest_snapshot(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// Session behind a mutex, for hosts that drive it from several threads.
pub struct SharedSession {
    inner: Mutex<Session>,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Mutex::new(session),
        }
    }

    pub fn apply(&self, command: PlayerCommand) -> RuntimeResult<CommandOutcome> {
        let mut session = self.inner.lock().map_err(|_| RuntimeError::LockPoisoned)?;
        Ok(session.apply(command))
    }

    pub fn current_hash(&self) -> RuntimeResult<String> {
        let session = self.inner.lock().map_err(|_| RuntimeError::LockPoisoned)?;
        Ok(session.current_hash())
    }

    pub fn command_count(&self) -> RuntimeResult<usize> {
        let session = self.inner.lock().map_err(|_| RuntimeError::LockPoisoned)?;
        Ok(session.commands().len())
    }
}
