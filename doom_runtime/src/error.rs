use thiserror::Error;

use doom_engine::SimError;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("engine error: {0}")]
    Engine(#[from] SimError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("snapshot at command {command_index} is internally inconsistent")]
    CorruptSnapshot { command_index: usize },
    #[error("snapshot at command {command_index} does not match replay: expected {expected}, got {actual}")]
    SnapshotMismatch {
        command_index: usize,
        expected: String,
        actual: String,
    },
    #[error("snapshot covers {command_index} commands but the log only has {available}")]
    SnapshotBeyondLog { command_index: usize, available: usize },
    #[error("snapshot was taken by engine version {found}, this is version {current}")]
    VersionMismatch { found: u32, current: u32 },
    #[error("session lock poisoned")]
    LockPoisoned,
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
