//! Error types for rejected player and host operations.
//!
//! None of these are fatal. Every rejection is also mirrored as a
//! message in `GameState::messages`.

use thiserror::Error;

/// Reasons an operation on the engine can be rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("Insufficient money: need {needed}, have {available}")]
    InsufficientMoney { needed: i64, available: i64 },

    #[error("Insufficient action points: need {needed}, have {available}")]
    InsufficientActionPoints { needed: i64, available: i64 },

    #[error("{0} is already at maximum level")]
    UpgradeAtMaximum(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Action {0} is not available yet")]
    ActionUnavailable(String),

    #[error("Research project {0} is not active")]
    ProjectNotFound(u64),

    #[error("Research project {id} needs {turns_left} more turn(s)")]
    ProjectInProgress { id: u64, turns_left: i64 },

    #[error("Invalid cost for {label}: {amount}")]
    NegativeCost { label: String, amount: i64 },

    #[error("Event {0} is not pending")]
    EventNotPending(String),

    #[error("Action {action} is not available for event {event}")]
    ActionNotAvailable { event: String, action: String },

    #[error("No pending response with id {0}")]
    ResponseNotFound(u64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl SimError {
    /// Creates an insufficient-money error.
    pub fn money(needed: i64, available: i64) -> Self {
        Self::InsufficientMoney { needed, available }
    }

    /// Creates an insufficient-action-points error.
    pub fn action_points(needed: i64, available: i64) -> Self {
        Self::InsufficientActionPoints { needed, available }
    }
}

pub type SimResult<T> = Result<T, SimError>;
