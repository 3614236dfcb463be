#![forbid(unsafe_code)]

//! Runtime for doom_engine: command sessions, replay, snapshots and
//! drift detection.
//!
//! No game logic lives here; every command is delegated to the engine.

pub mod error;
pub mod commands;
pub mod replay;
pub mod snapshot;
pub mod session;
pub mod drift;
