#![forbid(unsafe_code)]

//! Deterministic turn engine for a research-lab simulation: keyed
//! randomness, eligibility rules, research quality, technical debt,
//! failure cascades and the per-turn event orchestrator.

/// Bound into every canonical hash. Bump when replayed behavior changes.
pub const ENGINE_VERSION: u32 = 1;

pub mod arithmetic;
pub mod error;
pub mod random;
pub mod domain;
pub mod config;
pub mod state;
pub mod action_rules;
pub mod quality;
pub mod debt;
pub mod events;
pub mod catalog;
pub mod orchestrator;
pub mod cascade;
pub mod research;
pub mod invariants;
pub mod hashing;
pub mod engine;

pub use config::EngineConfig;
pub use engine::{EndTurnReport, GameEngine};
pub use error::{SimError, SimResult};
