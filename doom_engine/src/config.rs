//! Engine configuration.
//!
//! Every tunable has a default; a JSON document only needs to name the
//! fields it overrides.

use serde::{Deserialize, Serialize};

use crate::arithmetic::pct;
use crate::domain::Resources;
use crate::error::{SimError, SimResult};

/// Top-level configuration for a `GameEngine`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Master seed; every keyed draw derives from it.
    pub seed: u64,
    pub starting_resources: Resources,
    pub action_points_per_turn: i64,
    pub cascade: CascadeConstants,
    pub research: ResearchConstants,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            starting_resources: Resources::default(),
            action_points_per_turn: 3,
            cascade: CascadeConstants::default(),
            research: ResearchConstants::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Parse a JSON document and validate it.
    pub fn from_json_str(json: &str) -> SimResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SimError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.action_points_per_turn < 0 {
            return Err(SimError::InvalidConfig(
                "action_points_per_turn must be >= 0".to_string(),
            ));
        }
        if self.cascade.max_cascade_turns == 0 {
            return Err(SimError::InvalidConfig(
                "cascade.max_cascade_turns must be >= 1".to_string(),
            ));
        }
        if self.cascade.max_upgrade_level == 0 {
            return Err(SimError::InvalidConfig(
                "cascade.max_upgrade_level must be >= 1".to_string(),
            ));
        }
        for (name, p) in [
            ("cascade.near_miss_base", self.cascade.near_miss_base),
            ("cascade.subsequent_failure_chance", self.cascade.subsequent_failure_chance),
            ("research.base_success_rate", self.research.base_success_rate),
            ("research.reputation_risk_chance", self.research.reputation_risk_chance),
        ] {
            if !(0..=crate::arithmetic::SCALE).contains(&p) {
                return Err(SimError::InvalidConfig(format!(
                    "{} must be a fixed-point probability in [0, 10000], got {}",
                    name, p
                )));
            }
        }
        Ok(())
    }
}

/// Failure/cascade tunables. Probabilities are fixed-point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CascadeConstants {
    /// Near-miss probability at monitoring level 0.
    pub near_miss_base: i64,
    /// Added per monitoring-systems level.
    pub near_miss_per_monitoring: i64,
    /// Fraction of the debt accident chance that becomes a failure attempt.
    pub failure_attempt_factor: i64,
    /// Per-tick chance that an uncontained cascade spawns another failure.
    pub subsequent_failure_chance: i64,
    /// Cascades are force-resolved when they reach this many turns.
    pub max_cascade_turns: u32,
    /// Cap for incident response, monitoring and communication levels.
    pub max_upgrade_level: u32,
}

impl Default for CascadeConstants {
    fn default() -> Self {
        Self {
            near_miss_base: pct(40),
            near_miss_per_monitoring: pct(10),
            failure_attempt_factor: pct(30),
            subsequent_failure_chance: pct(40),
            max_cascade_turns: 3,
            max_upgrade_level: 5,
        }
    }
}

/// Research tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResearchConstants {
    /// Success rate of a Standard project before quality adjustment.
    pub base_success_rate: i64,
    /// Chance that completing a Rushed project costs reputation while debt carries reputation risk.
    pub reputation_risk_chance: i64,
}

impl Default for ResearchConstants {
    fn default() -> Self {
        Self {
            base_success_rate: pct(80),
            reputation_risk_chance: pct(25),
        }
    }
}
