//! Research quality model.
//!
//! Each quality level trades speed and cost against doom effectiveness,
//! technical debt and success rate.

use serde::{Deserialize, Serialize};

use crate::arithmetic::{fp_mul, pct, scale_mul, SCALE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchQuality {
    Rushed,
    #[default]
    Standard,
    Thorough,
}

impl ResearchQuality {
    pub const ALL: [ResearchQuality; 3] = [
        ResearchQuality::Rushed,
        ResearchQuality::Standard,
        ResearchQuality::Thorough,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ResearchQuality::Rushed => "Rushed",
            ResearchQuality::Standard => "Standard",
            ResearchQuality::Thorough => "Thorough",
        }
    }

    pub fn modifiers(&self) -> QualityModifiers {
        match self {
            ResearchQuality::Rushed => QualityModifiers {
                duration_mult: pct(60),
                cost_mult: pct(80),
                doom_modifier_pct: 15,
                debt_delta: 2,
                success_rate_delta_pct: -10,
                reputation_bonus: 0,
            },
            ResearchQuality::Standard => QualityModifiers {
                duration_mult: SCALE,
                cost_mult: SCALE,
                doom_modifier_pct: 0,
                debt_delta: 0,
                success_rate_delta_pct: 0,
                reputation_bonus: 0,
            },
            ResearchQuality::Thorough => QualityModifiers {
                duration_mult: pct(160),
                cost_mult: pct(140),
                doom_modifier_pct: -20,
                debt_delta: -1,
                success_rate_delta_pct: 15,
                reputation_bonus: 1,
            },
        }
    }
}

/// Modifier tuple for one quality level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityModifiers {
    /// Fixed-point.
    pub duration_mult: i64,
    /// Fixed-point.
    pub cost_mult: i64,
    /// Positive: less effective against doom. Negative: more effective.
    pub doom_modifier_pct: i64,
    pub debt_delta: i64,
    pub success_rate_delta_pct: i64,
    pub reputation_bonus: i64,
}

impl QualityModifiers {
    /// `1 - pct/100` for a positive modifier, `1 + |pct|/100` for a negative one.
    pub fn doom_effectiveness_fp(&self) -> i64 {
        if self.doom_modifier_pct > 0 {
            SCALE - pct(self.doom_modifier_pct)
        } else {
            SCALE + pct(self.doom_modifier_pct.abs())
        }
    }

    pub fn adjusted_cost(&self, base_cost: i64) -> i64 {
        scale_mul(base_cost, self.cost_mult)
    }

    pub fn adjusted_duration(&self, base_duration: i64) -> i64 {
        scale_mul(base_duration, self.duration_mult).max(1)
    }

    /// Apply the success delta to a fixed-point base rate, clamped to `[0, SCALE]`.
    pub fn adjusted_success_rate(&self, base_rate_fp: i64) -> i64 {
        (base_rate_fp + pct(self.success_rate_delta_pct)).clamp(0, SCALE)
    }

    /// Outcome of a project at this quality, scaled by the debt speed penalty.
    pub fn calculate_outcome(
        &self,
        base_doom_reduction: i64,
        base_reputation_gain: i64,
        speed_penalty_fp: i64,
    ) -> ResearchOutcome {
        let doom = fp_mul(base_doom_reduction * SCALE, self.doom_effectiveness_fp());
        let reputation = (base_reputation_gain + self.reputation_bonus) * SCALE;
        ResearchOutcome {
            doom_reduction_fp: fp_mul(doom, speed_penalty_fp),
            reputation_gain_fp: fp_mul(reputation, speed_penalty_fp),
        }
    }
}

/// Fixed-point outcome; integer accessors truncate toward zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResearchOutcome {
    pub doom_reduction_fp: i64,
    pub reputation_gain_fp: i64,
}

impl ResearchOutcome {
    pub fn doom_reduction(&self) -> i64 {
        self.doom_reduction_fp / SCALE
    }

    pub fn reputation_gain(&self) -> i64 {
        self.reputation_gain_fp / SCALE
    }
}
