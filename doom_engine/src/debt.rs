//! Technical-debt ledger.
//!
//! Debt is tracked per category; `accumulated_debt` always equals the sum
//! of the categories and never goes below zero. Consequences are pure
//! functions of the total, grouped into tiers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::arithmetic::{pct, to_f64, SCALE};
use crate::random::KeyedRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtCategory {
    Safety,
    Reliability,
    Documentation,
    Testing,
}

impl DebtCategory {
    pub const ALL: [DebtCategory; 4] = [
        DebtCategory::Safety,
        DebtCategory::Reliability,
        DebtCategory::Documentation,
        DebtCategory::Testing,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DebtCategory::Safety => "safety",
            DebtCategory::Reliability => "reliability",
            DebtCategory::Documentation => "documentation",
            DebtCategory::Testing => "testing",
        }
    }
}

/// Consequence tier of the accumulated debt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtTier {
    /// 0–5
    Clean,
    /// 6–10
    Minor,
    /// 11–15
    Moderate,
    /// 16–20
    Severe,
    /// > 20
    Critical,
}

impl DebtTier {
    pub fn from_debt(debt: i64) -> Self {
        match debt {
            i64::MIN..=5 => DebtTier::Clean,
            6..=10 => DebtTier::Minor,
            11..=15 => DebtTier::Moderate,
            16..=20 => DebtTier::Severe,
            _ => DebtTier::Critical,
        }
    }

    /// Research speed multiplier, fixed-point.
    pub fn speed_penalty_fp(&self) -> i64 {
        match self {
            DebtTier::Clean => SCALE,
            DebtTier::Minor => pct(95),
            DebtTier::Moderate => pct(90),
            DebtTier::Severe => pct(85),
            DebtTier::Critical => pct(80),
        }
    }

    /// Per-turn accident chance, fixed-point.
    pub fn accident_chance_fp(&self) -> i64 {
        match self {
            DebtTier::Clean | DebtTier::Minor => 0,
            DebtTier::Moderate => pct(5),
            DebtTier::Severe => pct(10),
            DebtTier::Critical => pct(15),
        }
    }

    pub fn reputation_risk(&self) -> bool {
        matches!(self, DebtTier::Severe | DebtTier::Critical)
    }

    pub fn system_failure_eligible(&self) -> bool {
        matches!(self, DebtTier::Critical)
    }

    pub fn label(&self) -> &'static str {
        match self {
            DebtTier::Clean => "clean",
            DebtTier::Minor => "minor",
            DebtTier::Moderate => "moderate",
            DebtTier::Severe => "severe",
            DebtTier::Critical => "critical",
        }
    }
}

/// Debt ledger with per-category breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnicalDebtLedger {
    accumulated_debt: i64,
    per_category: BTreeMap<DebtCategory, i64>,
}

impl Default for TechnicalDebtLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl TechnicalDebtLedger {
    pub fn new() -> Self {
        Self {
            accumulated_debt: 0,
            per_category: DebtCategory::ALL.iter().map(|c| (*c, 0)).collect(),
        }
    }

    pub fn accumulated_debt(&self) -> i64 {
        self.accumulated_debt
    }

    pub fn category_debt(&self, category: DebtCategory) -> i64 {
        self.per_category.get(&category).copied().unwrap_or(0)
    }

    pub fn per_category(&self) -> &BTreeMap<DebtCategory, i64> {
        &self.per_category
    }

    /// Add `amount` points of debt.
    ///
    /// Without a category each unit lands in a category drawn with key
    /// `<key>_unit_<i>`, so the split replays identically for the same seed.
    /// Returns the amount added (0 for non-positive input).
    pub fn add_debt(
        &mut self,
        amount: i64,
        category: Option<DebtCategory>,
        rng: &KeyedRng,
        key: &str,
    ) -> i64 {
        if amount <= 0 {
            return 0;
        }
        match category {
            Some(c) => {
                *self.per_category.entry(c).or_insert(0) += amount;
            }
            None => {
                for i in 0..amount {
                    let unit_key = format!("{}_unit_{}", key, i);
                    let c = rng
                        .pick_one(&DebtCategory::ALL, &unit_key)
                        .copied()
                        .unwrap_or(DebtCategory::Reliability);
                    *self.per_category.entry(c).or_insert(0) += 1;
                }
            }
        }
        self.accumulated_debt += amount;
        tracing::debug!(amount, total = self.accumulated_debt, "technical debt added");
        amount
    }

    /// Reduce debt by up to `amount`.
    ///
    /// With a category only that category is reduced. Without one, the
    /// largest categories are drained first (ties in category order).
    /// Returns the amount actually removed.
    pub fn reduce_debt(&mut self, amount: i64, category: Option<DebtCategory>) -> i64 {
        if amount <= 0 {
            return 0;
        }
        let reduced = match category {
            Some(c) => {
                let slot = self.per_category.entry(c).or_insert(0);
                let take = amount.min(*slot);
                *slot -= take;
                take
            }
            None => {
                let mut remaining = amount;
                let mut taken = 0;
                while remaining > 0 {
                    // Largest first; BTreeMap order breaks ties deterministically.
                    let largest = self
                        .per_category
                        .iter()
                        .filter(|(_, v)| **v > 0)
                        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
                        .map(|(c, v)| (*c, *v));
                    let Some((c, value)) = largest else {
                        break;
                    };
                    let take = remaining.min(value);
                    if let Some(slot) = self.per_category.get_mut(&c) {
                        *slot -= take;
                    }
                    remaining -= take;
                    taken += take;
                }
                taken
            }
        };
        self.accumulated_debt -= reduced;
        tracing::debug!(requested = amount, reduced, total = self.accumulated_debt, "technical debt reduced");
        reduced
    }

    pub fn tier(&self) -> DebtTier {
        DebtTier::from_debt(self.accumulated_debt)
    }

    pub fn speed_penalty_fp(&self) -> i64 {
        self.tier().speed_penalty_fp()
    }

    pub fn get_research_speed_penalty(&self) -> f64 {
        to_f64(self.speed_penalty_fp())
    }

    pub fn accident_chance_fp(&self) -> i64 {
        self.tier().accident_chance_fp()
    }

    pub fn has_reputation_risk(&self) -> bool {
        self.tier().reputation_risk()
    }

    pub fn is_system_failure_eligible(&self) -> bool {
        self.tier().system_failure_eligible()
    }

    /// `accumulated_debt == sum(per_category)` and nothing is negative.
    pub fn is_consistent(&self) -> bool {
        let sum: i64 = self.per_category.values().sum();
        self.accumulated_debt >= 0
            && sum == self.accumulated_debt
            && self.per_category.values().all(|v| *v >= 0)
    }

    pub fn summary(&self) -> DebtSummary {
        let tier = self.tier();
        DebtSummary {
            accumulated_debt: self.accumulated_debt,
            per_category: self.per_category.clone(),
            tier,
            speed_penalty: tier.speed_penalty_fp(),
            accident_chance: tier.accident_chance_fp(),
            reputation_risk: tier.reputation_risk(),
            system_failure_eligible: tier.system_failure_eligible(),
        }
    }
}

/// Read-only view for display. Fixed-point fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtSummary {
    pub accumulated_debt: i64,
    pub per_category: BTreeMap<DebtCategory, i64>,
    pub tier: DebtTier,
    pub speed_penalty: i64,
    pub accident_chance: i64,
    pub reputation_risk: bool,
    pub system_failure_eligible: bool,
}
