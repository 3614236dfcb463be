//! Hosting-context types.
//!
//! `GameState` is the slice of the wider game that this core reads and
//! mutates: resources, the turn counter, the message log, milestone and
//! upgrade flags, the technical-debt ledger, and the optional collaborator
//! subsystems (researchers, opponents, economic cycle).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::debt::TechnicalDebtLedger;
use crate::error::{SimError, SimResult};

/// Upper bound of the doom scalar.
pub const DOOM_MAX: i64 = 100;

// ── Resources ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Money,
    Staff,
    Reputation,
    Doom,
    Compute,
}

impl Resource {
    pub const ALL: [Resource; 5] = [
        Resource::Money,
        Resource::Staff,
        Resource::Reputation,
        Resource::Doom,
        Resource::Compute,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Resource::Money => "money",
            Resource::Staff => "staff",
            Resource::Reputation => "reputation",
            Resource::Doom => "doom",
            Resource::Compute => "compute",
        }
    }
}

/// Integer resource pool. Doom lives in `[0, DOOM_MAX]`, everything else is `>= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resources {
    pub money: i64,
    pub staff: i64,
    pub reputation: i64,
    pub doom: i64,
    pub compute: i64,
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            money: 300,
            staff: 2,
            reputation: 10,
            doom: 25,
            compute: 10,
        }
    }
}

impl Resources {
    pub fn get(&self, resource: Resource) -> i64 {
        match resource {
            Resource::Money => self.money,
            Resource::Staff => self.staff,
            Resource::Reputation => self.reputation,
            Resource::Doom => self.doom,
            Resource::Compute => self.compute,
        }
    }

    fn slot(&mut self, resource: Resource) -> &mut i64 {
        match resource {
            Resource::Money => &mut self.money,
            Resource::Staff => &mut self.staff,
            Resource::Reputation => &mut self.reputation,
            Resource::Doom => &mut self.doom,
            Resource::Compute => &mut self.compute,
        }
    }
}

// ── Optional collaborators ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Researcher {
    pub name: String,
    pub specialization: String,
    /// 0..=100
    pub burnout: i64,
    pub traits: Vec<String>,
    /// 0..=100
    pub loyalty: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opponent {
    pub name: String,
    pub discovered: bool,
    pub technical_debt: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EconomicPhase {
    Boom,
    Stable,
    Correction,
    Recession,
    Recovery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomicCycle {
    pub current_phase: EconomicPhase,
}

// ── Game state ─────────────────────────────────────────────────────

/// The hosting context as seen by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub turn: u32,
    pub resources: Resources,
    pub action_points: i64,
    pub messages: Vec<String>,
    pub milestones: BTreeSet<String>,
    pub upgrades: BTreeSet<String>,
    pub technical_debt: TechnicalDebtLedger,
    pub researchers: Option<Vec<Researcher>>,
    pub opponents: Option<Vec<Opponent>>,
    pub economic_cycle: Option<EconomicCycle>,
}

impl GameState {
    pub fn get(&self, resource: Resource) -> i64 {
        self.resources.get(resource)
    }

    /// Apply `delta` to a resource, clamping to its valid range.
    /// Returns the delta actually applied.
    pub fn add(&mut self, resource: Resource, delta: i64, reason: Option<&str>) -> i64 {
        let slot = self.resources.slot(resource);
        let before = *slot;
        let upper = if resource == Resource::Doom { DOOM_MAX } else { i64::MAX };
        *slot = before.saturating_add(delta).clamp(0, upper);
        let applied = *slot - before;
        tracing::debug!(
            resource = resource.name(),
            delta,
            applied,
            reason = reason.unwrap_or(""),
            "resource changed"
        );
        applied
    }

    pub fn push_message(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Check that `money` and `action_points` are both affordable.
    /// Negative amounts are rejected. On failure a user-facing message is
    /// logged and nothing is deducted.
    pub fn check_costs(&mut self, label: &str, money: i64, action_points: i64) -> SimResult<()> {
        let err = if money < 0 || action_points < 0 {
            Some(SimError::NegativeCost {
                label: label.to_string(),
                amount: money.min(action_points),
            })
        } else if self.resources.money < money {
            Some(SimError::money(money, self.resources.money))
        } else if self.action_points < action_points {
            Some(SimError::action_points(action_points, self.action_points))
        } else {
            None
        };
        match err {
            Some(e) => {
                tracing::warn!(action = label, error = %e, "action rejected");
                self.push_message(format!("Cannot {}: {}", label, e));
                Err(e)
            }
            None => Ok(()),
        }
    }

    /// Deduct costs previously validated by `check_costs`.
    pub fn pay(&mut self, label: &str, money: i64, action_points: i64) {
        if money != 0 {
            self.add(Resource::Money, -money, Some(label));
        }
        self.action_points = (self.action_points - action_points).max(0);
    }

    pub fn has_milestone(&self, flag: &str) -> bool {
        self.milestones.contains(flag)
    }

    pub fn has_upgrade(&self, key: &str) -> bool {
        self.upgrades.contains(key)
    }
}

// ── Event logger callback ──────────────────────────────────────────

/// One fired event, as recorded to the turn log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub name: String,
    pub description: String,
    pub turn: u32,
}

/// Host-supplied sink for fired events.
pub trait EventLogger {
    fn log_event(&mut self, name: &str, description: &str, turn: u32);
}

/// Records every fired event in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnLog {
    pub records: Vec<EventRecord>,
}

impl EventLogger for TurnLog {
    fn log_event(&mut self, name: &str, description: &str, turn: u32) {
        self.records.push(EventRecord {
            name: name.to_string(),
            description: description.to_string(),
            turn,
        });
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl EventLogger for NullLogger {
    fn log_event(&mut self, _name: &str, _description: &str, _turn: u32) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::blank_state;

    #[test]
    fn add_clamps_doom_and_floors_at_zero() {
        let mut s = blank_state();
        s.resources.doom = 95;
        assert_eq!(s.add(Resource::Doom, 10, None), 5);
        assert_eq!(s.resources.doom, DOOM_MAX);
        s.resources.reputation = 2;
        assert_eq!(s.add(Resource::Reputation, -5, Some("scandal")), -2);
        assert_eq!(s.resources.reputation, 0);
    }

    #[test]
    fn check_costs_rejects_without_deducting() {
        let mut s = blank_state();
        s.resources.money = 10;
        s.action_points = 3;
        let err = s.check_costs("run audit", 50, 1).unwrap_err();
        assert_eq!(err, SimError::money(50, 10));
        assert_eq!(s.resources.money, 10);
        assert_eq!(s.messages.len(), 1);
        assert!(s.messages[0].starts_with("Cannot run audit"));

        s.resources.money = 100;
        let err = s.check_costs("run audit", 50, 4).unwrap_err();
        assert_eq!(err, SimError::action_points(4, 3));
    }

    #[test]
    fn negative_costs_are_rejected() {
        let mut s = blank_state();
        s.resources.money = 100;
        let err = s.check_costs("upgrade", -500, 0).unwrap_err();
        assert_eq!(
            err,
            SimError::NegativeCost {
                label: "upgrade".to_string(),
                amount: -500
            }
        );
        assert_eq!(s.resources.money, 100);
        assert!(s.check_costs("upgrade", 0, 0).is_ok());
    }

    #[test]
    fn turn_log_records_in_order() {
        let mut log = TurnLog::default();
        log.log_event("A", "first", 1);
        log.log_event("B", "second", 1);
        assert_eq!(log.records.len(), 2);
        assert_eq!(log.records[1].name, "B");
    }
}
