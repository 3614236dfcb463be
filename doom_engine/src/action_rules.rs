//! Action and event eligibility rules.
//!
//! Pure predicates over a read-only `GameState`. Missing data reads as
//! zero/false; nothing here mutates or counts.

use serde::{Deserialize, Serialize};

use crate::domain::{GameState, Resource};

/// Composable eligibility rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Always,
    MinTurn(u32),
    MinResource { resource: Resource, threshold: i64 },
    Milestone(String),
    MinUpgrade(String),
    All(Vec<Rule>),
    Any(Vec<Rule>),
    Not(Box<Rule>),
}

impl Rule {
    pub fn evaluate(&self, state: &GameState) -> bool {
        match self {
            Rule::Always => true,
            Rule::MinTurn(turn) => min_turn(state, *turn),
            Rule::MinResource { resource, threshold } => min_resource(state, *resource, *threshold),
            Rule::Milestone(flag) => milestone_triggered(state, flag),
            Rule::MinUpgrade(key) => min_upgrade(state, key),
            Rule::All(rules) => rules.iter().all(|r| r.evaluate(state)),
            Rule::Any(rules) => rules.iter().any(|r| r.evaluate(state)),
            Rule::Not(rule) => !rule.evaluate(state),
        }
    }

    pub fn and(rules: impl IntoIterator<Item = Rule>) -> Rule {
        Rule::All(rules.into_iter().collect())
    }

    pub fn or(rules: impl IntoIterator<Item = Rule>) -> Rule {
        Rule::Any(rules.into_iter().collect())
    }

    /// Negated milestone flag.
    pub fn not(flag: &str) -> Rule {
        Rule::Not(Box::new(Rule::Milestone(flag.to_string())))
    }

    pub fn min_resource(resource: Resource, threshold: i64) -> Rule {
        Rule::MinResource { resource, threshold }
    }
}

pub fn min_turn(state: &GameState, turn: u32) -> bool {
    state.turn >= turn
}

pub fn min_resource(state: &GameState, resource: Resource, threshold: i64) -> bool {
    state.get(resource) >= threshold
}

pub fn milestone_triggered(state: &GameState, flag: &str) -> bool {
    state.has_milestone(flag)
}

pub fn min_upgrade(state: &GameState, key: &str) -> bool {
    state.has_upgrade(key)
}

pub fn not_milestone(state: &GameState, flag: &str) -> bool {
    !state.has_milestone(flag)
}
