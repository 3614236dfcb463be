//! Canonical serialization + SHA-256 hashing of a whole engine.
//!
//! Rules:
//!   - Fixed top-level field order (serde_json `preserve_order`)
//!   - Maps are BTreeMaps, so keys come out sorted
//!   - Integers only; fractional values are fixed-point
//!   - No whitespace
//!
//! The event registry itself is code, not state; only the popup and
//! deferred queues and the last triggered turn are hashed.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::engine::GameEngine;
use crate::ENGINE_VERSION;

/// Canonical UTF-8 JSON bytes. `engine_version` is the first field.
pub fn canonical_serialize(engine: &GameEngine) -> Vec<u8> {
    build_canonical_value(engine).to_string().into_bytes()
}

/// SHA-256 of the canonical serialization, lowercase hex.
pub fn canonical_hash(engine: &GameEngine) -> String {
    hex_digest(&canonical_serialize(engine))
}

pub fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

// All hashed types use string or unit-enum map keys, which serde_json accepts.
fn value_of<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn build_canonical_value(engine: &GameEngine) -> Value {
    let state = engine.state();

    // -- event queues ---
    let popups: Vec<Value> = engine
        .pending_popup_events()
        .iter()
        .map(|e| Value::String(e.name().to_string()))
        .collect();
    let deferred: Vec<Value> = engine
        .deferred_events()
        .iter()
        .map(|e| {
            let mut m = Map::new();
            m.insert("name".to_string(), Value::String(e.name().to_string()));
            m.insert("turns_deferred".to_string(), Value::from(e.turns_deferred()));
            Value::Object(m)
        })
        .collect();
    let mut events = Map::new();
    events.insert("pending_popups".to_string(), Value::Array(popups));
    events.insert("deferred".to_string(), Value::Array(deferred));
    events.insert("triggered_turn".to_string(), value_of(&engine.events_triggered_turn()));

    // -- top-level (strict field order) ---
    let mut root = Map::new();
    root.insert("engine_version".to_string(), Value::from(ENGINE_VERSION));
    root.insert("seed".to_string(), Value::from(engine.rng().seed()));
    root.insert("turn".to_string(), Value::from(state.turn));
    root.insert("action_points".to_string(), Value::from(state.action_points));
    root.insert("resources".to_string(), value_of(&state.resources));
    root.insert("milestones".to_string(), value_of(&state.milestones));
    root.insert("upgrades".to_string(), value_of(&state.upgrades));
    root.insert("technical_debt".to_string(), value_of(&state.technical_debt));
    root.insert("researchers".to_string(), value_of(&state.researchers));
    root.insert("opponents".to_string(), value_of(&state.opponents));
    root.insert("economic_cycle".to_string(), value_of(&state.economic_cycle));
    root.insert("events".to_string(), Value::Object(events));
    root.insert("cascades".to_string(), value_of(engine.cascades()));
    root.insert("research".to_string(), value_of(engine.research()));
    root.insert("messages".to_string(), value_of(&state.messages));
    root.insert("turn_log".to_string(), value_of(engine.turn_log()));
    Value::Object(root)
}
