//! Event definitions.
//!
//! Events are data plus two function pointers: a trigger predicate and an
//! effect. Legacy entries are bare trigger/effect pairs; enhanced entries
//! add a presentation type (normal, popup, deferred) and player actions.

use serde::{Deserialize, Serialize};

use crate::domain::GameState;
use crate::random::{Draw, KeyedRng};

/// Trigger predicate. Must be pure: same state and draw, same answer.
pub type TriggerFn = fn(&GameState, &Draw) -> bool;

/// Effect applied when an event resolves.
pub type EffectFn = fn(&mut GameState, &Draw);

/// Default number of turns an event may sit in the deferred queue.
pub const DEFAULT_MAX_DEFERRED_TURNS: u32 = 3;

pub fn trigger_key(name: &str, turn: u32) -> String {
    format!("event_{}_trigger_turn_{}", name, turn)
}

pub fn effect_key(name: &str, turn: u32) -> String {
    format!("event_{}_effect_turn_{}", name, turn)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Normal,
    Popup,
    Deferred,
}

impl EventType {
    pub fn default_actions(&self) -> Vec<EventAction> {
        match self {
            EventType::Normal => vec![EventAction::Accept],
            EventType::Popup => vec![EventAction::Accept, EventAction::Defer, EventAction::Dismiss],
            EventType::Deferred => vec![EventAction::Accept, EventAction::Reduce, EventAction::Dismiss],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    Accept,
    Defer,
    Reduce,
    Dismiss,
}

impl EventAction {
    pub fn name(&self) -> &'static str {
        match self {
            EventAction::Accept => "accept",
            EventAction::Defer => "defer",
            EventAction::Reduce => "reduce",
            EventAction::Dismiss => "dismiss",
        }
    }
}

/// Bare trigger/effect pair; always fires immediately.
#[derive(Debug, Clone)]
pub struct LegacyEvent {
    pub name: String,
    pub description: String,
    pub trigger: TriggerFn,
    pub effect: EffectFn,
}

impl LegacyEvent {
    pub fn new(name: &str, description: &str, trigger: TriggerFn, effect: EffectFn) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            trigger,
            effect,
        }
    }
}

/// Enhanced event with presentation type and deferral state.
#[derive(Debug, Clone)]
pub struct Event {
    name: String,
    description: String,
    trigger: TriggerFn,
    effect: EffectFn,
    reduced_effect: Option<EffectFn>,
    event_type: EventType,
    max_deferred_turns: u32,
    available_actions: Vec<EventAction>,
    is_deferred: bool,
    turns_deferred: u32,
}

impl Event {
    pub fn new(
        name: &str,
        description: &str,
        event_type: EventType,
        trigger: TriggerFn,
        effect: EffectFn,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            trigger,
            effect,
            reduced_effect: None,
            event_type,
            max_deferred_turns: DEFAULT_MAX_DEFERRED_TURNS,
            available_actions: event_type.default_actions(),
            is_deferred: false,
            turns_deferred: 0,
        }
    }

    pub fn with_max_deferred_turns(mut self, turns: u32) -> Self {
        self.max_deferred_turns = turns;
        self
    }

    /// Milder effect used by the Reduce action.
    pub fn with_reduced_effect(mut self, effect: EffectFn) -> Self {
        self.reduced_effect = Some(effect);
        self
    }

    pub fn with_actions(mut self, actions: &[EventAction]) -> Self {
        self.available_actions = actions.to_vec();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn max_deferred_turns(&self) -> u32 {
        self.max_deferred_turns
    }

    pub fn available_actions(&self) -> &[EventAction] {
        &self.available_actions
    }

    pub fn allows(&self, action: EventAction) -> bool {
        self.available_actions.contains(&action)
    }

    pub fn is_deferred(&self) -> bool {
        self.is_deferred
    }

    pub fn turns_deferred(&self) -> u32 {
        self.turns_deferred
    }

    pub fn can_be_deferred(&self) -> bool {
        !self.is_deferred && self.allows(EventAction::Defer)
    }

    pub(crate) fn mark_deferred(&mut self) {
        self.is_deferred = true;
        self.turns_deferred = 0;
    }

    /// Advance one deferred turn. Returns true once the deferral has expired.
    pub(crate) fn tick_deferred(&mut self) -> bool {
        self.turns_deferred += 1;
        self.turns_deferred >= self.max_deferred_turns
    }

    pub(crate) fn trigger(&self) -> TriggerFn {
        self.trigger
    }

    /// Run the full effect and return to the initial state.
    pub fn execute_effect(&mut self, state: &mut GameState, draw: &Draw) {
        (self.effect)(state, draw);
        self.reset();
    }

    /// Run the reduced effect (the full one if none is defined) and reset.
    pub fn execute_reduced_effect(&mut self, state: &mut GameState, draw: &Draw) {
        let effect = self.reduced_effect.unwrap_or(self.effect);
        effect(state, draw);
        self.reset();
    }

    /// Return to the initial, non-deferred state without running anything.
    pub fn reset(&mut self) {
        self.is_deferred = false;
        self.turns_deferred = 0;
    }
}

/// Registry entry. Both kinds go through the same per-turn loop.
#[derive(Debug, Clone)]
pub enum RegisteredEvent {
    Legacy(LegacyEvent),
    Enhanced(Event),
}

impl RegisteredEvent {
    pub fn name(&self) -> &str {
        match self {
            RegisteredEvent::Legacy(e) => &e.name,
            RegisteredEvent::Enhanced(e) => e.name(),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            RegisteredEvent::Legacy(e) => &e.description,
            RegisteredEvent::Enhanced(e) => e.description(),
        }
    }

    /// Evaluate the trigger with the turn-scoped key.
    pub fn is_triggered(&self, state: &GameState, rng: &KeyedRng) -> bool {
        let trigger = match self {
            RegisteredEvent::Legacy(e) => e.trigger,
            RegisteredEvent::Enhanced(e) => e.trigger(),
        };
        trigger(state, &rng.draw(trigger_key(self.name(), state.turn)))
    }

    pub fn as_enhanced(&self) -> Option<&Event> {
        match self {
            RegisteredEvent::Enhanced(e) => Some(e),
            RegisteredEvent::Legacy(_) => None,
        }
    }
}

impl From<LegacyEvent> for RegisteredEvent {
    fn from(event: LegacyEvent) -> Self {
        RegisteredEvent::Legacy(event)
    }
}

impl From<Event> for RegisteredEvent {
    fn from(event: Event) -> Self {
        RegisteredEvent::Enhanced(event)
    }
}
