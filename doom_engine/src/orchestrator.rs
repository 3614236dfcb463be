//! Event orchestrator.
//!
//! Runs the registry once per turn in registration order. Per event the
//! lifecycle is Idle -> Triggered -> (executed | pending popup | deferred);
//! a deferred event ticks once per turn and is auto-accepted when its
//! deferral window expires.

use serde::{Deserialize, Serialize};

use crate::domain::{EventLogger, GameState};
use crate::error::{SimError, SimResult};
use crate::events::{effect_key, Event, EventAction, EventType, RegisteredEvent};
use crate::random::KeyedRng;

/// Observable lifecycle position of a registered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventState {
    Idle,
    /// Waiting in the popup queue for a player decision.
    Triggered,
    Deferred,
}

/// What happened to an event that fired this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Executed,
    QueuedPopup,
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TurnReport {
    pub fired: Vec<(String, Disposition)>,
    /// Deferred events auto-accepted this turn.
    pub expired: Vec<String>,
}

pub struct EventOrchestrator {
    registry: Vec<RegisteredEvent>,
    /// Registry indices, in the order they were queued.
    pending_popups: Vec<usize>,
    deferred: Vec<usize>,
}

impl EventOrchestrator {
    pub fn new(registry: Vec<RegisteredEvent>) -> Self {
        Self {
            registry,
            pending_popups: Vec::new(),
            deferred: Vec::new(),
        }
    }

    pub fn register(&mut self, event: impl Into<RegisteredEvent>) {
        self.registry.push(event.into());
    }

    pub fn registry(&self) -> &[RegisteredEvent] {
        &self.registry
    }

    pub fn event_state(&self, name: &str) -> Option<EventState> {
        let idx = self.index_of(name)?;
        Some(if self.pending_popups.contains(&idx) {
            EventState::Triggered
        } else if self.deferred.contains(&idx) {
            EventState::Deferred
        } else {
            EventState::Idle
        })
    }

    pub fn pending_popup_events(&self) -> Vec<&Event> {
        self.pending_popups
            .iter()
            .filter_map(|i| self.registry.get(*i).and_then(|e| e.as_enhanced()))
            .collect()
    }

    pub fn deferred_events(&self) -> Vec<&Event> {
        self.deferred
            .iter()
            .filter_map(|i| self.registry.get(*i).and_then(|e| e.as_enhanced()))
            .collect()
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.registry.iter().position(|e| e.name() == name)
    }

    fn enhanced_mut(&mut self, idx: usize) -> Option<&mut Event> {
        match self.registry.get_mut(idx) {
            Some(RegisteredEvent::Enhanced(e)) => Some(e),
            _ => None,
        }
    }

    /// Run one turn of events: tick the deferred queue, then evaluate every
    /// registered event that is neither deferred nor waiting as a popup.
    pub fn trigger_events(
        &mut self,
        state: &mut GameState,
        rng: &KeyedRng,
        logger: &mut dyn EventLogger,
    ) -> TurnReport {
        let mut report = TurnReport {
            expired: self.tick_deferred(state, rng),
            ..TurnReport::default()
        };

        for idx in 0..self.registry.len() {
            if self.pending_popups.contains(&idx) || self.deferred.contains(&idx) {
                continue;
            }
            if !self.registry[idx].is_triggered(state, rng) {
                continue;
            }

            let turn = state.turn;
            let name = self.registry[idx].name().to_string();
            let description = self.registry[idx].description().to_string();
            state.push_message(format!("Event: {} - {}", name, description));
            logger.log_event(&name, &description, turn);

            let draw = rng.draw(effect_key(&name, turn));
            let disposition = match &mut self.registry[idx] {
                RegisteredEvent::Legacy(e) => {
                    (e.effect)(state, &draw);
                    Disposition::Executed
                }
                RegisteredEvent::Enhanced(e) => match e.event_type() {
                    EventType::Normal => {
                        e.execute_effect(state, &draw);
                        Disposition::Executed
                    }
                    EventType::Popup => {
                        self.pending_popups.push(idx);
                        Disposition::QueuedPopup
                    }
                    EventType::Deferred => {
                        e.mark_deferred();
                        self.deferred.push(idx);
                        Disposition::Deferred
                    }
                },
            };
            tracing::info!(event = %name, turn, ?disposition, "event fired");
            report.fired.push((name, disposition));
        }
        report
    }

    /// Advance every deferred event by one turn; auto-accept the expired ones.
    fn tick_deferred(&mut self, state: &mut GameState, rng: &KeyedRng) -> Vec<String> {
        let mut expired = Vec::new();
        let mut still_deferred = Vec::new();
        for idx in std::mem::take(&mut self.deferred) {
            let turn = state.turn;
            let Some(event) = self.enhanced_mut(idx) else {
                continue;
            };
            if event.tick_deferred() {
                let name = event.name().to_string();
                let draw = rng.draw(effect_key(&name, turn));
                event.execute_effect(state, &draw);
                state.push_message(format!(
                    "Deferred event auto-resolved: {} - {}",
                    name,
                    event.description()
                ));
                tracing::info!(event = %name, turn, "deferred event expired, auto-accepted");
                expired.push(name);
            } else {
                still_deferred.push(idx);
            }
        }
        self.deferred = still_deferred;
        expired
    }

    /// Resolve a pending popup with a player action.
    pub fn handle_popup_event_action(
        &mut self,
        name: &str,
        action: EventAction,
        state: &mut GameState,
        rng: &KeyedRng,
    ) -> SimResult<()> {
        let Some(pos) = self
            .pending_popups
            .iter()
            .position(|i| self.registry.get(*i).map(|e| e.name()) == Some(name))
        else {
            return reject(state, SimError::EventNotPending(name.to_string()));
        };
        let idx = self.pending_popups[pos];
        let Some(event) = self.enhanced_mut(idx) else {
            return reject(state, SimError::EventNotPending(name.to_string()));
        };
        if !event.allows(action) || (action == EventAction::Defer && !event.can_be_deferred()) {
            return reject(state, not_available(name, action));
        }

        let draw = rng.draw(effect_key(name, state.turn));
        match action {
            EventAction::Accept => event.execute_effect(state, &draw),
            EventAction::Reduce => event.execute_reduced_effect(state, &draw),
            EventAction::Dismiss => event.reset(),
            EventAction::Defer => event.mark_deferred(),
        }
        self.pending_popups.remove(pos);
        if action == EventAction::Defer {
            self.deferred.push(idx);
        }
        state.push_message(format!("{}: {}", player_verb(action), name));
        tracing::info!(event = name, action = action.name(), "popup resolved by player");
        Ok(())
    }

    /// Resolve a deferred event early with a player action.
    pub fn handle_deferred_event_action(
        &mut self,
        name: &str,
        action: EventAction,
        state: &mut GameState,
        rng: &KeyedRng,
    ) -> SimResult<()> {
        let Some(pos) = self
            .deferred
            .iter()
            .position(|i| self.registry.get(*i).map(|e| e.name()) == Some(name))
        else {
            return reject(state, SimError::EventNotPending(name.to_string()));
        };
        let idx = self.deferred[pos];
        let Some(event) = self.enhanced_mut(idx) else {
            return reject(state, SimError::EventNotPending(name.to_string()));
        };
        if action == EventAction::Defer || !event.allows(action) {
            return reject(state, not_available(name, action));
        }

        let draw = rng.draw(effect_key(name, state.turn));
        match action {
            EventAction::Accept => event.execute_effect(state, &draw),
            EventAction::Reduce => event.execute_reduced_effect(state, &draw),
            _ => event.reset(),
        }
        self.deferred.remove(pos);
        state.push_message(format!("{}: {}", player_verb(action), name));
        tracing::info!(event = name, action = action.name(), "deferred event resolved by player");
        Ok(())
    }
}

fn player_verb(action: EventAction) -> &'static str {
    match action {
        EventAction::Accept => "Accepted",
        EventAction::Defer => "Deferred",
        EventAction::Reduce => "Mitigated",
        EventAction::Dismiss => "Dismissed",
    }
}

fn not_available(name: &str, action: EventAction) -> SimError {
    SimError::ActionNotAvailable {
        event: name.to_string(),
        action: action.name().to_string(),
    }
}

fn reject(state: &mut GameState, err: SimError) -> SimResult<()> {
    tracing::warn!(error = %err, "event action rejected");
    state.push_message(err.to_string());
    Err(err)
}
