//! Registered game events.
//!
//! Legacy entries predate the popup/deferral system and stay as plain
//! trigger/effect pairs; they share the per-turn loop with the enhanced
//! entries. Triggers that depend on an optional subsystem return false
//! when the subsystem is absent.

use crate::action_rules::{min_resource, min_turn, Rule};
use crate::arithmetic::pct;
use crate::domain::{EconomicPhase, GameState, Resource};
use crate::events::{Event, EventType, LegacyEvent, RegisteredEvent};
use crate::random::Draw;

/// The full registry, in firing order.
pub fn default_registry() -> Vec<RegisteredEvent> {
    vec![
        LegacyEvent::new(
            "Lab Breakthrough",
            "Your researchers report an unexpected capabilities result.",
            lab_breakthrough_trigger,
            lab_breakthrough_effect,
        )
        .into(),
        LegacyEvent::new(
            "Funding Crisis",
            "Cash is running low; an emergency bridge round closes on poor terms.",
            funding_crisis_trigger,
            funding_crisis_effect,
        )
        .into(),
        LegacyEvent::new(
            "Staff Burnout",
            "An exhausted researcher resigns.",
            staff_burnout_trigger,
            staff_burnout_effect,
        )
        .into(),
        LegacyEvent::new(
            "Competitor Revealed",
            "Intelligence uncovers a previously unknown frontier lab.",
            competitor_revealed_trigger,
            competitor_revealed_effect,
        )
        .into(),
        LegacyEvent::new(
            "Economic Downturn",
            "Investors pull back as the economy contracts.",
            economic_downturn_trigger,
            economic_downturn_effect,
        )
        .into(),
        LegacyEvent::new(
            "Safety Conference",
            "Your team presents alignment results at a safety conference.",
            safety_conference_trigger,
            safety_conference_effect,
        )
        .into(),
        Event::new(
            "Media Scrutiny",
            "Journalists dig into the shortcuts your lab has been taking.",
            EventType::Normal,
            media_scrutiny_trigger,
            media_scrutiny_effect,
        )
        .into(),
        Event::new(
            "Technical Debt Crisis",
            "Years of shortcuts surface as a production meltdown.",
            EventType::Normal,
            debt_crisis_trigger,
            debt_crisis_effect,
        )
        .into(),
        Event::new(
            "Rival Collapse",
            "A competitor's debt-ridden systems fail in public.",
            EventType::Normal,
            rival_collapse_trigger,
            rival_collapse_effect,
        )
        .into(),
        Event::new(
            "Whistleblower Report",
            "A staff member raises safety concerns with the press.",
            EventType::Popup,
            whistleblower_trigger,
            whistleblower_effect,
        )
        .into(),
        Event::new(
            "Regulation Proposal",
            "Lawmakers propose mandatory safety evaluations for frontier labs.",
            EventType::Popup,
            regulation_trigger,
            regulation_effect,
        )
        .into(),
        Event::new(
            "Infrastructure Upgrade Offer",
            "A cloud provider offers discounted capacity for a limited time.",
            EventType::Deferred,
            infrastructure_offer_trigger,
            infrastructure_offer_effect,
        )
        .with_reduced_effect(infrastructure_offer_reduced)
        .into(),
        Event::new(
            "Poaching Attempt",
            "A rival lab tries to hire away one of your researchers.",
            EventType::Deferred,
            poaching_trigger,
            poaching_effect,
        )
        .with_max_deferred_turns(2)
        .with_reduced_effect(poaching_counter_offer)
        .into(),
    ]
}

// ── Legacy events ──────────────────────────────────────────────────

fn lab_breakthrough_trigger(state: &GameState, draw: &Draw) -> bool {
    min_turn(state, 3) && draw.chance(pct(8))
}

fn lab_breakthrough_effect(state: &mut GameState, _: &Draw) {
    state.add(Resource::Reputation, 2, Some("Lab Breakthrough"));
    state.add(Resource::Doom, 2, Some("Lab Breakthrough"));
}

fn funding_crisis_trigger(state: &GameState, draw: &Draw) -> bool {
    !min_resource(state, Resource::Money, 50) && draw.chance(pct(30))
}

fn funding_crisis_effect(state: &mut GameState, draw: &Draw) {
    let bridge = draw.integer("bridge", 20, 40);
    state.add(Resource::Money, bridge, Some("Funding Crisis"));
    state.add(Resource::Reputation, -1, Some("Funding Crisis"));
}

fn staff_burnout_trigger(state: &GameState, draw: &Draw) -> bool {
    let Some(researchers) = &state.researchers else {
        return false;
    };
    researchers.iter().any(|r| r.burnout >= 70) && draw.chance(pct(25))
}

fn staff_burnout_effect(state: &mut GameState, _: &Draw) {
    let Some(researchers) = state.researchers.as_mut() else {
        return;
    };
    // First researcher with the highest burnout leaves.
    let mut leaving: Option<(usize, i64)> = None;
    for (i, r) in researchers.iter().enumerate() {
        if leaving.map_or(true, |(_, b)| r.burnout > b) {
            leaving = Some((i, r.burnout));
        }
    }
    if let Some((i, _)) = leaving {
        researchers.remove(i);
        state.add(Resource::Staff, -1, Some("Staff Burnout"));
    }
}

fn competitor_revealed_trigger(state: &GameState, draw: &Draw) -> bool {
    let Some(opponents) = &state.opponents else {
        return false;
    };
    opponents.iter().any(|o| !o.discovered) && draw.chance(pct(15))
}

fn competitor_revealed_effect(state: &mut GameState, draw: &Draw) {
    let Some(opponents) = state.opponents.as_mut() else {
        return;
    };
    let hidden: Vec<usize> = opponents
        .iter()
        .enumerate()
        .filter(|(_, o)| !o.discovered)
        .map(|(i, _)| i)
        .collect();
    if let Some(i) = draw.pick_one("target", &hidden) {
        opponents[*i].discovered = true;
        state.add(Resource::Doom, 1, Some("Competitor Revealed"));
    }
}

fn economic_downturn_trigger(state: &GameState, draw: &Draw) -> bool {
    let Some(cycle) = &state.economic_cycle else {
        return false;
    };
    matches!(
        cycle.current_phase,
        EconomicPhase::Correction | EconomicPhase::Recession
    ) && draw.chance(pct(20))
}

fn economic_downturn_effect(state: &mut GameState, _: &Draw) {
    let loss = state.resources.money / 10;
    state.add(Resource::Money, -loss, Some("Economic Downturn"));
}

fn safety_conference_trigger(state: &GameState, draw: &Draw) -> bool {
    Rule::and([Rule::MinTurn(5), Rule::min_resource(Resource::Reputation, 5)]).evaluate(state)
        && draw.chance(pct(10))
}

fn safety_conference_effect(state: &mut GameState, _: &Draw) {
    state.add(Resource::Reputation, 2, Some("Safety Conference"));
    state.add(Resource::Doom, -1, Some("Safety Conference"));
}

// ── Enhanced events ────────────────────────────────────────────────

fn media_scrutiny_trigger(state: &GameState, draw: &Draw) -> bool {
    state.technical_debt.has_reputation_risk() && draw.chance(pct(20))
}

fn media_scrutiny_effect(state: &mut GameState, _: &Draw) {
    state.add(Resource::Reputation, -2, Some("Media Scrutiny"));
}

fn debt_crisis_trigger(state: &GameState, draw: &Draw) -> bool {
    state.technical_debt.is_system_failure_eligible() && draw.chance(pct(15))
}

fn debt_crisis_effect(state: &mut GameState, draw: &Draw) {
    let lost = draw.integer("compute", 2, 4);
    state.add(Resource::Compute, -lost, Some("Technical Debt Crisis"));
    state.add(Resource::Doom, 1, Some("Technical Debt Crisis"));
}

fn rival_collapse_trigger(state: &GameState, draw: &Draw) -> bool {
    let Some(opponents) = &state.opponents else {
        return false;
    };
    opponents.iter().any(|o| o.discovered && o.technical_debt > 20) && draw.chance(pct(10))
}

fn rival_collapse_effect(state: &mut GameState, _: &Draw) {
    state.add(Resource::Doom, -2, Some("Rival Collapse"));
    state.add(Resource::Reputation, 1, Some("Rival Collapse"));
}

fn whistleblower_trigger(state: &GameState, draw: &Draw) -> bool {
    min_turn(state, 8) && min_resource(state, Resource::Doom, 40) && draw.chance(pct(8))
}

fn whistleblower_effect(state: &mut GameState, _: &Draw) {
    state.add(Resource::Reputation, -3, Some("Whistleblower Report"));
    state.add(Resource::Doom, -2, Some("Whistleblower Report"));
}

fn regulation_trigger(state: &GameState, draw: &Draw) -> bool {
    min_turn(state, 10) && draw.chance(pct(10))
}

fn regulation_effect(state: &mut GameState, _: &Draw) {
    state.add(Resource::Money, -20, Some("Regulation Proposal"));
    state.add(Resource::Doom, -3, Some("Regulation Proposal"));
}

fn infrastructure_offer_trigger(state: &GameState, draw: &Draw) -> bool {
    min_turn(state, 2) && draw.chance(pct(10))
}

fn infrastructure_offer_effect(state: &mut GameState, _: &Draw) {
    state.add(Resource::Money, -30, Some("Infrastructure Upgrade Offer"));
    state.add(Resource::Compute, 5, Some("Infrastructure Upgrade Offer"));
}

fn infrastructure_offer_reduced(state: &mut GameState, _: &Draw) {
    state.add(Resource::Money, -10, Some("Infrastructure Upgrade Offer (partial)"));
    state.add(Resource::Compute, 2, Some("Infrastructure Upgrade Offer (partial)"));
}

fn poaching_trigger(state: &GameState, draw: &Draw) -> bool {
    let Some(researchers) = &state.researchers else {
        return false;
    };
    !researchers.is_empty() && draw.chance(pct(10))
}

fn poaching_effect(state: &mut GameState, _: &Draw) {
    let Some(researchers) = state.researchers.as_mut() else {
        return;
    };
    // Least loyal researcher leaves.
    let mut leaving: Option<(usize, i64)> = None;
    for (i, r) in researchers.iter().enumerate() {
        if leaving.map_or(true, |(_, l)| r.loyalty < l) {
            leaving = Some((i, r.loyalty));
        }
    }
    if let Some((i, _)) = leaving {
        researchers.remove(i);
        state.add(Resource::Staff, -1, Some("Poaching Attempt"));
    }
}

fn poaching_counter_offer(state: &mut GameState, _: &Draw) {
    state.add(Resource::Money, -20, Some("Poaching Attempt counter-offer"));
}
