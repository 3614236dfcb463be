//! Integration tests for doom_runtime.
//!
//! A full game is driven through a session, exported, replayed and
//! compared.

use doom_engine::cascade::{CascadeResponse, PendingKind, SingleFailureResponse};
use doom_engine::events::EventAction;
use doom_engine::quality::ResearchQuality;
use doom_engine::EngineConfig;

use doom_runtime::commands::{CommandOutcome, PlayerCommand};
use doom_runtime::drift::{compare_states, verify_determinism};
use doom_runtime::replay;
use doom_runtime::session::Session;
use doom_runtime::snapshot;

use proptest::prelude::*;

/// Drive a session with a player that reacts to what the engine shows it.
fn play_session(seed: u64, turns: u32) -> Session {
    let mut session = Session::new("play", EngineConfig::with_seed(seed), 5).unwrap();
    session.apply(PlayerCommand::SetResearchQuality {
        quality: ResearchQuality::Rushed,
    });
    for turn in 0..turns {
        if turn % 3 == 0 {
            let created = session.apply(PlayerCommand::CreateResearchProject {
                name: format!("Project {}", turn),
                base_cost: 60,
                base_duration: 3,
                base_doom_reduction: 3,
                base_reputation_gain: 1,
            });
            assert!(matches!(
                created,
                CommandOutcome::ProjectCreated(_) | CommandOutcome::Rejected(_)
            ));
        }
        let ready: Vec<u64> = session
            .engine()
            .research()
            .active_projects()
            .iter()
            .filter(|p| p.ready_turn() <= session.state().turn)
            .map(|p| p.id)
            .collect();
        for project_id in ready {
            session.apply(PlayerCommand::CompleteResearchProject { project_id });
        }
        if turn % 4 == 1 {
            session.apply(PlayerCommand::ExecuteDebtReductionAction {
                action: "Code Review".to_string(),
            });
        }

        let popups: Vec<String> = session
            .engine()
            .pending_popup_events()
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        for name in popups {
            session.apply(PlayerCommand::HandlePopup {
                event: name,
                action: EventAction::Defer,
            });
        }

        let pending: Vec<(u64, bool)> = session
            .engine()
            .cascades()
            .pending_responses()
            .iter()
            .map(|p| (p.id, matches!(p.kind, PendingKind::Cascade { .. })))
            .collect();
        for (response_id, is_cascade) in pending {
            let command = if is_cascade {
                PlayerCommand::RespondToCascade {
                    response_id,
                    response: CascadeResponse::Systematic,
                }
            } else {
                PlayerCommand::RespondToFailure {
                    response_id,
                    response: SingleFailureResponse::Transparency,
                }
            };
            session.apply(command);
        }

        session.apply(PlayerCommand::EndTurn);
    }
    session
}

#[test]
fn exported_log_replays_to_same_hash() {
    let session = play_session(42, 40);
    let json = session.export_log().unwrap();
    let restored = Session::from_log_json("restored", &json, 0).unwrap();
    assert_eq!(restored.current_hash(), session.current_hash());
    assert_eq!(restored.state().messages, session.state().messages);
}

#[test]
fn two_sessions_with_same_seed_agree() {
    let a = play_session(7, 30);
    let b = play_session(7, 30);
    assert_eq!(a.current_hash(), b.current_hash());
    assert!(compare_states(a.engine(), b.engine()).is_identical());
}

#[test]
fn sessions_are_isolated() {
    let mut a = Session::new("a", EngineConfig::with_seed(1), 0).unwrap();
    let b = Session::new("b", EngineConfig::with_seed(1), 0).unwrap();
    a.apply(PlayerCommand::UpgradeIncidentResponse { cost: 25 });
    a.apply(PlayerCommand::EndTurn);
    assert_ne!(a.current_hash(), b.current_hash());
    assert_eq!(b.state().turn, 0);
    assert_eq!(b.commands().len(), 0);
}

#[test]
fn snapshots_match_replay_prefixes() {
    let session = play_session(3, 20);
    assert_eq!(session.snapshots().len(), 4);
    session.verify_snapshots().unwrap();

    let last = session.latest_snapshot().unwrap();
    let (engine, hash) = replay::rebuild_state(
        &EngineConfig::with_seed(3),
        &session.commands()[..last.command_index],
    )
    .unwrap();
    assert_eq!(hash, last.hash);
    assert_eq!(engine.state().turn, 20);
    assert!(snapshot::verify_snapshot_hash(last));
}

#[test]
fn determinism_check_over_full_log() {
    let session = play_session(11, 25);
    let json = session.export_log().unwrap();
    let log: doom_runtime::session::CommandLog = serde_json::from_str(&json).unwrap();
    let hash = verify_determinism(&log.config, &log.commands).unwrap();
    assert_eq!(hash, session.current_hash());
}

#[test]
fn drift_report_points_at_divergence() {
    let config = EngineConfig::with_seed(8);
    let base = vec![PlayerCommand::EndTurn; 3];
    let mut changed = base.clone();
    changed.push(PlayerCommand::ExecuteDebtReductionAction {
        action: "Code Review".to_string(),
    });
    let (a, _) = replay::rebuild_state(&config, &base).unwrap();
    let (b, _) = replay::rebuild_state(&config, &changed).unwrap();
    let report = compare_states(&a, &b);
    assert_eq!(report.turn_delta, 0);
    assert_eq!(report.first_divergent_message, Some(a.state().messages.len()));
    assert!(!report.is_identical());
}

#[test]
fn unknown_config_fields_are_rejected() {
    let json = r#"{"config":{"seed":1,"difficulty":"hard"},"commands":[]}"#;
    assert!(Session::from_log_json("bad", json, 0).is_err());
}

fn command_strategy() -> impl Strategy<Value = PlayerCommand> {
    prop_oneof![
        4 => Just(PlayerCommand::EndTurn),
        2 => Just(PlayerCommand::ExecuteDebtReductionAction {
            action: "Code Review".to_string(),
        }),
        1 => Just(PlayerCommand::ExecuteDebtReductionAction {
            action: "Safety Audit".to_string(),
        }),
        1 => (1i64..=4).prop_map(|d| PlayerCommand::CreateResearchProject {
            name: "Evals".to_string(),
            base_cost: 40,
            base_duration: d,
            base_doom_reduction: 3,
            base_reputation_gain: 1,
        }),
        1 => (1u64..=4).prop_map(|project_id| PlayerCommand::CompleteResearchProject { project_id }),
        1 => Just(PlayerCommand::TriggerFailure { failure_type: None }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_command_log_replays_deterministically(
        seed in any::<u64>(),
        commands in prop::collection::vec(command_strategy(), 0..40),
    ) {
        let config = EngineConfig::with_seed(seed);
        let hash = verify_determinism(&config, &commands).unwrap();

        let mut session = Session::new("prop", config, 0).unwrap();
        for command in commands {
            session.apply(command);
        }
        prop_assert_eq!(session.current_hash(), hash);
    }
}
