//! Player and host commands.
//!
//! A game is its seed, its config and the ordered list of commands applied
//! to it. Commands are plain serde data so a log can be exported, stored
//! and replayed.

use serde::{Deserialize, Serialize};

use doom_engine::cascade::{CascadeResponse, FailureOutcome, FailureType, SingleFailureResponse};
use doom_engine::domain::{EconomicCycle, Opponent, Researcher};
use doom_engine::events::EventAction;
use doom_engine::quality::ResearchQuality;
use doom_engine::research::{ProjectId, ProjectReport};
use doom_engine::{EndTurnReport, GameEngine, SimError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PlayerCommand {
    EndTurn,
    HandlePopup {
        event: String,
        action: EventAction,
    },
    HandleDeferred {
        event: String,
        action: EventAction,
    },
    RespondToFailure {
        response_id: u64,
        response: SingleFailureResponse,
    },
    RespondToCascade {
        response_id: u64,
        response: CascadeResponse,
    },
    UpgradeIncidentResponse {
        cost: i64,
    },
    UpgradeMonitoringSystems {
        cost: i64,
    },
    UpgradeCommunicationProtocols {
        cost: i64,
    },
    SetResearchQuality {
        quality: ResearchQuality,
    },
    CreateResearchProject {
        name: String,
        base_cost: i64,
        base_duration: i64,
        #[serde(default)]
        base_doom_reduction: i64,
        #[serde(default)]
        base_reputation_gain: i64,
    },
    CompleteResearchProject {
        project_id: ProjectId,
    },
    ExecuteDebtReductionAction {
        action: String,
    },
    TriggerFailure {
        #[serde(default)]
        failure_type: Option<FailureType>,
    },
    SetMilestone {
        flag: String,
    },
    GrantUpgrade {
        key: String,
    },
    AttachResearchers {
        researchers: Vec<Researcher>,
    },
    AttachOpponents {
        opponents: Vec<Opponent>,
    },
    AttachEconomicCycle {
        cycle: EconomicCycle,
    },
}

/// Result of applying one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    TurnEnded(EndTurnReport),
    Applied,
    ProjectCreated(ProjectId),
    ProjectCompleted(ProjectReport),
    DebtReduced(i64),
    UpgradeLevel(u32),
    CascadeContained(bool),
    Failure(FailureOutcome),
    /// The engine refused; the refusal is also in the message log.
    Rejected(SimError),
}

impl CommandOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, CommandOutcome::Rejected(_))
    }
}

fn outcome<T>(result: Result<T, SimError>, ok: impl FnOnce(T) -> CommandOutcome) -> CommandOutcome {
    match result {
        Ok(v) => ok(v),
        Err(e) => CommandOutcome::Rejected(e),
    }
}

impl PlayerCommand {
    pub fn label(&self) -> &'static str {
        match self {
            PlayerCommand::EndTurn => "end_turn",
            PlayerCommand::HandlePopup { .. } => "handle_popup",
            PlayerCommand::HandleDeferred { .. } => "handle_deferred",
            PlayerCommand::RespondToFailure { .. } => "respond_to_failure",
            PlayerCommand::RespondToCascade { .. } => "respond_to_cascade",
            PlayerCommand::UpgradeIncidentResponse { .. } => "upgrade_incident_response",
            PlayerCommand::UpgradeMonitoringSystems { .. } => "upgrade_monitoring_systems",
            PlayerCommand::UpgradeCommunicationProtocols { .. } => "upgrade_communication_protocols",
            PlayerCommand::SetResearchQuality { .. } => "set_research_quality",
            PlayerCommand::CreateResearchProject { .. } => "create_research_project",
            PlayerCommand::CompleteResearchProject { .. } => "complete_research_project",
            PlayerCommand::ExecuteDebtReductionAction { .. } => "execute_debt_reduction_action",
            PlayerCommand::TriggerFailure { .. } => "trigger_failure",
            PlayerCommand::SetMilestone { .. } => "set_milestone",
            PlayerCommand::GrantUpgrade { .. } => "grant_upgrade",
            PlayerCommand::AttachResearchers { .. } => "attach_researchers",
            PlayerCommand::AttachOpponents { .. } => "attach_opponents",
            PlayerCommand::AttachEconomicCycle { .. } => "attach_economic_cycle",
        }
    }

    /// Dispatch to the matching engine operation.
    pub fn apply(&self, engine: &mut GameEngine) -> CommandOutcome {
        match self {
            PlayerCommand::EndTurn => CommandOutcome::TurnEnded(engine.end_turn()),
            PlayerCommand::HandlePopup { event, action } => {
                outcome(engine.handle_popup_event_action(event, *action), |_| CommandOutcome::Applied)
            }
            PlayerCommand::HandleDeferred { event, action } => {
                outcome(engine.handle_deferred_event_action(event, *action), |_| CommandOutcome::Applied)
            }
            PlayerCommand::RespondToFailure { response_id, response } => outcome(
                engine.respond_to_failure(*response_id, *response),
                |_| CommandOutcome::Applied,
            ),
            PlayerCommand::RespondToCascade { response_id, response } => outcome(
                engine.respond_to_cascade(*response_id, *response),
                CommandOutcome::CascadeContained,
            ),
            PlayerCommand::UpgradeIncidentResponse { cost } => {
                outcome(engine.upgrade_incident_response(*cost), CommandOutcome::UpgradeLevel)
            }
            PlayerCommand::UpgradeMonitoringSystems { cost } => {
                outcome(engine.upgrade_monitoring_systems(*cost), CommandOutcome::UpgradeLevel)
            }
            PlayerCommand::UpgradeCommunicationProtocols { cost } => {
                outcome(engine.upgrade_communication_protocols(*cost), CommandOutcome::UpgradeLevel)
            }
            PlayerCommand::SetResearchQuality { quality } => {
                engine.set_research_quality(*quality);
                CommandOutcome::Applied
            }
            PlayerCommand::CreateResearchProject {
                name,
                base_cost,
                base_duration,
                base_doom_reduction,
                base_reputation_gain,
            } => {
                let created = engine
                    .create_research_project(name, *base_cost, *base_duration)
                    .and_then(|id| {
                        engine
                            .set_project_impact(id, *base_doom_reduction, *base_reputation_gain)
                            .map(|_| id)
                    });
                outcome(created, CommandOutcome::ProjectCreated)
            }
            PlayerCommand::CompleteResearchProject { project_id } => outcome(
                engine.complete_research_project(*project_id),
                CommandOutcome::ProjectCompleted,
            ),
            PlayerCommand::ExecuteDebtReductionAction { action } => {
                outcome(engine.execute_debt_reduction_action(action), CommandOutcome::DebtReduced)
            }
            PlayerCommand::TriggerFailure { failure_type } => {
                CommandOutcome::Failure(engine.trigger_failure(*failure_type))
            }
            PlayerCommand::SetMilestone { flag } => {
                engine.set_milestone(flag);
                CommandOutcome::Applied
            }
            PlayerCommand::GrantUpgrade { key } => {
                engine.grant_upgrade(key);
                CommandOutcome::Applied
            }
            PlayerCommand::AttachResearchers { researchers } => {
                engine.attach_researchers(researchers.clone());
                CommandOutcome::Applied
            }
            PlayerCommand::AttachOpponents { opponents } => {
                engine.attach_opponents(opponents.clone());
                CommandOutcome::Applied
            }
            PlayerCommand::AttachEconomicCycle { cycle } => {
                engine.attach_economic_cycle(*cycle);
                CommandOutcome::Applied
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doom_engine::EngineConfig;

    #[test]
    fn commands_use_tagged_json() {
        let cmd = PlayerCommand::HandlePopup {
            event: "Whistleblower Report".to_string(),
            action: EventAction::Dismiss,
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert_eq!(
            json,
            r#"{"command":"handle_popup","event":"Whistleblower Report","action":"dismiss"}"#
        );
        let back: PlayerCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cmd);
    }

    #[test]
    fn optional_fields_default() {
        let cmd: PlayerCommand = serde_json::from_str(
            r#"{"command":"create_research_project","name":"Evals","base_cost":50,"base_duration":4}"#,
        )
        .unwrap();
        assert_eq!(
            cmd,
            PlayerCommand::CreateResearchProject {
                name: "Evals".to_string(),
                base_cost: 50,
                base_duration: 4,
                base_doom_reduction: 0,
                base_reputation_gain: 0,
            }
        );
        let cmd: PlayerCommand = serde_json::from_str(r#"{"command":"trigger_failure"}"#).unwrap();
        assert_eq!(cmd, PlayerCommand::TriggerFailure { failure_type: None });
    }

    #[test]
    fn rejected_commands_report_the_error() {
        let mut engine = GameEngine::new(EngineConfig::default()).unwrap();
        let out = PlayerCommand::CompleteResearchProject { project_id: 99 }.apply(&mut engine);
        assert_eq!(out, CommandOutcome::Rejected(SimError::ProjectNotFound(99)));
        assert!(out.is_rejected());
    }

    #[test]
    fn create_then_complete() {
        let mut engine = GameEngine::new(EngineConfig::default()).unwrap();
        let created = PlayerCommand::CreateResearchProject {
            name: "Evals".to_string(),
            base_cost: 50,
            base_duration: 4,
            base_doom_reduction: 5,
            base_reputation_gain: 1,
        }
        .apply(&mut engine);
        let CommandOutcome::ProjectCreated(id) = created else {
            panic!("expected a project id, got {:?}", created);
        };
        assert_eq!(engine.state().resources.money, 250);

        let early = PlayerCommand::CompleteResearchProject { project_id: id }.apply(&mut engine);
        assert_eq!(
            early,
            CommandOutcome::Rejected(SimError::ProjectInProgress { id, turns_left: 4 })
        );
        for _ in 0..4 {
            PlayerCommand::EndTurn.apply(&mut engine);
        }
        let done = PlayerCommand::CompleteResearchProject { project_id: id }.apply(&mut engine);
        assert!(matches!(done, CommandOutcome::ProjectCompleted(_)));
    }

    #[test]
    fn unaffordable_project_is_rejected() {
        let mut engine = GameEngine::new(EngineConfig::default()).unwrap();
        let out = PlayerCommand::CreateResearchProject {
            name: "Moonshot".to_string(),
            base_cost: 1_000,
            base_duration: 10,
            base_doom_reduction: 20,
            base_reputation_gain: 5,
        }
        .apply(&mut engine);
        assert_eq!(out, CommandOutcome::Rejected(SimError::money(1_000, 300)));
        assert!(engine.research().active_projects().is_empty());
    }
}
