use serde::Serialize;

use super::{RunTarget, TerraformClient, PLANNED_STATUS};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunAction {
    Discard,
    Cancel,
}

impl RunAction {
    fn path(&self) -> &'static str {
        match self {
            RunAction::Discard => "discard",
            RunAction::Cancel => "cancel",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum CancelOutcome {
    /// `accepted` is true for 202: the platform queued the action.
    Success { action: RunAction, accepted: bool },
    AlreadyTerminal { link: String },
    Failed { code: u16, link: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelReport {
    pub run_id: String,
    pub workspace_name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discard_failure: Option<u16>,
    #[serde(flatten)]
    pub outcome: CancelOutcome,
}

impl CancelReport {
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, CancelOutcome::Failed { .. })
    }

    /// Operator-facing lines, in the order the actions happened.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();

        if let Some(code) = self.discard_failure {
            lines.push(format!(
                "⚠️  Failed to discard run {}: {}. Attempting to cancel...",
                self.run_id, code
            ));
        }

        lines.push(match &self.outcome {
            CancelOutcome::Success {
                action: RunAction::Discard,
                accepted: false,
            } => format!(
                "✅ Successfully discarded run {} (Status: {})",
                self.run_id, self.status
            ),
            CancelOutcome::Success {
                action: RunAction::Discard,
                accepted: true,
            } => format!(
                "✅ Discard initiated for run {} (Status: {})",
                self.run_id, self.status
            ),
            CancelOutcome::Success {
                action: RunAction::Cancel,
                accepted: false,
            } => format!(
                "✅ Successfully cancelled run {} (Status: {})",
                self.run_id, self.status
            ),
            CancelOutcome::Success {
                action: RunAction::Cancel,
                accepted: true,
            } => format!(
                "✅ Cancel initiated for run {} (Status: {})",
                self.run_id, self.status
            ),
            CancelOutcome::AlreadyTerminal { link } => format!(
                "⚠️  Run {} cannot be cancelled in current state (Status: {}). Inspect: {}",
                self.run_id, self.status, link
            ),
            CancelOutcome::Failed { code, link } => format!(
                "❌ Failed to cancel run {} (Status: {}): HTTP {}. Inspect: {}",
                self.run_id, self.status, code, link
            ),
        });

        lines
    }
}

/// Move one run out of the active set.
///
/// Planned runs are discarded first and only cancelled when the discard is
/// refused. HTTP outcomes are reported, never raised; transport failures
/// propagate.
pub fn cancel_run(client: &TerraformClient, target: &RunTarget) -> Result<CancelReport> {
    let mut discard_failure = None;

    if target.status == PLANNED_STATUS {
        let url = client.run_action_url(&target.run_id, RunAction::Discard.path());
        let response = client.post_action(&url)?;
        match response.status {
            200 | 202 => {
                return Ok(report(
                    target,
                    None,
                    CancelOutcome::Success {
                        action: RunAction::Discard,
                        accepted: response.status == 202,
                    },
                ))
            }
            code => discard_failure = Some(code),
        }
    }

    let url = client.run_action_url(&target.run_id, RunAction::Cancel.path());
    let response = client.post_action(&url)?;
    let outcome = match response.status {
        200 | 202 => CancelOutcome::Success {
            action: RunAction::Cancel,
            accepted: response.status == 202,
        },
        409 => CancelOutcome::AlreadyTerminal {
            link: client.run_link(&target.workspace_name, &target.run_id),
        },
        code => CancelOutcome::Failed {
            code,
            link: client.run_link(&target.workspace_name, &target.run_id),
        },
    };

    Ok(report(target, discard_failure, outcome))
}

fn report(target: &RunTarget, discard_failure: Option<u16>, outcome: CancelOutcome) -> CancelReport {
    CancelReport {
        run_id: target.run_id.clone(),
        workspace_name: target.workspace_name.clone(),
        status: target.status.clone(),
        discard_failure,
        outcome,
    }
}
