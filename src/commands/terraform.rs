use clap::{Args, Subcommand};
use serde::Serialize;

use lizzy::error::Warning;
use lizzy::log_status;
use lizzy::terraform::{
    self, CancelReport, DiscardSummary, RunTarget, TerraformClient, TerraformSettings, Workspace,
};

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct TerraformArgs {
    #[command(subcommand)]
    command: TerraformCommand,
}

#[derive(Subcommand)]
enum TerraformCommand {
    /// Discard or cancel every active run in the organization
    DiscardPlans,
    /// List every workspace in the organization
    Workspaces,
    /// List active runs across all workspaces without touching them
    Runs,
    /// Add a Slack notification configuration to every workspace
    SetSlackWebhook,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerraformOutput {
    command: String,
    organization: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    workspaces: Option<Vec<Workspace>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    runs: Option<Vec<RunTarget>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<DiscardSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    slack: Option<lizzy::BulkResult<terraform::SlackOutcome>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<Warning>,
}

impl TerraformOutput {
    fn new(command: &str, settings: &TerraformSettings) -> Self {
        Self {
            command: command.to_string(),
            organization: settings.organization.clone(),
            workspaces: None,
            runs: None,
            summary: None,
            slack: None,
            warnings: Vec::new(),
        }
    }
}

pub fn run(args: TerraformArgs, global: &GlobalArgs) -> CmdResult<TerraformOutput> {
    let settings = TerraformSettings::from_settings(&global.settings)?;
    let client = TerraformClient::new(&global.transport, &settings);

    match args.command {
        TerraformCommand::DiscardPlans => discard_plans(&client, &settings),
        TerraformCommand::Workspaces => workspaces(&client, &settings),
        TerraformCommand::Runs => runs(&client, &settings),
        TerraformCommand::SetSlackWebhook => set_slack_webhook(&client, &settings),
    }
}

/// Glyph lines are the operator-facing report, so they bypass the TTY check.
fn print_report(report: &CancelReport) {
    for line in report.lines() {
        eprintln!("{}", line);
    }
}

fn discard_plans(client: &TerraformClient, settings: &TerraformSettings) -> CmdResult<TerraformOutput> {
    let outcome = terraform::discard_plans(client, &print_report)?;

    log_status!(
        "terraform",
        "{} runs: {} succeeded, {} already terminal, {} failed",
        outcome.summary.total,
        outcome.summary.succeeded,
        outcome.summary.already_terminal,
        outcome.summary.failed
    );

    let exit_code = if outcome.summary.has_failures() {
        lizzy::error::REMOTE_FAILURE_EXIT_CODE
    } else {
        0
    };

    let mut output = TerraformOutput::new("terraform.discard_plans", settings);
    output.summary = Some(outcome.summary);
    output.warnings = outcome.warnings;
    Ok((output, exit_code))
}

fn workspaces(client: &TerraformClient, settings: &TerraformSettings) -> CmdResult<TerraformOutput> {
    let listing = terraform::list_workspaces(client)?;

    let mut output = TerraformOutput::new("terraform.workspaces", settings);
    output.workspaces = Some(listing.items);
    output.warnings = listing.warnings.into_iter().map(Warning::from).collect();
    Ok((output, 0))
}

fn runs(client: &TerraformClient, settings: &TerraformSettings) -> CmdResult<TerraformOutput> {
    let listing = terraform::collect_targets(client)?;
    log_status!("terraform", "Found {} active runs", listing.items.len());

    let mut output = TerraformOutput::new("terraform.runs", settings);
    output.runs = Some(listing.items);
    output.warnings = listing.warnings.into_iter().map(Warning::from).collect();
    Ok((output, 0))
}

fn set_slack_webhook(
    client: &TerraformClient,
    settings: &TerraformSettings,
) -> CmdResult<TerraformOutput> {
    let bulk = terraform::ensure_slack_notifications(client)?;
    let exit_code = bulk.exit_code();

    let mut output = TerraformOutput::new("terraform.set_slack_webhook", settings);
    output.slack = Some(bulk);
    Ok((output, exit_code))
}
