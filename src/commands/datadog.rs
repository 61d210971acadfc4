use clap::{Args, Subcommand};
use serde::Serialize;

use lizzy::datadog::{self, EcrRepository};
use lizzy::log_status;

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct DatadogArgs {
    #[command(subcommand)]
    command: DatadogCommand,
}

#[derive(Subcommand)]
enum DatadogCommand {
    /// List released agent versions, oldest first
    FetchVersions,
    /// Show the newest released agent version
    FetchVersionLatest,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatadogOutput {
    command: String,
    repository: EcrRepository,
    #[serde(skip_serializing_if = "Option::is_none")]
    versions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    latest: Option<String>,
}

pub fn run(args: DatadogArgs, global: &GlobalArgs) -> CmdResult<DatadogOutput> {
    let repository = EcrRepository::from_settings(&global.settings);

    match args.command {
        DatadogCommand::FetchVersions => {
            let versions = datadog::fetch_versions(&global.transport, &repository)?;
            log_status!("datadog", "Found {} versions", versions.len());
            Ok((
                DatadogOutput {
                    command: "datadog.fetch_versions".to_string(),
                    repository,
                    versions: Some(versions),
                    latest: None,
                },
                0,
            ))
        }
        DatadogCommand::FetchVersionLatest => {
            let latest = datadog::latest_version(&global.transport, &repository)?;
            Ok((
                DatadogOutput {
                    command: "datadog.fetch_version_latest".to_string(),
                    repository,
                    versions: None,
                    latest,
                },
                0,
            ))
        }
    }
}
