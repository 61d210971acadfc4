use clap::{Args, Subcommand};
use serde::Serialize;

use lizzy::error::Warning;
use lizzy::github;

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct GithubArgs {
    #[command(subcommand)]
    command: GithubCommand,
}

#[derive(Subcommand)]
enum GithubCommand {
    /// List tags of a repository
    Tags {
        /// Repository as <owner>/<name>
        repo: String,
        /// Walk every page instead of only the first
        #[arg(long)]
        all: bool,
    },
    /// Show the newest tag of a repository without its leading "v"
    LatestTag {
        /// Repository as <owner>/<name>
        repo: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GithubOutput {
    command: String,
    repo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    latest: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<Warning>,
}

pub fn run(args: GithubArgs, global: &GlobalArgs) -> CmdResult<GithubOutput> {
    match args.command {
        GithubCommand::Tags { repo, all } => {
            let tags = github::list_tags(&global.transport, &repo, all)?;
            Ok((
                GithubOutput {
                    command: "github.tags".to_string(),
                    repo,
                    tags: Some(tags.items),
                    latest: None,
                    warnings: tags.warnings.into_iter().map(Warning::from).collect(),
                },
                0,
            ))
        }
        GithubCommand::LatestTag { repo } => {
            let latest = github::latest_tag(&global.transport, &repo)?;
            Ok((
                GithubOutput {
                    command: "github.latest_tag".to_string(),
                    repo,
                    tags: None,
                    latest,
                    warnings: Vec::new(),
                },
                0,
            ))
        }
    }
}
