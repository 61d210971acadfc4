use clap::{Parser, Subcommand};

mod commands;
mod output;
mod tty;

use commands::{config, datadog, github, gitlab, terraform, workflows};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "lizzy")]
#[command(version = VERSION)]
#[command(about = "Operations CLI for Terraform Cloud, GitLab and release housekeeping")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Terraform Cloud run and workspace operations
    Terraform(terraform::TerraformArgs),
    /// Inspect and edit ~/.lizzy/config.json
    Config(config::ConfigArgs),
    /// Datadog agent image versions
    Datadog(datadog::DatadogArgs),
    /// GitHub repository tags
    Github(github::GithubArgs),
    /// GitLab merge request and branch automation
    Gitlab(gitlab::GitlabArgs),
    /// Create, list and run ad hoc workflows
    #[command(visible_alias = "workflow")]
    Workflows(workflows::WorkflowsArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let (json_result, exit_code) = commands::run_json(cli.command);

    if let Err(err) = output::print_json_result(json_result) {
        eprintln!("{}", err.message);
        return std::process::ExitCode::from(exit_code_to_u8(1));
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
