use clap::{Args, Subcommand};
use serde::Serialize;

use lizzy::workflow::{self, CreatedWorkflow, StepDriver, WorkflowEntry, WorkflowRun, WorkflowStep};
use lizzy::{paths, Error};

use super::CmdResult;
use crate::tty;

#[derive(Args)]
pub struct WorkflowsArgs {
    #[command(subcommand)]
    command: WorkflowsCommand,
}

#[derive(Subcommand)]
enum WorkflowsCommand {
    /// Create a workflow file from a template
    Create {
        /// Workflow name (file name without .json)
        name: String,
        /// Short description stored in the file
        #[arg(long, default_value = "")]
        description: String,
        /// Overwrite an existing workflow
        #[arg(long)]
        force: bool,
    },
    /// List workflow files
    List,
    /// Run a workflow step by step
    Run {
        /// Workflow name; prompts for one when omitted
        name: Option<String>,
        /// Run every step without asking; stop at the first failure
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum WorkflowsOutput {
    Created(CreatedWorkflow),
    Listed { workflows: Vec<WorkflowEntry> },
    Ran(WorkflowRun),
}

pub fn run(args: WorkflowsArgs) -> CmdResult<WorkflowsOutput> {
    let dir = paths::workflows()?;

    match args.command {
        WorkflowsCommand::Create {
            name,
            description,
            force,
        } => {
            let created = workflow::create(&dir, &name, &description, force)?;
            Ok((WorkflowsOutput::Created(created), 0))
        }
        WorkflowsCommand::List => {
            let workflows = workflow::list(&dir)?;
            Ok((WorkflowsOutput::Listed { workflows }, 0))
        }
        WorkflowsCommand::Run { name, yes } => {
            let name = match name {
                Some(name) => name,
                None => choose_workflow(&dir)?,
            };
            let definition = workflow::load(&dir, &name)?;
            let result = workflow::run(&definition, &TtyStepDriver { assume_yes: yes })?;
            let exit_code = if result.has_failures() {
                lizzy::error::REMOTE_FAILURE_EXIT_CODE
            } else {
                0
            };
            Ok((WorkflowsOutput::Ran(result), exit_code))
        }
    }
}

fn choose_workflow(dir: &std::path::Path) -> lizzy::Result<String> {
    let names = workflow::available_names(dir)?;
    if names.is_empty() {
        return Err(Error::validation_missing_argument(vec!["name".to_string()])
            .with_hint("Create one with 'lizzy workflows create <name>'"));
    }
    if !tty::is_stdin_tty() {
        return Err(Error::validation_missing_argument(vec!["name".to_string()])
            .with_hint(format!("Available workflows: {}", names.join(", "))));
    }

    let index = tty::select("Available workflows:", &names)?;
    Ok(names[index].clone())
}

/// Asks on the terminal before each step unless `assume_yes`.
struct TtyStepDriver {
    assume_yes: bool,
}

impl StepDriver for TtyStepDriver {
    fn confirm_step(&self, number: usize, step: &WorkflowStep) -> lizzy::Result<bool> {
        eprintln!("Step {}: {}", number, step.name);
        if let Some(description) = &step.description {
            eprintln!("  {}", description);
        }
        if let Some(command) = &step.command {
            eprintln!("  $ {}", command);
        }

        if self.assume_yes {
            return Ok(true);
        }
        tty::confirm("Run this step?", true)
    }

    fn continue_after_failure(&self, number: usize, exit_code: i32) -> lizzy::Result<bool> {
        eprintln!("Step {} failed with exit code {}", number, exit_code);
        if self.assume_yes {
            return Ok(false);
        }
        tty::confirm("Continue with the next step?", false)
    }
}
