//! Ad hoc workflows: named lists of shell steps stored as JSON files.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{Error, Result};
use crate::json;

const EXTENSION: &str = "json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
}

impl Workflow {
    /// New workflow with a single placeholder step.
    pub fn template(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            created_at: Some(chrono::Local::now().to_rfc3339()),
            steps: vec![WorkflowStep {
                name: "example_step".to_string(),
                command: Some("echo 'Hello from workflow'".to_string()),
                description: Some("Example step - replace with your commands".to_string()),
            }],
        }
    }
}

fn validate_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(Error::validation_invalid_argument(
            "name",
            "Workflow names must be non-empty file names without path separators",
            Some(name.to_string()),
            None,
        ));
    }
    Ok(name)
}

fn workflow_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.{}", name, EXTENSION))
}

fn io_error(e: std::io::Error, context: String) -> Error {
    Error::internal_io(e.to_string(), Some(context))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedWorkflow {
    pub name: String,
    pub path: String,
    pub overwritten: bool,
}

/// Write a template workflow. Existing files are kept unless `force`.
pub fn create(dir: &Path, name: &str, description: &str, force: bool) -> Result<CreatedWorkflow> {
    let name = validate_name(name)?;
    let path = workflow_path(dir, name);
    let exists = path.exists();

    if exists && !force {
        return Err(Error::validation_invalid_argument(
            "name",
            format!("Workflow '{}' already exists", name),
            Some(name.to_string()),
            None,
        )
        .with_hint("Pass --force to overwrite it"));
    }

    fs::create_dir_all(dir).map_err(|e| io_error(e, format!("create {}", dir.display())))?;
    let content = json::to_string_pretty(&Workflow::template(name, description))?;
    fs::write(&path, content).map_err(|e| io_error(e, format!("write {}", path.display())))?;

    log_status!("workflow", "Workflow '{}' created at {}", name, path.display());

    Ok(CreatedWorkflow {
        name: name.to_string(),
        path: path.display().to_string(),
        overwritten: exists,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum WorkflowEntry {
    Valid {
        name: String,
        description: String,
        created_at: Option<String>,
        steps: usize,
        path: String,
    },
    Invalid {
        file: String,
        path: String,
        error: String,
    },
}

fn workflow_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| io_error(e, format!("read {}", dir.display())))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == EXTENSION))
        .collect();
    files.sort();
    Ok(files)
}

fn read_workflow(path: &Path) -> Result<Workflow> {
    let content =
        fs::read_to_string(path).map_err(|e| io_error(e, format!("read {}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| Error::validation_invalid_json(e, Some(path.display().to_string())))
}

/// Every workflow file, sorted by file name. Unreadable files are listed as invalid.
pub fn list(dir: &Path) -> Result<Vec<WorkflowEntry>> {
    Ok(workflow_files(dir)?
        .into_iter()
        .map(|path| {
            let file = path
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_default();
            match read_workflow(&path) {
                Ok(workflow) => WorkflowEntry::Valid {
                    name: workflow.name,
                    description: workflow.description,
                    created_at: workflow.created_at,
                    steps: workflow.steps.len(),
                    path: path.display().to_string(),
                },
                Err(err) => WorkflowEntry::Invalid {
                    file,
                    path: path.display().to_string(),
                    error: err
                        .details
                        .get("error")
                        .and_then(|e| e.as_str())
                        .unwrap_or(err.message.as_str())
                        .to_string(),
                },
            }
        })
        .collect())
}

/// Workflow names (file stems), sorted.
pub fn available_names(dir: &Path) -> Result<Vec<String>> {
    Ok(workflow_files(dir)?
        .iter()
        .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().to_string()))
        .collect())
}

pub fn load(dir: &Path, name: &str) -> Result<Workflow> {
    let name = validate_name(name)?;
    let path = workflow_path(dir, name);
    if !path.exists() {
        return Err(Error::workflow_not_found(name));
    }
    read_workflow(&path)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum StepOutcome {
    Succeeded,
    Failed { exit_code: i32 },
    Declined,
    NoCommand,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub number: usize,
    pub name: String,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    pub name: String,
    pub steps: Vec<StepReport>,
    /// False when a failed step stopped the run.
    pub completed: bool,
}

impl WorkflowRun {
    pub fn has_failures(&self) -> bool {
        self.steps
            .iter()
            .any(|s| matches!(s.outcome, StepOutcome::Failed { .. }))
    }
}

/// Decisions taken while a workflow runs.
pub trait StepDriver {
    fn confirm_step(&self, number: usize, step: &WorkflowStep) -> Result<bool>;

    fn continue_after_failure(&self, number: usize, exit_code: i32) -> Result<bool>;

    fn execute(&self, command: &str) -> Result<i32> {
        run_shell(command)
    }
}

/// Run a command through `sh -c`. Its stdout goes to our stderr so the
/// JSON envelope on stdout stays clean.
pub fn run_shell(command: &str) -> Result<i32> {
    let status = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdout(Stdio::from(std::io::stderr()))
        .status()
        .map_err(|e| io_error(e, format!("run '{}'", command)))?;

    // Killed by a signal: no code.
    Ok(status.code().unwrap_or(-1))
}

pub fn run(workflow: &Workflow, driver: &dyn StepDriver) -> Result<WorkflowRun> {
    log_status!("workflow", "Running workflow: {}", workflow.name);
    let mut steps = Vec::with_capacity(workflow.steps.len());
    let mut completed = true;

    for (index, step) in workflow.steps.iter().enumerate() {
        let number = index + 1;
        let command = step.command.as_deref().map(str::trim).unwrap_or_default();

        let outcome = if command.is_empty() {
            log_status!("workflow", "Step {} has no command", number);
            StepOutcome::NoCommand
        } else if !driver.confirm_step(number, step)? {
            StepOutcome::Declined
        } else {
            match driver.execute(command)? {
                0 => StepOutcome::Succeeded,
                exit_code => StepOutcome::Failed { exit_code },
            }
        };

        let stop = match &outcome {
            StepOutcome::Failed { exit_code } => !driver.continue_after_failure(number, *exit_code)?,
            _ => false,
        };

        steps.push(StepReport {
            number,
            name: step.name.clone(),
            outcome,
        });

        if stop {
            completed = false;
            break;
        }
    }

    Ok(WorkflowRun {
        name: workflow.name.clone(),
        steps,
        completed,
    })
}
