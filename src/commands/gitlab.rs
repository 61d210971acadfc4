use clap::{Args, Subcommand};
use serde::Serialize;

use lizzy::gitlab::{
    self, BranchRemoval, GitlabClient, GitlabSettings, ImageUpdate, ImageUpdateResult, MergeDirection,
    MergeRequestCreated, MergeReview,
};
use lizzy::{BulkResult, Error};

use super::{CmdResult, GlobalArgs};
use crate::tty;

#[derive(Args)]
pub struct GitlabArgs {
    #[command(subcommand)]
    command: GitlabCommand,
}

#[derive(Subcommand)]
enum GitlabCommand {
    /// Open a develop -> main merge request for every configured component
    DevelopToMain,
    /// Open a main -> develop merge request for every configured component
    MainToDevelop,
    /// Delete merged branches across the approval group's projects
    RemoveMergedBranches,
    /// Merge your open merge requests that passed CI and were approved by someone else
    MergeApproved {
        /// Merge without asking for each request
        #[arg(long)]
        yolo: bool,
    },
    /// Point a component's image_version at a new tag and commit it
    UpdateImageOfContainer {
        /// Component name from gitlab.components (asked when omitted)
        #[arg(long)]
        component: Option<String>,
        /// Environment from gitlab.environments (asked when omitted)
        #[arg(long)]
        environment: Option<String>,
        /// Image tag location name, when the component has several
        #[arg(long)]
        location: Option<String>,
        /// New image tag (asked when omitted)
        #[arg(long)]
        tag: Option<String>,
        /// Commit even when the file has no image_version assignment
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum GitlabOutput {
    MergeRequests(BulkResult<MergeRequestCreated>),
    Branches(BulkResult<BranchRemoval>),
    Merges(BulkResult<MergeReview>),
    ImageUpdate(ImageUpdateResult),
}

pub fn run(args: GitlabArgs, global: &GlobalArgs) -> CmdResult<GitlabOutput> {
    let settings = GitlabSettings::from_settings(&global.settings)?;
    let client = GitlabClient::new(&global.transport, &settings);

    match args.command {
        GitlabCommand::DevelopToMain => merge_requests(&client, MergeDirection::DevelopToMain),
        GitlabCommand::MainToDevelop => merge_requests(&client, MergeDirection::MainToDevelop),
        GitlabCommand::RemoveMergedBranches => {
            let bulk = gitlab::remove_merged_branches(&client)?;
            let exit_code = bulk.exit_code();
            Ok((GitlabOutput::Branches(bulk), exit_code))
        }
        GitlabCommand::MergeApproved { yolo } => merge_approved(&client, yolo),
        GitlabCommand::UpdateImageOfContainer {
            component,
            environment,
            location,
            tag,
            force,
        } => update_image(&client, &settings, component, environment, location, tag, force),
    }
}

fn merge_requests(client: &GitlabClient, direction: MergeDirection) -> CmdResult<GitlabOutput> {
    let bulk = gitlab::create_merge_requests(client, direction)?;
    let exit_code = bulk.exit_code();
    Ok((GitlabOutput::MergeRequests(bulk), exit_code))
}

fn merge_approved(client: &GitlabClient, yolo: bool) -> CmdResult<GitlabOutput> {
    if !yolo && !tty::is_stdin_tty() {
        return Err(Error::validation_missing_argument(vec!["--yolo".to_string()])
            .with_hint("Each merge is confirmed on the terminal; pass --yolo to merge without asking"));
    }

    let bulk = gitlab::merge_approved(client, &|request, approver| {
        if yolo {
            return Ok(true);
        }
        if let Some(url) = &request.web_url {
            eprintln!("{}", url);
        }
        tty::confirm(
            &format!("Merge '{}' in {} (approved by {})?", request.title, request.project, approver),
            false,
        )
    })?;
    let exit_code = bulk.exit_code();
    Ok((GitlabOutput::Merges(bulk), exit_code))
}

fn update_image(
    client: &GitlabClient,
    settings: &GitlabSettings,
    component: Option<String>,
    environment: Option<String>,
    location: Option<String>,
    tag: Option<String>,
    force: bool,
) -> CmdResult<GitlabOutput> {
    if settings.components.is_empty() {
        return Err(Error::config_missing_key("gitlab.components", None));
    }
    if settings.environments.is_empty() {
        return Err(Error::config_missing_key("gitlab.environments", None));
    }

    let names: Vec<String> = settings.components.iter().map(|c| c.name.clone()).collect();
    let component = &settings.components[pick("component", &names, component)?];
    let environment = &settings.environments[pick("environment", &settings.environments, environment)?];
    let location = gitlab::choose_location(component, |names| pick("location", names, location))?;
    let tag = match tag {
        Some(tag) => tag,
        None => ask_tag()?,
    };

    let update = ImageUpdate {
        component,
        location,
        environment,
        tag: &tag,
    };
    let result = gitlab::update_image(client, &update, &|path, preview| {
        eprintln!("Pattern 'image_version = \"...\"' not found in {}", path);
        eprintln!("{}", preview);
        if force {
            return Ok(true);
        }
        if !tty::is_stdin_tty() {
            return Ok(false);
        }
        tty::confirm("Do you want to continue anyway?", false)
    })?;

    Ok((GitlabOutput::ImageUpdate(result), 0))
}

/// Index of `given` in `options`, or a terminal choice when it was omitted.
fn pick(field: &str, options: &[String], given: Option<String>) -> lizzy::Result<usize> {
    if let Some(given) = given {
        return options.iter().position(|o| *o == given).ok_or_else(|| {
            Error::validation_invalid_argument(field, format!("Unknown {}", field), Some(given), Some(options.to_vec()))
        });
    }
    if !tty::is_stdin_tty() {
        return Err(Error::validation_missing_argument(vec![format!("--{}", field)])
            .with_hint(format!("Choose one of: {}", options.join(", "))));
    }
    tty::select(&format!("Select the {}:", field), options)
}

fn ask_tag() -> lizzy::Result<String> {
    if !tty::is_stdin_tty() {
        return Err(Error::validation_missing_argument(vec!["--tag".to_string()]));
    }
    let tag = tty::prompt("Enter the new image tag (e.g. 1.4.2): ")?;
    if tag.is_empty() {
        return Err(Error::validation_invalid_argument("tag", "Tag cannot be empty", None, None));
    }
    Ok(tag)
}
