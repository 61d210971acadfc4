//! Bumping the `image_version` of a component in its deployment Terraform.

use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::{GitlabClient, GitlabComponent};
use crate::error::{Error, Result};
use crate::http::{ensure_success, HttpRequest};

const ENV_PLACEHOLDER: &str = "{env}";
const PREVIEW_LINES: usize = 20;
const LISTED_TF_FILES: usize = 20;

/// A file holding a component's image tag; `path` may contain `{env}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ImageTagLocation {
    pub name: String,
    pub path: String,
}

impl ImageTagLocation {
    pub fn path_for(&self, environment: &str) -> String {
        self.path.replace(ENV_PLACEHOLDER, environment)
    }
}

pub struct ImageUpdate<'a> {
    pub component: &'a GitlabComponent,
    pub location: &'a ImageTagLocation,
    pub environment: &'a str,
    pub tag: &'a str,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ImageUpdateOutcome {
    Committed {
        #[serde(rename = "commitId", skip_serializing_if = "Option::is_none")]
        commit_id: Option<String>,
        #[serde(rename = "webUrl", skip_serializing_if = "Option::is_none")]
        web_url: Option<String>,
    },
    Cancelled,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageUpdateResult {
    pub component: String,
    pub environment: String,
    pub path: String,
    pub branch: String,
    pub tag: String,
    pub commit_message: String,
    #[serde(flatten)]
    pub outcome: ImageUpdateOutcome,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
}

#[derive(Debug, Deserialize)]
struct CommitRecord {
    id: Option<String>,
    web_url: Option<String>,
}

fn image_version_pattern() -> Result<&'static Regex> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    if let Some(re) = PATTERN.get() {
        return Ok(re);
    }
    let re = Regex::new(r#"image_version\s*=\s*".*""#)
        .map_err(|e| Error::internal_unexpected(format!("image_version pattern: {}", e)))?;
    Ok(PATTERN.get_or_init(|| re))
}

/// Pick the location to update. A single location is used as is; with several,
/// `choose` gets their names and returns an index.
pub fn choose_location<'c>(
    component: &'c GitlabComponent,
    choose: impl FnOnce(&[String]) -> Result<usize>,
) -> Result<&'c ImageTagLocation> {
    let locations = &component.image_tag_locations;
    match locations.len() {
        0 => Err(Error::config_invalid_value(
            "gitlab.components",
            Some(component.name.clone()),
            format!("Component '{}' is missing image_tag_locations", component.name),
        )),
        1 => Ok(&locations[0]),
        _ => {
            let names: Vec<String> = locations.iter().map(|l| l.name.clone()).collect();
            let index = choose(&names)?;
            locations.get(index).ok_or_else(|| {
                Error::validation_invalid_argument("location", "No such location", None, Some(names))
            })
        }
    }
}

impl GitlabClient<'_> {
    fn raw_file(&self, project: &str, path: &str, branch: &str) -> Result<String> {
        let url = self.api_url(&["projects", project, "repository", "files", path, "raw"], &[("ref", branch)])?;
        let (request, response) = self.send(HttpRequest::get(url))?;
        let missing = response.status == 404;

        match ensure_success(&request, response) {
            Ok(response) => Ok(response.body),
            Err(err) if missing => {
                let mut err =
                    err.with_hint(format!("File not found at path '{}' on branch '{}'", path, branch));
                if let Ok(files) = self.terraform_files(project, branch) {
                    err = err.with_details_field("terraformFiles", serde_json::json!(files));
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Up to `LISTED_TF_FILES` `.tf` paths on the first page of the tree.
    fn terraform_files(&self, project: &str, branch: &str) -> Result<Vec<String>> {
        let tree: Vec<TreeEntry> = self.get_json(
            &["projects", project, "repository", "tree"],
            &[("ref", branch), ("recursive", "true"), ("per_page", "100")],
        )?;
        Ok(tree
            .into_iter()
            .map(|entry| entry.path)
            .filter(|path| path.ends_with(".tf"))
            .take(LISTED_TF_FILES)
            .collect())
    }

    fn commit_file(&self, project: &str, body: serde_json::Value) -> Result<CommitRecord> {
        let url = self.api_url(&["projects", project, "repository", "commits"], &[])?;
        let (request, response) = self.send(HttpRequest::post(url).json(body))?;
        ensure_success(&request, response)?.json()
    }
}

/// Rewrite every `image_version = "..."` in the location's file on the
/// component branch and commit the result as `gitlab.username`.
///
/// When the file has no `image_version`, `proceed_without_pattern` gets the
/// path and a numbered preview; declining cancels without committing.
pub fn update_image(
    client: &GitlabClient,
    update: &ImageUpdate,
    proceed_without_pattern: &dyn Fn(&str, &str) -> Result<bool>,
) -> Result<ImageUpdateResult> {
    let component = update.component;
    let branch = component.branch.as_deref().ok_or_else(|| {
        Error::config_invalid_value(
            "gitlab.components",
            Some(component.name.clone()),
            format!("Component '{}' needs a branch to commit to", component.name),
        )
    })?;
    let path = update.location.path_for(update.environment);
    let project = component.project_name_with_namespace.as_str();
    let commit_message = format!(
        "Updating component '{}' to use image '{}' in environment '{}' at path '{}'",
        component.name, update.tag, update.environment, path
    );
    log_status!("gitlab", "{}", commit_message);

    let mut result = ImageUpdateResult {
        component: component.name.clone(),
        environment: update.environment.to_string(),
        path: path.clone(),
        branch: branch.to_string(),
        tag: update.tag.to_string(),
        commit_message: commit_message.clone(),
        outcome: ImageUpdateOutcome::Cancelled,
    };

    let content = client.raw_file(project, &path, branch)?;
    let pattern = image_version_pattern()?;
    if !pattern.is_match(&content) && !proceed_without_pattern(&path, &preview(&content))? {
        log_status!("gitlab", "Update cancelled");
        return Ok(result);
    }

    let replacement = format!("image_version = \"{}\"", update.tag);
    let updated = pattern.replace_all(&content, NoExpand(&replacement));

    let mut body = serde_json::json!({
        "branch": branch,
        "commit_message": commit_message,
        "actions": [{"action": "update", "file_path": path, "content": updated}],
    });
    if let Some(username) = &client.settings.username {
        body["author_name"] = serde_json::json!(username);
    }
    if let Some(email) = &client.settings.email {
        body["author_email"] = serde_json::json!(email);
    }

    let commit = client.commit_file(project, body)?;
    log_status!("gitlab", "Component updated successfully");
    result.outcome = ImageUpdateOutcome::Committed {
        commit_id: commit.id,
        web_url: commit.web_url,
    };
    Ok(result)
}

fn preview(content: &str) -> String {
    content
        .lines()
        .take(PREVIEW_LINES)
        .enumerate()
        .map(|(i, line)| format!("{}: {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}
