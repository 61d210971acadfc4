//! GitLab merge-request, branch and deployment-file housekeeping over the
//! REST v4 API.

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::http::{ensure_success, HttpRequest, HttpResponse, HttpTransport};
use crate::output::{BulkResult, Listing};
use crate::settings::Settings;

mod approved;
mod image;

pub use approved::{merge_approved, MergeOutcome, MergeRequestRef, MergeReview};
pub use image::{
    choose_location, update_image, ImageTagLocation, ImageUpdate, ImageUpdateOutcome,
    ImageUpdateResult,
};

const DEFAULT_BASE_URL: &str = "https://gitlab.com";
const PER_PAGE: &str = "100";
const MAX_PAGES: u32 = 1000;

/// Branches never removed by `remove_merged_branches`.
pub const PROTECTED_BRANCHES: [&str; 3] = ["main", "develop", "master"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GitlabComponent {
    pub name: String,
    pub project_name_with_namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_tag_locations: Vec<ImageTagLocation>,
}

#[derive(Clone)]
pub struct GitlabSettings {
    pub base_url: String,
    pub api_token: String,
    pub approval_group_id: Option<String>,
    /// Author of merge requests eligible for `merge_approved`, and commit author.
    pub username: Option<String>,
    pub email: Option<String>,
    pub environments: Vec<String>,
    pub components: Vec<GitlabComponent>,
}

impl fmt::Debug for GitlabSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitlabSettings")
            .field("base_url", &self.base_url)
            .field("api_token", &"<redacted>")
            .field("approval_group_id", &self.approval_group_id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("environments", &self.environments)
            .field("components", &self.components)
            .finish()
    }
}

impl GitlabSettings {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_token = settings.require_str("gitlab.api_token")?.to_string();
        let base_url = settings
            .get_str("gitlab.base_url")
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        let components = settings
            .get_array("gitlab.components")
            .into_iter()
            .map(serde_json::from_value::<GitlabComponent>)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| {
                Error::config_invalid_value(
                    "gitlab.components",
                    None,
                    format!("Each component needs name and project_name_with_namespace: {}", e),
                )
            })?;

        let environments = settings
            .get_array("gitlab.environments")
            .into_iter()
            .filter_map(|env| env.as_str().map(str::to_string))
            .collect();

        Ok(Self {
            base_url,
            api_token,
            approval_group_id: settings.require_id("gitlab.approval_group_id").ok(),
            username: non_empty(settings.get_str("gitlab.username")),
            email: non_empty(settings.get_str("gitlab.email")),
            environments,
            components,
        })
    }

    pub fn require_group(&self) -> Result<&str> {
        self.approval_group_id
            .as_deref()
            .ok_or_else(|| Error::config_missing_key("gitlab.approval_group_id", None))
    }

    pub fn require_username(&self) -> Result<&str> {
        self.username
            .as_deref()
            .ok_or_else(|| Error::config_missing_key("gitlab.username", None))
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeDirection {
    DevelopToMain,
    MainToDevelop,
}

impl MergeDirection {
    pub fn source(&self) -> &'static str {
        match self {
            MergeDirection::DevelopToMain => "develop",
            MergeDirection::MainToDevelop => "main",
        }
    }

    pub fn target(&self) -> &'static str {
        match self {
            MergeDirection::DevelopToMain => "main",
            MergeDirection::MainToDevelop => "develop",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            MergeDirection::DevelopToMain => "Develop to main",
            MergeDirection::MainToDevelop => "Main to Develop",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequestCreated {
    pub project: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iid: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BranchRemoval {
    pub project: String,
    pub branch: String,
}

#[derive(Debug, Deserialize)]
struct MergeRequestRecord {
    iid: Option<u64>,
    web_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProjectRecord {
    id: u64,
    #[serde(default)]
    path_with_namespace: String,
}

#[derive(Debug, Deserialize)]
struct BranchRecord {
    name: String,
    #[serde(default)]
    merged: bool,
}

pub struct GitlabClient<'a> {
    transport: &'a dyn HttpTransport,
    settings: &'a GitlabSettings,
}

impl<'a> GitlabClient<'a> {
    pub fn new(transport: &'a dyn HttpTransport, settings: &'a GitlabSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    /// Build `<base>/api/v4/<segments...>`, percent-encoding each segment.
    fn api_url(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<String> {
        let invalid = |problem: String| {
            Error::config_invalid_value("gitlab.base_url", Some(self.settings.base_url.clone()), problem)
        };

        let mut url = Url::parse(&self.settings.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("URL cannot have a path".to_string()))?
            .pop_if_empty()
            .extend(["api", "v4"])
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url.to_string())
    }

    fn send(&self, request: HttpRequest) -> Result<(HttpRequest, HttpResponse)> {
        let request = request.header("PRIVATE-TOKEN", self.settings.api_token.as_str());
        let response = self.transport.send(&request)?;
        Ok((request, response))
    }

    fn get_json<T: DeserializeOwned>(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<T> {
        let url = self.api_url(segments, query)?;
        let (request, response) = self.send(HttpRequest::get(url))?;
        ensure_success(&request, response)?.json()
    }

    /// Fetch every page of a list endpoint, following `x-next-page`.
    fn get_all<T: DeserializeOwned>(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Listing<T>> {
        self.get_pages(segments, query, MAX_PAGES)
    }

    fn get_pages<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
        max_pages: u32,
    ) -> Result<Listing<T>> {
        let mut listing = Listing::default();
        let mut page = "1".to_string();

        for _ in 0..max_pages {
            let url = self.page_url(segments, query, &page)?;
            let (request, response) = self.send(HttpRequest::get(url))?;
            let response = ensure_success(&request, response)?;
            let next = response
                .header("x-next-page")
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string);
            listing.items.extend(response.json::<Vec<T>>()?);

            match next {
                Some(next) => page = next,
                None => return Ok(listing),
            }
        }

        log_status!("gitlab", "Stopped paginating {} after {} pages", segments.join("/"), max_pages);
        let url = self.page_url(segments, query, &page)?;
        listing.warnings.push(Error::api_pagination_limit(url, max_pages));
        Ok(listing)
    }

    fn page_url(&self, segments: &[&str], query: &[(&str, &str)], page: &str) -> Result<String> {
        let mut params = query.to_vec();
        params.push(("per_page", PER_PAGE));
        params.push(("page", page));
        self.api_url(segments, &params)
    }

    pub fn create_merge_request(
        &self,
        project: &str,
        direction: MergeDirection,
    ) -> Result<MergeRequestCreated> {
        let url = self.api_url(&["projects", project, "merge_requests"], &[])?;
        let body = serde_json::json!({
            "source_branch": direction.source(),
            "target_branch": direction.target(),
            "title": direction.title(),
        });

        let (request, response) = self.send(HttpRequest::post(url).json(body))?;
        let record: MergeRequestRecord = ensure_success(&request, response)?.json()?;

        Ok(MergeRequestCreated {
            project: project.to_string(),
            iid: record.iid,
            web_url: record.web_url,
        })
    }

    fn group_projects(&self, group_id: &str) -> Result<Listing<ProjectRecord>> {
        self.get_all(&["groups", group_id, "projects"], &[("include_subgroups", "true")])
    }

    fn branches(&self, project_id: &str) -> Result<Listing<BranchRecord>> {
        self.get_all(&["projects", project_id, "repository", "branches"], &[])
    }

    fn delete_branch(&self, project_id: &str, branch: &str) -> Result<()> {
        let url = self.api_url(&["projects", project_id, "repository", "branches", branch], &[])?;
        let (request, response) = self.send(HttpRequest::delete(url))?;
        ensure_success(&request, response).map(|_| ())
    }
}

/// Open one merge request per configured component.
///
/// A failing component is recorded and the rest still run.
pub fn create_merge_requests(
    client: &GitlabClient,
    direction: MergeDirection,
) -> Result<BulkResult<MergeRequestCreated>> {
    let mut bulk = BulkResult::new(match direction {
        MergeDirection::DevelopToMain => "develop_to_main",
        MergeDirection::MainToDevelop => "main_to_develop",
    });

    for component in &client.settings.components {
        log_status!("gitlab", "Processing component: {}", component.name);
        match client.create_merge_request(&component.project_name_with_namespace, direction) {
            Ok(created) => {
                if let Some(url) = &created.web_url {
                    log_status!("gitlab", "Merge request created: {}", url);
                }
                bulk.record_ok(&component.name, created);
            }
            Err(err) => {
                log_status!(
                    "gitlab",
                    "Failed to create merge request for {}: {}",
                    component.name,
                    err.message
                );
                bulk.record_err(&component.name, None, error_summary(&err));
            }
        }
    }

    Ok(bulk)
}

/// Delete merged branches, except protected ones, in every project of the
/// configured group and its subgroups.
pub fn remove_merged_branches(client: &GitlabClient) -> Result<BulkResult<BranchRemoval>> {
    let group_id = client.settings.require_group()?;
    let projects = client.group_projects(group_id)?;
    let mut bulk = BulkResult::new("remove_merged_branches");
    bulk.warn(projects.warnings);

    for project in &projects.items {
        log_status!(
            "gitlab",
            "Found project: {}, scanning for merged branches...",
            project.path_with_namespace
        );
        let project_id = project.id.to_string();

        let branches = match client.branches(&project_id) {
            Ok(branches) => branches,
            Err(err) => {
                bulk.record_err(&project.path_with_namespace, None, error_summary(&err));
                continue;
            }
        };
        bulk.warn(branches.warnings);

        for branch in branches
            .items
            .iter()
            .filter(|b| b.merged && !PROTECTED_BRANCHES.contains(&b.name.as_str()))
        {
            log_status!("gitlab", "Removing merged branch: {}", branch.name);
            let removal = BranchRemoval {
                project: project.path_with_namespace.clone(),
                branch: branch.name.clone(),
            };
            let id = format!("{}:{}", project.path_with_namespace, branch.name);

            match client.delete_branch(&project_id, &branch.name) {
                Ok(()) => bulk.record_ok(id, removal),
                Err(err) => bulk.record_err(id, Some(removal), error_summary(&err)),
            }
        }
    }

    Ok(bulk)
}

fn error_summary(err: &Error) -> String {
    match err.details.get("status").and_then(|s| s.as_u64()) {
        Some(status) => format!("{} (HTTP {})", err.message, status),
        None => err.message.clone(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use crate::test_support::ScriptedTransport;
    use serde_json::json;

    pub(super) fn settings() -> GitlabSettings {
        GitlabSettings {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_token: "glpat".to_string(),
            approval_group_id: Some("42".to_string()),
            username: Some("jdoe".to_string()),
            email: Some("jdoe@acme.test".to_string()),
            environments: vec!["staging".to_string(), "production".to_string()],
            components: vec![
                GitlabComponent {
                    name: "api".to_string(),
                    project_name_with_namespace: "acme/api".to_string(),
                    branch: None,
                    image_tag_locations: Vec::new(),
                },
                GitlabComponent {
                    name: "web".to_string(),
                    project_name_with_namespace: "acme/web".to_string(),
                    branch: None,
                    image_tag_locations: Vec::new(),
                },
            ],
        }
    }

    #[test]
    fn settings_parse_components() {
        let settings = Settings::from_value(json!({
            "gitlab": {
                "api_token": "glpat",
                "approval_group_id": 42,
                "components": [{"name": "api", "project_name_with_namespace": "acme/api", "branch": "develop"}]
            }
        }));
        let gl = GitlabSettings::from_settings(&settings).unwrap();
        assert_eq!(gl.base_url, "https://gitlab.com");
        assert_eq!(gl.approval_group_id.as_deref(), Some("42"));
        assert_eq!(gl.components[0].branch.as_deref(), Some("develop"));
        assert!(gl.username.is_none());
        assert!(gl.environments.is_empty());

        let blank = Settings::from_value(json!({"gitlab": {"api_token": "glpat", "username": ""}}));
        let err = GitlabSettings::from_settings(&blank).unwrap().require_username().unwrap_err();
        assert_eq!(err.details["key"], "gitlab.username");
    }

    #[test]
    fn settings_parse_author_and_image_locations() {
        let settings = Settings::from_value(json!({
            "gitlab": {
                "api_token": "glpat",
                "username": "jdoe",
                "email": "jdoe@acme.test",
                "environments": ["staging", "production"],
                "components": [{
                    "name": "api",
                    "project_name_with_namespace": "acme/api",
                    "branch": "develop",
                    "image_tag_locations": [{"name": "service", "path": "deploy/{env}/main.tf"}]
                }]
            }
        }));
        let gl = GitlabSettings::from_settings(&settings).unwrap();
        assert_eq!(gl.require_username().unwrap(), "jdoe");
        assert_eq!(gl.email.as_deref(), Some("jdoe@acme.test"));
        assert_eq!(gl.environments, vec!["staging", "production"]);
        assert_eq!(gl.components[0].image_tag_locations[0].path, "deploy/{env}/main.tf");
    }

    #[test]
    fn page_cap_is_reported_as_warning() {
        let transport = ScriptedTransport::new();
        let settings = settings();
        let client = GitlabClient::new(&transport, &settings);
        for page in 1..=2 {
            transport.respond(
                HttpMethod::Get,
                &format!("https://gitlab.com/api/v4/groups/42/projects?per_page=100&page={}", page),
                HttpResponse::new(200, json!([{"id": page, "path_with_namespace": "acme/api"}]).to_string())
                    .with_header("X-Next-Page", (page + 1).to_string()),
            );
        }

        let listing: Listing<ProjectRecord> = client.get_pages(&["groups", "42", "projects"], &[], 2).unwrap();

        assert_eq!(listing.items.len(), 2);
        assert_eq!(listing.warnings.len(), 1);
        assert_eq!(listing.warnings[0].code.as_str(), "api.pagination_limit");
        assert_eq!(
            listing.warnings[0].details["url"],
            "https://gitlab.com/api/v4/groups/42/projects?per_page=100&page=3"
        );
        assert_eq!(transport.requests().len(), 2);
    }

    #[test]
    fn merge_requests_continue_past_failures() {
        let transport = ScriptedTransport::new();
        let settings = settings();
        let client = GitlabClient::new(&transport, &settings);
        transport.respond(
            HttpMethod::Post,
            "https://gitlab.com/api/v4/projects/acme%2Fapi/merge_requests",
            HttpResponse::new(409, r#"{"message":["Another open merge request already exists"]}"#),
        );
        transport.respond(
            HttpMethod::Post,
            "https://gitlab.com/api/v4/projects/acme%2Fweb/merge_requests",
            HttpResponse::new(
                201,
                json!({"iid": 7, "web_url": "https://gitlab.com/acme/web/-/merge_requests/7"})
                    .to_string(),
            ),
        );

        let bulk = create_merge_requests(&client, MergeDirection::DevelopToMain).unwrap();

        assert_eq!(bulk.summary.failed, 1);
        assert_eq!(bulk.summary.succeeded, 1);
        assert_eq!(bulk.results[1].result.as_ref().unwrap().iid, Some(7));

        let sent = transport.requests();
        let body = sent[0].body.as_ref().unwrap();
        assert_eq!(body["source_branch"], "develop");
        assert_eq!(body["target_branch"], "main");
        assert_eq!(body["title"], "Develop to main");
        assert!(sent[0]
            .headers
            .contains(&("PRIVATE-TOKEN".to_string(), "glpat".to_string())));
    }

    #[test]
    fn main_to_develop_reverses_branches() {
        assert_eq!(MergeDirection::MainToDevelop.source(), "main");
        assert_eq!(MergeDirection::MainToDevelop.target(), "develop");
        assert_eq!(MergeDirection::MainToDevelop.title(), "Main to Develop");
    }

    #[test]
    fn removes_only_merged_unprotected_branches() {
        let transport = ScriptedTransport::new();
        let settings = settings();
        let client = GitlabClient::new(&transport, &settings);
        transport.respond(
            HttpMethod::Get,
            "https://gitlab.com/api/v4/groups/42/projects?include_subgroups=true&per_page=100&page=1",
            HttpResponse::new(200, json!([{"id": 11, "path_with_namespace": "acme/api"}]).to_string())
                .with_header("X-Next-Page", "2"),
        );
        transport.respond(
            HttpMethod::Get,
            "https://gitlab.com/api/v4/groups/42/projects?include_subgroups=true&per_page=100&page=2",
            HttpResponse::new(200, json!([{"id": 12, "path_with_namespace": "acme/web"}]).to_string())
                .with_header("X-Next-Page", ""),
        );
        transport.respond(
            HttpMethod::Get,
            "https://gitlab.com/api/v4/projects/11/repository/branches?per_page=100&page=1",
            HttpResponse::new(
                200,
                json!([
                    {"name": "main", "merged": true},
                    {"name": "feature/login", "merged": true},
                    {"name": "wip", "merged": false}
                ])
                .to_string(),
            ),
        );
        transport.respond(
            HttpMethod::Get,
            "https://gitlab.com/api/v4/projects/12/repository/branches?per_page=100&page=1",
            HttpResponse::new(200, json!([{"name": "develop", "merged": true}]).to_string()),
        );
        transport.respond(
            HttpMethod::Delete,
            "https://gitlab.com/api/v4/projects/11/repository/branches/feature%2Flogin",
            HttpResponse::new(204, ""),
        );

        let bulk = remove_merged_branches(&client).unwrap();

        assert_eq!(bulk.summary.total, 1);
        assert_eq!(bulk.results[0].id, "acme/api:feature/login");
        let deletes = transport
            .requests()
            .iter()
            .filter(|r| r.method == HttpMethod::Delete)
            .count();
        assert_eq!(deletes, 1);
    }

    #[test]
    fn remove_requires_group() {
        let transport = ScriptedTransport::new();
        let mut settings = settings();
        settings.approval_group_id = None;
        let client = GitlabClient::new(&transport, &settings);

        let err = remove_merged_branches(&client).unwrap_err();
        assert_eq!(err.details["key"], "gitlab.approval_group_id");
    }
}
