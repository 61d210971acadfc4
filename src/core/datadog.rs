//! Datadog agent releases published to the public ECR gallery.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::http::{ensure_success, HttpRequest, HttpTransport};
use crate::settings::Settings;

const ECR_BASE: &str = "https://public.ecr.aws";
const DEFAULT_REGISTRY: &str = "datadog";
const DEFAULT_REPOSITORY: &str = "agent";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EcrRepository {
    pub registry: String,
    pub repository: String,
}

impl Default for EcrRepository {
    fn default() -> Self {
        Self {
            registry: DEFAULT_REGISTRY.to_string(),
            repository: DEFAULT_REPOSITORY.to_string(),
        }
    }
}

impl EcrRepository {
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = Self::default();
        Self {
            registry: settings
                .get_str("datadog.registry")
                .map(str::to_string)
                .unwrap_or(defaults.registry),
            repository: settings
                .get_str("datadog.repository")
                .map(str::to_string)
                .unwrap_or(defaults.repository),
        }
    }

    fn token_url(&self) -> String {
        format!(
            "{}/token/?service=public.ecr.aws&scope=repository:{}/{}:pull",
            ECR_BASE, self.registry, self.repository
        )
    }

    fn tags_url(&self) -> String {
        format!("{}/v2/{}/{}/tags/list", ECR_BASE, self.registry, self.repository)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct TagsPage {
    #[serde(default)]
    tags: Vec<String>,
    next: Option<String>,
}

fn version_pattern() -> Result<&'static Regex> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    if let Some(re) = PATTERN.get() {
        return Ok(re);
    }
    let re = Regex::new(r"^\d+\.\d+\.\d+$")
        .map_err(|e| Error::internal_unexpected(format!("version pattern: {}", e)))?;
    Ok(PATTERN.get_or_init(|| re))
}

/// Every tag of the repository, following the `next` continuation token.
pub fn fetch_tags(transport: &dyn HttpTransport, repo: &EcrRepository) -> Result<Vec<String>> {
    let token_request = HttpRequest::get(repo.token_url());
    let token: TokenResponse =
        ensure_success(&token_request, transport.send(&token_request)?)?.json()?;

    let mut tags = Vec::new();
    let mut next: Option<String> = None;

    loop {
        let url = match &next {
            Some(token) => reqwest::Url::parse_with_params(&repo.tags_url(), &[("next", token)])
                .map_err(|e| {
                    Error::internal_unexpected(format!("build tags url: {}", e))
                })?
                .to_string(),
            None => repo.tags_url(),
        };

        let request =
            HttpRequest::get(url).header("Authorization", format!("Bearer {}", token.token));
        let page: TagsPage = ensure_success(&request, transport.send(&request)?)?.json()?;
        tags.extend(page.tags);

        match page.next.filter(|n| !n.is_empty()) {
            Some(token) => next = Some(token),
            None => break,
        }
    }

    Ok(tags)
}

/// Release versions (`X.Y.Z` tags only), lowest first.
pub fn release_versions(tags: &[String]) -> Result<Vec<String>> {
    let pattern = version_pattern()?;
    let mut versions: Vec<(semver::Version, &String)> = tags
        .iter()
        .filter(|tag| pattern.is_match(tag))
        .filter_map(|tag| semver::Version::parse(tag).ok().map(|v| (v, tag)))
        .collect();

    versions.sort_by(|a, b| a.0.cmp(&b.0));
    versions.dedup_by(|a, b| a.0 == b.0);
    Ok(versions.into_iter().map(|(_, tag)| tag.clone()).collect())
}

pub fn fetch_versions(transport: &dyn HttpTransport, repo: &EcrRepository) -> Result<Vec<String>> {
    release_versions(&fetch_tags(transport, repo)?)
}

pub fn latest_version(transport: &dyn HttpTransport, repo: &EcrRepository) -> Result<Option<String>> {
    Ok(fetch_versions(transport, repo)?.pop())
}
