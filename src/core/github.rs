use serde::Deserialize;

use crate::error::{Error, Result};
use crate::http::{ensure_success, HttpRequest, HttpTransport};
use crate::output::Listing;

const API_BASE: &str = "https://api.github.com";
const PER_PAGE: u32 = 100;
const MAX_PAGES: u32 = 1000;

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
}

fn validate_repo(repo: &str) -> Result<&str> {
    let repo = repo.trim().trim_matches('/');
    let mut parts = repo.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => Ok(repo),
        _ => Err(Error::validation_invalid_argument(
            "repo",
            "Expected <owner>/<name>",
            Some(repo.to_string()),
            None,
        )),
    }
}

fn tags_url(repo: &str) -> String {
    format!("{}/repos/{}/tags", API_BASE, repo)
}

fn fetch_page(transport: &dyn HttpTransport, url: String) -> Result<Vec<String>> {
    let request = HttpRequest::get(url).header("Accept", "application/vnd.github+json");
    let tags: Vec<Tag> = ensure_success(&request, transport.send(&request)?)?.json()?;
    Ok(tags.into_iter().map(|t| t.name).collect())
}

/// Tag names of a repository, newest first as GitHub orders them.
///
/// Without `all`, only the first page is returned.
pub fn list_tags(transport: &dyn HttpTransport, repo: &str, all: bool) -> Result<Listing<String>> {
    let repo = validate_repo(repo)?;

    if !all {
        return Ok(Listing {
            items: fetch_page(transport, tags_url(repo))?,
            warnings: Vec::new(),
        });
    }

    walk_pages(transport, repo, MAX_PAGES)
}

fn walk_pages(transport: &dyn HttpTransport, repo: &str, max_pages: u32) -> Result<Listing<String>> {
    let page_url = |page: u32| format!("{}?page={}&per_page={}", tags_url(repo), page, PER_PAGE);
    let mut listing = Listing::default();

    for page in 1..=max_pages {
        let page_tags = fetch_page(transport, page_url(page))?;
        if page_tags.is_empty() {
            return Ok(listing);
        }
        listing.items.extend(page_tags);
    }

    log_status!("github", "Stopped listing tags for {} after {} pages", repo, max_pages);
    listing
        .warnings
        .push(Error::api_pagination_limit(page_url(max_pages + 1), max_pages));
    Ok(listing)
}

/// First tag of the repository with any leading `v` removed.
pub fn latest_tag(transport: &dyn HttpTransport, repo: &str) -> Result<Option<String>> {
    Ok(list_tags(transport, repo, false)?
        .items
        .into_iter()
        .next()
        .map(|tag| tag.strip_prefix('v').unwrap_or(tag.as_str()).to_string()))
}
