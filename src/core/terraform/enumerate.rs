//! Workspace and run listing.
//!
//! Both listings follow the JSON:API `links.next` field. Run listing also
//! retries rate-limited pages within the configured budget and, unless
//! exhaustive pagination is enabled, stops at the first page that holds no
//! active runs. Runs come back newest first, so an all-terminal page means
//! every older page is terminal too.

use serde::Deserialize;

use super::{is_terminal, Run, RunTarget, TerraformClient, Workspace};
use crate::error::{Error, Result};
use crate::http::HttpResponse;
use crate::output::Listing;

const MAX_PAGES_HINT: &str = "Raise terraform.max_pages if the listing is legitimately this long";

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    links: PageLinks,
}

#[derive(Debug, Default, Deserialize)]
struct PageLinks {
    next: Option<String>,
}

impl PageLinks {
    fn next(self) -> Option<String> {
        self.next.filter(|n| !n.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct WorkspaceRecord {
    id: String,
    #[serde(default)]
    attributes: WorkspaceAttributes,
}

#[derive(Debug, Default, Deserialize)]
struct WorkspaceAttributes {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct RunRecord {
    id: String,
    #[serde(default)]
    attributes: RunAttributes,
}

#[derive(Debug, Default, Deserialize)]
struct RunAttributes {
    #[serde(default)]
    status: String,
}

/// Every workspace of the organization, in page order.
pub fn list_workspaces(client: &TerraformClient) -> Result<Listing<Workspace>> {
    let max_pages = client.settings().max_pages;
    let mut listing = Listing::default();
    let mut next = Some(client.workspaces_url());
    let mut pages = 0;

    while let Some(url) = next.take() {
        if pages >= max_pages {
            log_status!("terraform", "Workspace listing stopped after {} pages", max_pages);
            listing
                .warnings
                .push(Error::api_pagination_limit(&url, max_pages).with_hint(MAX_PAGES_HINT));
            break;
        }

        let page: Page<WorkspaceRecord> = client.get(&url)?;
        pages += 1;

        listing
            .items
            .extend(page.data.into_iter().map(|record| Workspace {
                id: record.id,
                name: record.attributes.name,
            }));
        next = page.links.next();
    }

    Ok(listing)
}

/// Non-terminal runs of one workspace.
pub fn list_active_runs(client: &TerraformClient, workspace: &Workspace) -> Result<Listing<Run>> {
    let settings = client.settings();
    let mut listing = Listing::default();
    let mut next = Some(client.workspace_runs_url(&workspace.id));
    let mut pages = 0;

    while let Some(url) = next.take() {
        if pages >= settings.max_pages {
            log_status!(
                "terraform",
                "Run listing for {} stopped after {} pages",
                workspace.name,
                settings.max_pages
            );
            listing.warnings.push(
                Error::api_pagination_limit(&url, settings.max_pages)
                    .with_hint(MAX_PAGES_HINT)
                    .with_details_field("workspace", workspace.name.clone().into()),
            );
            break;
        }

        let response = match fetch_page(client, &url)? {
            Ok(response) => response,
            Err(warning) => {
                listing
                    .warnings
                    .push(warning.with_details_field("workspace", workspace.name.clone().into()));
                break;
            }
        };
        pages += 1;

        if response.status != 200 {
            log_status!(
                "terraform",
                "Failed to list runs for {}: HTTP {}",
                workspace.name,
                response.status
            );
            listing.warnings.push(
                Error::api_request_failed("GET", &url, response.status, response.body)
                    .with_details_field("workspace", workspace.name.clone().into()),
            );
            break;
        }

        let page: Page<RunRecord> = response.json()?;
        let active: Vec<Run> = page
            .data
            .into_iter()
            .filter(|record| !is_terminal(&record.attributes.status))
            .map(|record| Run {
                id: record.id,
                status: record.attributes.status,
            })
            .collect();

        if active.is_empty() && !settings.exhaustive_run_pagination {
            break;
        }

        listing.items.extend(active);
        next = page.links.next();
    }

    Ok(listing)
}

/// Send one page request, sleeping through 429s while the budget allows.
///
/// The inner `Err` is a rate-limit warning: the budget ran out.
fn fetch_page(
    client: &TerraformClient,
    url: &str,
) -> Result<std::result::Result<HttpResponse, Error>> {
    let policy = client.settings().retry;
    let mut attempts = 0;

    loop {
        let response = client.get_raw(url)?;
        attempts += 1;

        if response.status != 429 {
            return Ok(Ok(response));
        }

        if !policy.allows_another_attempt(attempts) {
            log_status!("terraform", "Still rate limited after {} attempts: {}", attempts, url);
            return Ok(Err(Error::api_rate_limited(url, attempts)));
        }

        let delay = policy.delay_for(attempts, response.retry_after());
        log_status!(
            "terraform",
            "Rate limited. Waiting {} seconds...",
            delay.as_secs()
        );
        client.pause(delay);
    }
}

/// Every active run of every workspace, gathered sequentially.
pub fn collect_targets(client: &TerraformClient) -> Result<Listing<RunTarget>> {
    let workspaces = list_workspaces(client)?;
    let mut listing = Listing {
        items: Vec::new(),
        warnings: workspaces.warnings,
    };

    for workspace in &workspaces.items {
        let runs = list_active_runs(client, workspace)?;
        listing
            .items
            .extend(runs.items.iter().map(|run| RunTarget::new(run, workspace)));
        listing.warnings.extend(runs.warnings);
    }

    log_status!(
        "terraform",
        "Found {} active runs across {} workspaces",
        listing.items.len(),
        workspaces.items.len()
    );

    Ok(listing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use crate::terraform::TerraformSettings;
    use crate::test_support::ScriptedTransport;
    use serde_json::json;
    use std::time::Duration;

    fn runs_page(runs: &[(&str, &str)], next: Option<&str>) -> HttpResponse {
        let data: Vec<_> = runs
            .iter()
            .map(|(id, status)| json!({"id": id, "attributes": {"status": status}}))
            .collect();
        HttpResponse::new(200, json!({"data": data, "links": {"next": next}}).to_string())
    }

    fn workspace() -> Workspace {
        Workspace {
            id: "ws-abc".to_string(),
            name: "network".to_string(),
        }
    }

    #[test]
    fn workspace_pages_are_concatenated_in_order() {
        let transport = ScriptedTransport::new();
        let settings = TerraformSettings::new("acme", "tok");
        let client = TerraformClient::new(&transport, &settings);
        let first = client.workspaces_url();
        let second = format!("{}?page%5Bnumber%5D=2", first);
        let third = format!("{}?page%5Bnumber%5D=3", first);

        transport.respond(
            HttpMethod::Get,
            &first,
            HttpResponse::new(
                200,
                json!({
                    "data": [{"id": "ws-1", "attributes": {"name": "one"}}],
                    "links": {"next": second}
                })
                .to_string(),
            ),
        );
        transport.respond(
            HttpMethod::Get,
            &second,
            HttpResponse::new(
                200,
                json!({
                    "data": [
                        {"id": "ws-2", "attributes": {"name": "two"}},
                        {"id": "ws-3", "attributes": {"name": "three"}}
                    ],
                    "links": {"next": third}
                })
                .to_string(),
            ),
        );
        transport.respond(
            HttpMethod::Get,
            &third,
            HttpResponse::new(
                200,
                json!({"data": [{"id": "ws-4", "attributes": {"name": "four"}}], "links": {"next": null}})
                    .to_string(),
            ),
        );

        let listing = list_workspaces(&client).unwrap();

        let ids: Vec<_> = listing.items.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, ["ws-1", "ws-2", "ws-3", "ws-4"]);
        assert_eq!(listing.items[2].name, "three");
        assert_eq!(transport.requests().len(), 3);
        assert!(listing.warnings.is_empty());
    }

    #[test]
    fn terminal_runs_are_filtered_out() {
        let transport = ScriptedTransport::new();
        let settings = TerraformSettings::new("acme", "tok");
        let client = TerraformClient::new(&transport, &settings);
        transport.respond(
            HttpMethod::Get,
            &client.workspace_runs_url("ws-abc"),
            runs_page(
                &[
                    ("run-1", "applied"),
                    ("run-2", "planned"),
                    ("run-3", "discarded"),
                    ("run-4", "errored"),
                    ("run-5", "canceled"),
                    ("run-6", "planned_and_finished"),
                    ("run-7", "applying"),
                ],
                None,
            ),
        );

        let listing = list_active_runs(&client, &workspace()).unwrap();

        let ids: Vec<_> = listing.items.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["run-2", "run-7"]);
    }

    #[test]
    fn all_terminal_page_stops_pagination() {
        let transport = ScriptedTransport::new();
        let settings = TerraformSettings::new("acme", "tok");
        let client = TerraformClient::new(&transport, &settings);
        transport.respond(
            HttpMethod::Get,
            &client.workspace_runs_url("ws-abc"),
            runs_page(
                &[("run-1", "applied"), ("run-2", "errored")],
                Some("https://app.terraform.io/api/v2/workspaces/ws-abc/runs?page=2"),
            ),
        );

        let listing = list_active_runs(&client, &workspace()).unwrap();

        assert!(listing.items.is_empty());
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn exhaustive_mode_follows_all_terminal_pages() {
        let transport = ScriptedTransport::new();
        let mut settings = TerraformSettings::new("acme", "tok");
        settings.exhaustive_run_pagination = true;
        let client = TerraformClient::new(&transport, &settings);
        let second = "https://app.terraform.io/api/v2/workspaces/ws-abc/runs?page=2";
        transport.respond(
            HttpMethod::Get,
            &client.workspace_runs_url("ws-abc"),
            runs_page(&[("run-1", "applied")], Some(second)),
        );
        transport.respond(
            HttpMethod::Get,
            second,
            runs_page(&[("run-9", "pending")], None),
        );

        let listing = list_active_runs(&client, &workspace()).unwrap();

        assert_eq!(listing.items.len(), 1);
        assert_eq!(listing.items[0].id, "run-9");
    }

    #[test]
    fn two_pages_with_empty_final_page() {
        let transport = ScriptedTransport::new();
        let settings = TerraformSettings::new("acme", "tok");
        let client = TerraformClient::new(&transport, &settings);
        let first = client.workspace_runs_url("ws-abc");
        let second = "https://app.terraform.io/api/v2/workspaces/ws-abc/runs?page=2";
        transport.respond(
            HttpMethod::Get,
            &first,
            runs_page(
                &[("run-1", "planned"), ("run-2", "planning"), ("run-3", "applying")],
                Some(second),
            ),
        );
        transport.respond(HttpMethod::Get, second, runs_page(&[], None));

        let listing = list_active_runs(&client, &workspace()).unwrap();

        assert_eq!(listing.items.len(), 3);
        assert_eq!(transport.count(HttpMethod::Get, &first), 1);
        assert_eq!(transport.count(HttpMethod::Get, second), 1);
    }

    #[test]
    fn rate_limited_page_is_retried_once_per_429() {
        let transport = ScriptedTransport::new();
        let settings = TerraformSettings::new("acme", "tok");
        let client = TerraformClient::new(&transport, &settings);
        let url = client.workspace_runs_url("ws-abc");
        transport.respond(
            HttpMethod::Get,
            &url,
            HttpResponse::new(429, "").with_header("Retry-After", "3"),
        );
        transport.respond(HttpMethod::Get, &url, HttpResponse::new(429, ""));
        transport.respond(HttpMethod::Get, &url, runs_page(&[("run-1", "planned")], None));

        let listing = list_active_runs(&client, &workspace()).unwrap();

        assert_eq!(listing.items.len(), 1);
        assert_eq!(transport.count(HttpMethod::Get, &url), 3);
        assert_eq!(
            transport.pauses(),
            vec![Duration::from_secs(3), Duration::from_secs(20)]
        );
        assert!(transport.requests().iter().all(|r| r.url == url));
    }

    #[test]
    fn exhausted_retry_budget_keeps_partial_results() {
        let transport = ScriptedTransport::new();
        let mut settings = TerraformSettings::new("acme", "tok");
        settings.retry.max_attempts = 2;
        let client = TerraformClient::new(&transport, &settings);
        let first = client.workspace_runs_url("ws-abc");
        let second = "https://app.terraform.io/api/v2/workspaces/ws-abc/runs?page=2";
        transport.respond(
            HttpMethod::Get,
            &first,
            runs_page(&[("run-1", "planned")], Some(second)),
        );
        transport.respond_always(HttpMethod::Get, second, HttpResponse::new(429, ""));

        let listing = list_active_runs(&client, &workspace()).unwrap();

        assert_eq!(listing.items.len(), 1);
        assert_eq!(transport.count(HttpMethod::Get, second), 2);
        assert_eq!(transport.pauses().len(), 1);
        assert_eq!(listing.warnings[0].code.as_str(), "api.rate_limited");
        assert_eq!(listing.warnings[0].details["workspace"], "network");
    }

    #[test]
    fn other_status_stops_the_workspace() {
        let transport = ScriptedTransport::new();
        let settings = TerraformSettings::new("acme", "tok");
        let client = TerraformClient::new(&transport, &settings);
        let first = client.workspace_runs_url("ws-abc");
        let second = "https://app.terraform.io/api/v2/workspaces/ws-abc/runs?page=2";
        transport.respond(
            HttpMethod::Get,
            &first,
            runs_page(&[("run-1", "planning")], Some(second)),
        );
        transport.respond(HttpMethod::Get, second, HttpResponse::new(500, "boom"));

        let listing = list_active_runs(&client, &workspace()).unwrap();

        assert_eq!(listing.items.len(), 1);
        assert_eq!(listing.warnings[0].details["status"], 500);
    }

    #[test]
    fn max_pages_bounds_runaway_pagination() {
        let transport = ScriptedTransport::new();
        let mut settings = TerraformSettings::new("acme", "tok");
        settings.max_pages = 2;
        let client = TerraformClient::new(&transport, &settings);
        let url = client.workspace_runs_url("ws-abc");
        transport.respond_always(
            HttpMethod::Get,
            &url,
            runs_page(&[("run-1", "planning")], Some(&url)),
        );

        let listing = list_active_runs(&client, &workspace()).unwrap();

        assert_eq!(transport.count(HttpMethod::Get, &url), 2);
        assert_eq!(listing.items.len(), 2);
        assert_eq!(listing.warnings[0].code.as_str(), "api.pagination_limit");
    }

    #[test]
    fn transport_failure_propagates() {
        let transport = ScriptedTransport::new();
        let settings = TerraformSettings::new("acme", "tok");
        let client = TerraformClient::new(&transport, &settings);
        transport.fail(HttpMethod::Get, &client.workspace_runs_url("ws-abc"), "connection reset");

        let err = list_active_runs(&client, &workspace()).unwrap_err();
        assert_eq!(err.code.as_str(), "api.transport_failed");
    }
}
