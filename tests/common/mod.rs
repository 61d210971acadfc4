#![allow(dead_code)]

use lizzy::http::{HttpMethod, HttpResponse};
use lizzy::terraform::TerraformSettings;
use lizzy::test_support::ScriptedTransport;
use serde_json::{json, Value};

pub const BASE: &str = "https://tfc.test";
pub const ORG: &str = "acme";

pub fn settings() -> TerraformSettings {
    let mut settings = TerraformSettings::new(ORG, "token");
    settings.base_url = BASE.to_string();
    settings
}

pub fn workspaces_url() -> String {
    format!("{}/api/v2/organizations/{}/workspaces", BASE, ORG)
}

pub fn runs_url(workspace_id: &str) -> String {
    format!("{}/api/v2/workspaces/{}/runs", BASE, workspace_id)
}

pub fn action_url(run_id: &str, action: &str) -> String {
    format!("{}/api/v2/runs/{}/actions/{}", BASE, run_id, action)
}

/// JSON:API page body with an optional `links.next`.
pub fn page(data: Vec<Value>, next: Option<&str>) -> HttpResponse {
    HttpResponse::new(200, json!({"data": data, "links": {"next": next}}).to_string())
}

pub fn workspace(id: &str, name: &str) -> Value {
    json!({"id": id, "type": "workspaces", "attributes": {"name": name}})
}

pub fn run(id: &str, status: &str) -> Value {
    json!({"id": id, "type": "runs", "attributes": {"status": status}})
}

/// POSTs sent to any URL.
pub fn posts(platform: &ScriptedTransport) -> usize {
    platform
        .requests()
        .iter()
        .filter(|r| r.method == HttpMethod::Post)
        .count()
}
