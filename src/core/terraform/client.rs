use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use super::TerraformSettings;
use crate::error::Result;
use crate::http::{ensure_success, HttpRequest, HttpResponse, HttpTransport};

const CONTENT_TYPE: &str = "application/vnd.api+json";

/// Authenticated access to the Terraform Cloud v2 API.
///
/// Borrowed by every worker of the discard pool, so it holds only shared
/// references.
#[derive(Clone, Copy)]
pub struct TerraformClient<'a> {
    transport: &'a dyn HttpTransport,
    settings: &'a TerraformSettings,
}

impl<'a> TerraformClient<'a> {
    pub fn new(transport: &'a dyn HttpTransport, settings: &'a TerraformSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    pub fn settings(&self) -> &TerraformSettings {
        self.settings
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("{}/api/v2/{}", self.settings.base_url, path.trim_start_matches('/'))
    }

    pub fn workspaces_url(&self) -> String {
        self.api_url(&format!(
            "organizations/{}/workspaces",
            self.settings.organization
        ))
    }

    pub fn workspace_runs_url(&self, workspace_id: &str) -> String {
        self.api_url(&format!("workspaces/{}/runs", workspace_id))
    }

    pub fn run_action_url(&self, run_id: &str, action: &str) -> String {
        self.api_url(&format!("runs/{}/actions/{}", run_id, action))
    }

    pub fn notifications_url(&self, workspace_id: &str) -> String {
        self.api_url(&format!(
            "workspaces/{}/notification-configurations",
            workspace_id
        ))
    }

    /// Browser link for inspecting a run.
    pub fn run_link(&self, workspace_name: &str, run_id: &str) -> String {
        format!(
            "{}/app/{}/workspaces/{}/runs/{}",
            self.settings.base_url, self.settings.organization, workspace_name, run_id
        )
    }

    fn authorize(&self, request: HttpRequest) -> HttpRequest {
        request
            .header("Authorization", format!("Bearer {}", self.settings.api_token))
            .header("Content-Type", CONTENT_TYPE)
    }

    /// GET and parse, failing on any non-2xx.
    pub fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let request = self.authorize(HttpRequest::get(url));
        let response = self.transport.send(&request)?;
        ensure_success(&request, response)?.json()
    }

    /// GET without status classification.
    pub fn get_raw(&self, url: &str) -> Result<HttpResponse> {
        self.transport.send(&self.authorize(HttpRequest::get(url)))
    }

    /// Bodyless POST to a run action endpoint.
    pub fn post_action(&self, url: &str) -> Result<HttpResponse> {
        self.transport.send(&self.authorize(HttpRequest::post(url)))
    }

    pub fn post_json(&self, url: &str, body: Value) -> Result<HttpResponse> {
        self.transport
            .send(&self.authorize(HttpRequest::post(url).json(body)))
    }

    pub fn pause(&self, duration: Duration) {
        self.transport.pause(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use crate::test_support::ScriptedTransport;

    #[test]
    fn requests_carry_bearer_and_content_type() {
        let transport = ScriptedTransport::new();
        let settings = TerraformSettings::new("acme", "tok");
        let client = TerraformClient::new(&transport, &settings);
        let url = client.run_action_url("run-1", "cancel");
        transport.respond(HttpMethod::Post, &url, HttpResponse::new(202, ""));

        client.post_action(&url).unwrap();

        let sent = &transport.requests()[0];
        assert_eq!(url, "https://app.terraform.io/api/v2/runs/run-1/actions/cancel");
        assert!(sent
            .headers
            .contains(&("Authorization".to_string(), "Bearer tok".to_string())));
        assert!(sent
            .headers
            .contains(&("Content-Type".to_string(), CONTENT_TYPE.to_string())));
        assert!(sent.body.is_none());
    }

    #[test]
    fn run_link_is_workspace_scoped() {
        let transport = ScriptedTransport::new();
        let settings = TerraformSettings::new("acme", "tok");
        let client = TerraformClient::new(&transport, &settings);
        assert_eq!(
            client.run_link("ws-2", "run-7"),
            "https://app.terraform.io/app/acme/workspaces/ws-2/runs/run-7"
        );
    }

    #[test]
    fn get_fails_on_error_status() {
        let transport = ScriptedTransport::new();
        let settings = TerraformSettings::new("acme", "tok");
        let client = TerraformClient::new(&transport, &settings);
        let url = client.workspaces_url();
        transport.respond(HttpMethod::Get, &url, HttpResponse::new(401, "unauthorized"));

        let err = client.get::<Value>(&url).unwrap_err();
        assert_eq!(err.details["status"], 401);
    }
}
