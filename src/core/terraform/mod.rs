//! Terraform Cloud run cleanup.
//!
//! The discard pipeline runs in two phases: a sequential enumeration of every
//! workspace and its non-terminal runs, then a bounded worker pool that
//! discards or cancels each discovered run.

use serde::Serialize;
use std::fmt;

use crate::error::Result;
use crate::retry::RetryPolicy;
use crate::settings::Settings;

mod cancel;
mod client;
mod discard;
mod enumerate;
mod notifications;

pub use cancel::{cancel_run, CancelOutcome, CancelReport, RunAction};
pub use client::TerraformClient;
pub use discard::{discard_plans, discard_runs, DiscardOutcome, DiscardSummary, WORKER_POOL_WIDTH};
pub use enumerate::{collect_targets, list_active_runs, list_workspaces};
pub use notifications::{ensure_slack_notifications, SlackOutcome, SLACK_NOTIFICATION_NAME};

pub const DEFAULT_BASE_URL: &str = "https://app.terraform.io";
const DEFAULT_MAX_PAGES: u32 = 500;

/// Run statuses from which no further transition occurs.
pub const TERMINAL_STATUSES: [&str; 5] = [
    "applied",
    "discarded",
    "errored",
    "canceled",
    "planned_and_finished",
];

/// The one non-terminal status that is discarded before falling back to cancel.
pub const PLANNED_STATUS: &str = "planned";

pub fn is_terminal(status: &str) -> bool {
    TERMINAL_STATUSES.contains(&status)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Run {
    pub id: String,
    pub status: String,
}

/// One unit of work for the discard pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTarget {
    pub run_id: String,
    pub status: String,
    pub workspace_name: String,
}

impl RunTarget {
    pub fn new(run: &Run, workspace: &Workspace) -> Self {
        Self {
            run_id: run.id.clone(),
            status: run.status.clone(),
            workspace_name: workspace.name.clone(),
        }
    }
}

#[derive(Clone)]
pub struct TerraformSettings {
    pub organization: String,
    pub api_token: String,
    pub base_url: String,
    pub slack_webhook_url: Option<String>,
    pub retry: RetryPolicy,
    pub max_pages: u32,
    pub exhaustive_run_pagination: bool,
}

impl fmt::Debug for TerraformSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerraformSettings")
            .field("organization", &self.organization)
            .field("api_token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("slack_webhook_url", &self.slack_webhook_url)
            .field("retry", &self.retry)
            .field("max_pages", &self.max_pages)
            .field("exhaustive_run_pagination", &self.exhaustive_run_pagination)
            .finish()
    }
}

impl TerraformSettings {
    /// Settings with defaults for everything except the credentials.
    pub fn new(organization: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            api_token: api_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            slack_webhook_url: None,
            retry: RetryPolicy::default(),
            max_pages: DEFAULT_MAX_PAGES,
            exhaustive_run_pagination: false,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let organization = settings.require_str("terraform.organization")?.to_string();
        let api_token = settings.require_str("terraform.api_token")?.to_string();

        let base_url = settings
            .get_str("terraform.base_url")
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        let max_pages = match settings.get_u64("terraform.max_pages")? {
            Some(n) if n > 0 => u32::try_from(n).unwrap_or(u32::MAX),
            Some(_) => {
                return Err(crate::Error::config_invalid_value(
                    "terraform.max_pages",
                    Some("0".to_string()),
                    "At least one page is required",
                ))
            }
            None => DEFAULT_MAX_PAGES,
        };

        Ok(Self {
            organization,
            api_token,
            base_url,
            slack_webhook_url: settings
                .get_str("terraform.slack_webhook_url")
                .map(str::to_string),
            retry: RetryPolicy::from_settings(settings, "terraform.retry")?,
            max_pages,
            exhaustive_run_pagination: settings
                .get_bool("terraform.exhaustive_run_pagination")?
                .unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn terminal_set_is_fixed() {
        for status in ["applied", "discarded", "errored", "canceled", "planned_and_finished"] {
            assert!(is_terminal(status), "{}", status);
        }
        for status in ["planned", "planning", "applying", "pending", "policy_checked"] {
            assert!(!is_terminal(status), "{}", status);
        }
    }

    #[test]
    fn settings_require_organization_and_token() {
        let settings = Settings::from_value(json!({"terraform": {"organization": "acme"}}));
        let err = TerraformSettings::from_settings(&settings).unwrap_err();
        assert_eq!(err.details["key"], "terraform.api_token");
    }

    #[test]
    fn settings_fill_defaults() {
        let settings = Settings::from_value(json!({
            "terraform": {"organization": "acme", "api_token": "secret"}
        }));
        let tf = TerraformSettings::from_settings(&settings).unwrap();
        assert_eq!(tf.base_url, DEFAULT_BASE_URL);
        assert_eq!(tf.max_pages, 500);
        assert!(!tf.exhaustive_run_pagination);
        assert_eq!(tf.retry, RetryPolicy::default());
        assert!(tf.slack_webhook_url.is_none());
    }

    #[test]
    fn debug_output_hides_the_token() {
        let tf = TerraformSettings::new("acme", "very-secret");
        assert!(!format!("{:?}", tf).contains("very-secret"));
    }
}
