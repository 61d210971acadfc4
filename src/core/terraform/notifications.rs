use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{list_workspaces, TerraformClient};
use crate::error::{Error, Result};
use crate::output::BulkResult;

pub const SLACK_NOTIFICATION_NAME: &str = "Slack Notification";

const SLACK_TRIGGERS: [&str; 6] = [
    "run:created",
    "run:planning",
    "run:needs_attention",
    "run:applying",
    "run:completed",
    "run:errored",
];

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum SlackOutcome {
    Added { workspace: String },
    AlreadyConfigured { workspace: String },
    Failed { workspace: String, code: u16 },
}

#[derive(Debug, Deserialize)]
struct NotificationList {
    #[serde(default)]
    data: Vec<NotificationRecord>,
}

#[derive(Debug, Deserialize)]
struct NotificationRecord {
    #[serde(default)]
    attributes: NotificationAttributes,
}

#[derive(Debug, Default, Deserialize)]
struct NotificationAttributes {
    #[serde(rename = "destination-type", default)]
    destination_type: String,
}

/// Give every workspace a Slack notification configuration.
///
/// Workspaces that already have one are left alone.
pub fn ensure_slack_notifications(client: &TerraformClient) -> Result<BulkResult<SlackOutcome>> {
    let webhook = client
        .settings()
        .slack_webhook_url
        .clone()
        .ok_or_else(|| Error::config_missing_key("terraform.slack_webhook_url", None))?;

    let workspaces = list_workspaces(client)?;
    let mut bulk = BulkResult::new("set_slack_webhook");

    for workspace in &workspaces.items {
        log_status!("terraform", "Checking workspace {}", workspace.name);
        let url = client.notifications_url(&workspace.id);
        let existing: NotificationList = client.get(&url)?;

        if existing
            .data
            .iter()
            .any(|n| n.attributes.destination_type == "slack")
        {
            bulk.record_ok(
                &workspace.id,
                SlackOutcome::AlreadyConfigured {
                    workspace: workspace.name.clone(),
                },
            );
            continue;
        }

        let response = client.post_json(&url, slack_payload(&webhook))?;
        if response.status == 201 {
            log_status!("terraform", "Slack webhook added to workspace {}", workspace.name);
            bulk.record_ok(
                &workspace.id,
                SlackOutcome::Added {
                    workspace: workspace.name.clone(),
                },
            );
        } else {
            log_status!(
                "terraform",
                "Failed to add Slack webhook to workspace {}",
                workspace.name
            );
            bulk.record_err(
                &workspace.id,
                Some(SlackOutcome::Failed {
                    workspace: workspace.name.clone(),
                    code: response.status,
                }),
                format!("HTTP {}", response.status),
            );
        }
    }

    Ok(bulk)
}

fn slack_payload(webhook: &str) -> serde_json::Value {
    json!({
        "data": {
            "type": "notification-configurations",
            "attributes": {
                "enabled": true,
                "name": SLACK_NOTIFICATION_NAME,
                "destination-type": "slack",
                "triggers": SLACK_TRIGGERS,
                "url": webhook,
            }
        }
    })
}
