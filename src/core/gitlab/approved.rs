//! Merging of open merge requests that another user has approved.

use serde::{Deserialize, Serialize};

use super::{error_summary, GitlabClient};
use crate::error::Result;
use crate::http::{ensure_success, HttpRequest};
use crate::output::{BulkResult, Listing};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequestRef {
    pub project: String,
    pub iid: u64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MergeOutcome {
    Merged {
        #[serde(rename = "approvedBy")]
        approved_by: String,
    },
    Declined {
        #[serde(rename = "approvedBy")]
        approved_by: String,
    },
    Skipped { reason: String },
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MergeReview {
    #[serde(flatten)]
    pub request: MergeRequestRef,
    #[serde(flatten)]
    pub outcome: MergeOutcome,
}

#[derive(Debug, Deserialize)]
struct OpenMergeRequest {
    iid: u64,
    #[serde(default)]
    title: String,
    web_url: Option<String>,
    author: Option<UserRecord>,
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    username: String,
}

#[derive(Debug, Deserialize)]
struct PipelineRecord {
    status: String,
}

#[derive(Debug, Deserialize)]
struct Approvals {
    #[serde(default)]
    approved_by: Vec<Approval>,
}

#[derive(Debug, Deserialize)]
struct Approval {
    user: UserRecord,
}

impl GitlabClient<'_> {
    fn open_merge_requests(&self, project_id: &str) -> Result<Listing<OpenMergeRequest>> {
        self.get_all(&["projects", project_id, "merge_requests"], &[("state", "opened")])
    }

    fn latest_pipeline(&self, project_id: &str, iid: &str) -> Result<Option<PipelineRecord>> {
        let pipelines: Vec<PipelineRecord> = self.get_json(
            &["projects", project_id, "merge_requests", iid, "pipelines"],
            &[("per_page", "1")],
        )?;
        Ok(pipelines.into_iter().next())
    }

    fn approvals(&self, project_id: &str, iid: &str) -> Result<Approvals> {
        self.get_json(&["projects", project_id, "merge_requests", iid, "approvals"], &[])
    }

    fn merge(&self, project_id: &str, iid: &str) -> Result<()> {
        let url = self.api_url(&["projects", project_id, "merge_requests", iid, "merge"], &[])?;
        let (request, response) = self.send(HttpRequest::put(url))?;
        ensure_success(&request, response).map(|_| ())
    }

    /// First approver other than `username`, or the reason the request is not ready.
    fn review(
        &self,
        project_id: &str,
        iid: &str,
        username: &str,
    ) -> Result<std::result::Result<String, String>> {
        let pipeline = match self.latest_pipeline(project_id, iid)? {
            Some(pipeline) => pipeline,
            None => return Ok(Err("no pipelines".to_string())),
        };
        if pipeline.status != "success" {
            return Ok(Err(format!("latest pipeline is {}", pipeline.status)));
        }

        let approver = self
            .approvals(project_id, iid)?
            .approved_by
            .into_iter()
            .map(|a| a.user.username)
            .find(|name| name != username);

        Ok(approver.ok_or_else(|| "not approved by another user".to_string()))
    }
}

/// Merge every open merge request authored by `gitlab.username`, in every
/// project of the configured group, whose latest pipeline succeeded and that
/// someone else approved.
///
/// `confirm` is asked before each merge and declining leaves the request open.
/// A failing project or request is recorded and the rest still run.
pub fn merge_approved(
    client: &GitlabClient,
    confirm: &dyn Fn(&MergeRequestRef, &str) -> Result<bool>,
) -> Result<BulkResult<MergeReview>> {
    let username = client.settings.require_username()?;
    let group_id = client.settings.require_group()?;
    let projects = client.group_projects(group_id)?;
    let mut bulk = BulkResult::new("merge_approved");
    bulk.warn(projects.warnings);

    for project in &projects.items {
        let project_id = project.id.to_string();
        let requests = match client.open_merge_requests(&project_id) {
            Ok(requests) => requests,
            Err(err) => {
                bulk.record_err(&project.path_with_namespace, None, error_summary(&err));
                continue;
            }
        };
        bulk.warn(requests.warnings);

        let mine = requests
            .items
            .into_iter()
            .filter(|mr| mr.author.as_ref().is_some_and(|a| a.username == username));

        for mr in mine {
            let iid = mr.iid.to_string();
            let id = format!("{}!{}", project.path_with_namespace, mr.iid);
            let request = MergeRequestRef {
                project: project.path_with_namespace.clone(),
                iid: mr.iid,
                title: mr.title,
                web_url: mr.web_url,
            };

            let approver = match client.review(&project_id, &iid, username) {
                Ok(Ok(approver)) => approver,
                Ok(Err(reason)) => {
                    log_status!("gitlab", "Skipping {}: {}", id, reason);
                    let outcome = MergeOutcome::Skipped { reason };
                    bulk.record_ok(id, MergeReview { request, outcome });
                    continue;
                }
                Err(err) => {
                    bulk.record_err(id, Some(skipped(request, "review failed")), error_summary(&err));
                    continue;
                }
            };

            if !confirm(&request, &approver)? {
                let outcome = MergeOutcome::Declined { approved_by: approver };
                bulk.record_ok(id, MergeReview { request, outcome });
                continue;
            }

            match client.merge(&project_id, &iid) {
                Ok(()) => {
                    log_status!("gitlab", "Merged {}", id);
                    let outcome = MergeOutcome::Merged { approved_by: approver };
                    bulk.record_ok(id, MergeReview { request, outcome });
                }
                Err(err) => {
                    bulk.record_err(id, Some(skipped(request, "merge failed")), error_summary(&err));
                }
            }
        }
    }

    Ok(bulk)
}

fn skipped(request: MergeRequestRef, reason: &str) -> MergeReview {
    MergeReview {
        request,
        outcome: MergeOutcome::Skipped {
            reason: reason.to_string(),
        },
    }
}
