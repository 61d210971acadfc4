//! Public output types shared by commands that act on many items.

use serde::Serialize;

use crate::error::{Error, Warning};

/// Items gathered by a listing plus the problems that cut it short.
#[derive(Debug, Clone)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub warnings: Vec<Error>,
}

impl<T> Default for Listing<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Standardized bulk execution result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResult<T: Serialize> {
    pub action: String,
    pub results: Vec<ItemOutcome<T>>,
    pub summary: BulkSummary,
    /// Problems that did not fail an item, such as a truncated listing.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

/// Outcome for a single item in a bulk operation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemOutcome<T: Serialize> {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(flatten)]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of bulk operation results.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BulkSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl<T: Serialize> BulkResult<T> {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            results: Vec::new(),
            summary: BulkSummary::default(),
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, warnings: impl IntoIterator<Item = Error>) {
        self.warnings.extend(warnings.into_iter().map(Warning::from));
    }

    pub fn record_ok(&mut self, id: impl Into<String>, result: T) {
        self.summary.total += 1;
        self.summary.succeeded += 1;
        self.results.push(ItemOutcome {
            id: id.into(),
            result: Some(result),
            error: None,
        });
    }

    /// Record a failure; `result` carries any partial data for the item.
    pub fn record_err(&mut self, id: impl Into<String>, result: Option<T>, error: impl Into<String>) {
        self.summary.total += 1;
        self.summary.failed += 1;
        self.results.push(ItemOutcome {
            id: id.into(),
            result,
            error: Some(error.into()),
        });
    }

    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }

    /// Exit code for commands whose only failures are per-item remote errors.
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            crate::error::REMOTE_FAILURE_EXIT_CODE
        } else {
            0
        }
    }
}
