// Public modules
pub mod datadog;
pub mod error;
pub mod github;
pub mod gitlab;
pub mod http;
pub mod output;
pub mod retry;
pub mod settings;
pub mod terraform;
pub mod workflow;

// Public for CLI access
pub mod json;
pub mod paths;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result, Warning};
pub use output::{BulkResult, BulkSummary, ItemOutcome, Listing};
pub use settings::Settings;
