use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigMissingKey,
    ConfigInvalidJson,
    ConfigInvalidValue,

    ValidationMissingArgument,
    ValidationInvalidArgument,
    ValidationInvalidJson,

    WorkflowNotFound,

    ApiRequestFailed,
    ApiTransportFailed,
    ApiRateLimited,
    ApiPaginationLimit,

    CommandFailed,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigMissingKey => "config.missing_key",
            ErrorCode::ConfigInvalidJson => "config.invalid_json",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationMissingArgument => "validation.missing_argument",
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",
            ErrorCode::ValidationInvalidJson => "validation.invalid_json",

            ErrorCode::WorkflowNotFound => "workflow.not_found",

            ErrorCode::ApiRequestFailed => "api.request_failed",
            ErrorCode::ApiTransportFailed => "api.transport_failed",
            ErrorCode::ApiRateLimited => "api.rate_limited",
            ErrorCode::ApiPaginationLimit => "api.pagination_limit",

            ErrorCode::CommandFailed => "command.failed",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorCode::ConfigMissingKey
            | ErrorCode::ConfigInvalidJson
            | ErrorCode::ConfigInvalidValue
            | ErrorCode::ValidationMissingArgument
            | ErrorCode::ValidationInvalidArgument
            | ErrorCode::ValidationInvalidJson => 2,

            ErrorCode::WorkflowNotFound => 4,

            ErrorCode::ApiRequestFailed
            | ErrorCode::ApiTransportFailed
            | ErrorCode::ApiRateLimited
            | ErrorCode::ApiPaginationLimit
            | ErrorCode::CommandFailed => REMOTE_FAILURE_EXIT_CODE,

            ErrorCode::InternalIoError
            | ErrorCode::InternalJsonError
            | ErrorCode::InternalUnexpected => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMissingKeyDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidJsonDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Exit code for failures reported by a remote platform.
pub const REMOTE_FAILURE_EXIT_CODE: i32 = 20;

/// Non-fatal problem carried in command output.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Warning {
    pub code: String,
    pub message: String,
    pub details: Value,
}

impl From<Error> for Warning {
    fn from(err: Error) -> Self {
        Self {
            code: err.code.as_str().to_string(),
            message: err.message,
            details: err.details,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundDetails {
    pub id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingArgumentDetails {
    pub args: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalJsonErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequestFailedDetails {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTransportFailedDetails {
    pub method: String,
    pub url: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandFailedDetails {
    pub command: String,
    pub exit_code: i32,
}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    pub fn validation_missing_argument(args: Vec<String>) -> Self {
        Self::new(
            ErrorCode::ValidationMissingArgument,
            "Missing required argument",
            to_details(MissingArgumentDetails { args }),
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        id: Option<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let details = to_details(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.into(),
            id,
            tried,
        });

        Self::new(
            ErrorCode::ValidationInvalidArgument,
            "Invalid argument",
            details,
        )
    }

    pub fn validation_invalid_json(err: serde_json::Error, context: Option<String>) -> Self {
        let details = serde_json::json!({
            "error": err.to_string(),
            "context": context,
        });

        Self::new(ErrorCode::ValidationInvalidJson, "Invalid JSON", details)
    }

    pub fn workflow_not_found(name: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::WorkflowNotFound,
            "Workflow not found",
            to_details(NotFoundDetails { id: name.into() }),
        )
        .with_hint("Run 'lizzy workflows list' to see available workflows")
    }

    pub fn config_missing_key(key: impl Into<String>, path: Option<String>) -> Self {
        let key = key.into();
        let hint = format!("Set '{}' with 'lizzy config set {} <value>'", key, key);
        Self::new(
            ErrorCode::ConfigMissingKey,
            "Missing required configuration key",
            to_details(ConfigMissingKeyDetails { key, path }),
        )
        .with_hint(hint)
    }

    pub fn config_invalid_json(path: impl Into<String>, err: serde_json::Error) -> Self {
        let details = to_details(ConfigInvalidJsonDetails {
            path: path.into(),
            error: err.to_string(),
        });

        Self::new(
            ErrorCode::ConfigInvalidJson,
            "Invalid JSON in configuration",
            details,
        )
        .with_hint("Fix the JSON syntax or run 'lizzy config edit'")
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let details = to_details(ConfigInvalidValueDetails {
            key: key.into(),
            value,
            problem: problem.into(),
        });

        Self::new(
            ErrorCode::ConfigInvalidValue,
            "Invalid configuration value",
            details,
        )
    }

    pub fn api_request_failed(
        method: impl Into<String>,
        url: impl Into<String>,
        status: u16,
        body: impl Into<String>,
    ) -> Self {
        let details = to_details(ApiRequestFailedDetails {
            method: method.into(),
            url: url.into(),
            status,
            body: body.into(),
        });

        Self::new(
            ErrorCode::ApiRequestFailed,
            format!("API error: HTTP {}", status),
            details,
        )
    }

    pub fn api_transport_failed(
        method: impl Into<String>,
        url: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let details = to_details(ApiTransportFailedDetails {
            method: method.into(),
            url: url.into(),
            error: error.into(),
        });

        let mut err = Self::new(
            ErrorCode::ApiTransportFailed,
            "HTTP request failed",
            details,
        );
        err.retryable = Some(true);
        err
    }

    pub fn api_rate_limited(url: impl Into<String>, attempts: u32) -> Self {
        let mut err = Self::new(
            ErrorCode::ApiRateLimited,
            format!("Rate limited after {} attempts", attempts),
            serde_json::json!({ "url": url.into(), "attempts": attempts }),
        );
        err.retryable = Some(true);
        err
    }

    pub fn api_pagination_limit(url: impl Into<String>, max_pages: u32) -> Self {
        Self::new(
            ErrorCode::ApiPaginationLimit,
            format!("Stopped after {} pages", max_pages),
            serde_json::json!({ "url": url.into(), "maxPages": max_pages }),
        )
    }

    pub fn command_failed(command: impl Into<String>, exit_code: i32) -> Self {
        Self::new(
            ErrorCode::CommandFailed,
            format!("Command exited with code {}", exit_code),
            to_details(CommandFailedDetails {
                command: command.into(),
                exit_code,
            }),
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalIoErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalIoError, "IO error", details)
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalJsonErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalJsonError, "JSON error", details)
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    pub fn with_details_field(mut self, key: &str, value: Value) -> Self {
        if let Value::Object(map) = &mut self.details {
            map.insert(key.to_string(), value);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_names_the_dotted_key() {
        let err = Error::config_missing_key("terraform.api_token", None);
        assert_eq!(err.code, ErrorCode::ConfigMissingKey);
        assert_eq!(err.details["key"], "terraform.api_token");
        assert!(err.hints[0].message.contains("terraform.api_token"));
    }

    #[test]
    fn transport_failure_is_retryable() {
        let err = Error::api_transport_failed("GET", "https://example.test", "connection refused");
        assert_eq!(err.code.as_str(), "api.transport_failed");
        assert_eq!(err.retryable, Some(true));
        assert_eq!(err.details["error"], "connection refused");
    }

    #[test]
    fn exit_codes_group_by_category() {
        assert_eq!(ErrorCode::ConfigMissingKey.exit_code(), 2);
        assert_eq!(ErrorCode::WorkflowNotFound.exit_code(), 4);
        assert_eq!(ErrorCode::ApiTransportFailed.exit_code(), 20);
        assert_eq!(ErrorCode::InternalUnexpected.exit_code(), 1);
    }

    #[test]
    fn warning_keeps_code_and_details() {
        let warning = Warning::from(Error::api_rate_limited("https://example.test", 5));
        assert_eq!(warning.code, "api.rate_limited");
        assert_eq!(warning.details["attempts"], 5);
    }

    #[test]
    fn details_field_is_added_to_object_details() {
        let err = Error::api_transport_failed("POST", "https://example.test", "reset")
            .with_details_field("failedUnits", serde_json::json!(3));
        assert_eq!(err.details["failedUnits"], 3);
    }
}
