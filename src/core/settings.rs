//! Settings document access.
//!
//! The user document lives at `~/.lizzy/config.json`. When it does not exist
//! the example document compiled into the binary is used instead, so every
//! command can start (and report missing keys) without a setup step.
//!
//! The document is loaded once per process and handed to components by
//! reference; typed views such as `TerraformSettings` validate the keys they
//! need when they are built.

use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};
use crate::json;
use crate::paths;

const EXAMPLE_CONFIG: &str = include_str!("../../assets/example_config.json");

/// Where the loaded document came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SettingsSource {
    User { path: PathBuf },
    BundledExample,
    Inline,
}

#[derive(Debug, Clone)]
pub struct Settings {
    document: Value,
    source: SettingsSource,
}

impl Settings {
    /// Load the user document, falling back to the bundled example.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_json()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self {
                document: example_document()?,
                source: SettingsSource::BundledExample,
            });
        }

        Ok(Self {
            document: read_document(path)?,
            source: SettingsSource::User {
                path: path.to_path_buf(),
            },
        })
    }

    pub fn from_value(document: Value) -> Self {
        Self {
            document,
            source: SettingsSource::Inline,
        }
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn source(&self) -> &SettingsSource {
        &self.source
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        json::get_dotted(&self.document, key)
    }

    /// String setting; blank strings count as unset.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.get_str(key)
            .ok_or_else(|| Error::config_missing_key(key, self.path_hint()))
    }

    /// String setting that also accepts a number (group ids are often numeric).
    pub fn require_id(&self, key: &str) -> Result<String> {
        match self.get(key) {
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            _ => Err(Error::config_missing_key(key, self.path_hint())),
        }
    }

    pub fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value.as_u64().map(Some).ok_or_else(|| {
                Error::config_invalid_value(
                    key,
                    Some(value.to_string()),
                    "Expected a non-negative integer",
                )
            }),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value.as_bool().map(Some).ok_or_else(|| {
                Error::config_invalid_value(key, Some(value.to_string()), "Expected true or false")
            }),
        }
    }

    pub fn get_array(&self, key: &str) -> Vec<Value> {
        self.get(key)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }

    fn path_hint(&self) -> Option<String> {
        match &self.source {
            SettingsSource::User { path } => Some(path.display().to_string()),
            SettingsSource::BundledExample => paths::config_json()
                .ok()
                .map(|p| p.display().to_string()),
            SettingsSource::Inline => None,
        }
    }
}

/// Parse the example document compiled into the binary.
pub fn example_document() -> Result<Value> {
    serde_json::from_str(EXAMPLE_CONFIG).map_err(|e| {
        Error::internal_json(e.to_string(), Some("parse bundled example config".to_string()))
    })
}

fn read_document(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;

    serde_json::from_str(&content)
        .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))
}

fn write_document(path: &Path, document: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("create {}", parent.display())))
        })?;
    }

    let content = json::to_string_pretty(document)?;
    fs::write(path, content).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("write {}", path.display())))
    })
}

/// Create the user document from the bundled example when it is missing.
///
/// Returns the path and whether the file was created.
pub fn ensure_user_document(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    write_document(path, &example_document()?)?;
    log_status!("config", "Example config created at {}", path.display());
    Ok(true)
}

/// Set a dotted key in the user document and persist it.
pub fn set_value(path: &Path, key: &str, value: Value) -> Result<Value> {
    let mut document = if path.exists() {
        read_document(path)?
    } else {
        example_document()?
    };

    json::set_dotted(&mut document, key, value)?;
    write_document(path, &document)?;
    Ok(document)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditOutcome {
    pub path: String,
    pub created: bool,
    pub editor: String,
    pub exit_code: Option<i32>,
}

/// Editor used by `config edit`: `$VISUAL`, then `$EDITOR`, then vim.
pub fn resolve_editor() -> String {
    ["VISUAL", "EDITOR"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
        .unwrap_or_else(|| "vim".to_string())
}

/// Open the user document in an editor, creating it from the example first.
pub fn edit(path: &Path) -> Result<EditOutcome> {
    let created = ensure_user_document(path)?;
    let editor = resolve_editor();

    let status = Command::new(&editor).arg(path).status().map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("launch editor '{}'", editor))).with_hint(
            format!(
                "{} is not installed or not on PATH. Open {} manually.",
                editor,
                path.display()
            ),
        )
    })?;

    Ok(EditOutcome {
        path: path.display().to_string(),
        created,
        editor,
        exit_code: status.code(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bundled_example_parses() {
        let doc = example_document().unwrap();
        assert!(doc.get("terraform").is_some());
    }

    #[test]
    fn missing_user_file_falls_back_to_example() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(settings.source(), &SettingsSource::BundledExample);
        assert_eq!(
            settings.get_str("terraform.base_url"),
            Some("https://app.terraform.io")
        );
    }

    #[test]
    fn user_file_is_preferred() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"terraform": {"organization": "acme"}}"#).unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.get_str("terraform.organization"), Some("acme"));
        assert!(matches!(settings.source(), SettingsSource::User { .. }));
    }

    #[test]
    fn invalid_user_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = Settings::load_from(&path).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ConfigInvalidJson);
    }

    #[test]
    fn blank_strings_count_as_missing() {
        let settings = Settings::from_value(json!({"terraform": {"api_token": "  "}}));
        assert!(settings.get_str("terraform.api_token").is_none());
        let err = settings.require_str("terraform.api_token").unwrap_err();
        assert_eq!(err.details["key"], "terraform.api_token");
    }

    #[test]
    fn require_id_accepts_numbers() {
        let settings = Settings::from_value(json!({"gitlab": {"approval_group_id": 42}}));
        assert_eq!(settings.require_id("gitlab.approval_group_id").unwrap(), "42");
    }

    #[test]
    fn get_u64_rejects_wrong_type() {
        let settings = Settings::from_value(json!({"terraform": {"max_pages": "many"}}));
        assert!(settings.get_u64("terraform.max_pages").is_err());
        assert_eq!(settings.get_u64("terraform.missing").unwrap(), None);
    }

    #[test]
    fn set_value_creates_user_document_from_example() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        set_value(&path, "terraform.organization", json!("acme")).unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.get_str("terraform.organization"), Some("acme"));
        assert!(settings.get("gitlab").is_some());
    }

    #[test]
    fn ensure_user_document_only_creates_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        assert!(ensure_user_document(&path).unwrap());
        assert!(!ensure_user_document(&path).unwrap());
    }
}
