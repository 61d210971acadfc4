use clap::{Args, Subcommand};
use serde::Serialize;
use serde_json::Value;

use lizzy::settings::{self, EditOutcome, SettingsSource};
use lizzy::{json, paths, Settings};

use super::CmdResult;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show the path to config.json
    Path,
    /// Display the whole settings document and where it was loaded from
    Show,
    /// Read one value by dotted key (e.g. terraform.organization)
    Get {
        /// Dotted key
        key: String,
    },
    /// Set one value by dotted key, creating config.json when missing
    Set {
        /// Dotted key
        key: String,
        /// Value to set (JSON literal, or a plain string)
        value: String,
    },
    /// Open config.json in $VISUAL or $EDITOR
    Edit,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOutput {
    command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exists: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<SettingsSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    edit: Option<EditOutcome>,
}

impl ConfigOutput {
    fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            path: None,
            exists: None,
            source: None,
            key: None,
            value: None,
            edit: None,
        }
    }
}

pub fn run(args: ConfigArgs) -> CmdResult<ConfigOutput> {
    match args.command {
        ConfigCommand::Path => path(),
        ConfigCommand::Show => show(),
        ConfigCommand::Get { key } => get(&key),
        ConfigCommand::Set { key, value } => set(&key, &value),
        ConfigCommand::Edit => edit(),
    }
}

fn path() -> CmdResult<ConfigOutput> {
    let path = paths::config_json()?;

    let mut output = ConfigOutput::new("config.path");
    output.exists = Some(path.exists());
    output.path = Some(path.display().to_string());
    Ok((output, 0))
}

fn show() -> CmdResult<ConfigOutput> {
    let settings = Settings::load()?;

    let mut output = ConfigOutput::new("config.show");
    output.source = Some(settings.source().clone());
    output.value = Some(settings.document().clone());
    Ok((output, 0))
}

fn get(key: &str) -> CmdResult<ConfigOutput> {
    let settings = Settings::load()?;
    let value = settings
        .get(key)
        .cloned()
        .ok_or_else(|| lizzy::Error::config_missing_key(key, None))?;

    let mut output = ConfigOutput::new("config.get");
    output.key = Some(key.to_string());
    output.value = Some(value);
    Ok((output, 0))
}

fn set(key: &str, raw: &str) -> CmdResult<ConfigOutput> {
    let path = paths::config_json()?;
    let value = json::parse_value(raw);
    settings::set_value(&path, key, value.clone())?;

    let mut output = ConfigOutput::new("config.set");
    output.path = Some(path.display().to_string());
    output.key = Some(key.to_string());
    output.value = Some(value);
    Ok((output, 0))
}

fn edit() -> CmdResult<ConfigOutput> {
    let path = paths::config_json()?;
    let outcome = settings::edit(&path)?;
    let exit_code = outcome.exit_code.unwrap_or(1);

    let mut output = ConfigOutput::new("config.edit");
    output.path = Some(outcome.path.clone());
    output.edit = Some(outcome);
    Ok((output, exit_code))
}
