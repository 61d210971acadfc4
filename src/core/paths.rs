use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Environment variable that relocates the whole lizzy config directory.
pub const CONFIG_DIR_ENV: &str = "LIZZY_CONFIG_DIR";

/// Base lizzy config directory (`$LIZZY_CONFIG_DIR`, else `~/.lizzy`)
pub fn lizzy() -> Result<PathBuf> {
    if let Ok(dir) = env::var(CONFIG_DIR_ENV) {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }

    #[cfg(windows)]
    {
        let profile = env::var("USERPROFILE").map_err(|_| {
            Error::internal_unexpected(
                "USERPROFILE environment variable not set on Windows".to_string(),
            )
        })?;
        Ok(PathBuf::from(profile).join(".lizzy"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected(
                "HOME environment variable not set on Unix-like system".to_string(),
            )
        })?;
        Ok(PathBuf::from(home).join(".lizzy"))
    }
}

/// User settings document path
pub fn config_json() -> Result<PathBuf> {
    Ok(lizzy()?.join("config.json"))
}

/// Workflows directory
pub fn workflows() -> Result<PathBuf> {
    Ok(lizzy()?.join("workflows"))
}
