//! Configuration management for lastseen

mod profile;
pub mod serde_utils;
mod settings;

pub use profile::{TestProfile, TESTING_ENV_VAR};
pub use settings::LastseenConfig;

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Name of the per-user state directory under `$HOME`
const STATE_DIR_NAME: &str = ".lastseen";

/// Get the default state directory (`~/.lastseen`)
pub fn default_state_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(STATE_DIR_NAME)
}

/// Get the default settings file path
pub fn default_settings_path() -> PathBuf {
    default_state_dir().join("settings.toml")
}

/// Load a TOML settings file
///
/// A missing file is `NotFound` so callers can fall back to defaults.
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound(path.to_path_buf()))
        }
        Err(e) => {
            return Err(ConfigError::Invalid(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };

    Ok(toml::from_str(&content)?)
}
