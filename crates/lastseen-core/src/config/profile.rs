//! Testing profiles
//!
//! Setting `LASTSEEN_TESTING=dev` (or `prod`) points the client at the
//! server and account described in `ls_test` (or `ls_prod`) in the working
//! directory, so the login flow can run without a terminal.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Environment variable selecting a testing profile
pub const TESTING_ENV_VAR: &str = "LASTSEEN_TESTING";

/// Server and account used instead of the interactive prompt
#[derive(Clone, Deserialize)]
pub struct TestProfile {
    pub url: String,
    pub email: String,
    pub passwd: String,
}

impl std::fmt::Debug for TestProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestProfile")
            .field("url", &self.url)
            .field("email", &self.email)
            .field("passwd", &"<redacted>")
            .finish()
    }
}

impl TestProfile {
    /// Resolve the profile selected by `LASTSEEN_TESTING`, if any
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        match std::env::var(TESTING_ENV_VAR) {
            Ok(mode) => Self::for_mode(&mode, Path::new(".")).map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Load the profile for `mode` from `dir`
    pub fn for_mode(mode: &str, dir: &Path) -> Result<Self, ConfigError> {
        let file_name = match mode {
            "dev" => "ls_test",
            "prod" => "ls_prod",
            other => {
                return Err(ConfigError::Invalid(format!(
                    "{}={} is not a known profile (use dev or prod)",
                    TESTING_ENV_VAR, other
                )))
            }
        };
        Self::load(&dir.join(file_name))
    }

    /// Load a profile file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(PathBuf::from(path)))
            }
            Err(e) => {
                return Err(ConfigError::Invalid(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        serde_json::from_str(&content).map_err(|e| {
            ConfigError::Invalid(format!("{} data not usable: {}", path.display(), e))
        })
    }
}
