//! CLI command implementations

mod config;
mod daemon;
mod run;

pub use config::config_command;
pub use daemon::{daemon_command, run_foreground};
pub use run::run_command;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use lastseen_agent::{Agent, CredentialPrompt, FixedCredentials, PresenceClient};
use lastseen_core::config::{self as core_config, LastseenConfig, TestProfile};
use lastseen_core::Credential;

use crate::output::print_warning;
use crate::prompt::TerminalPrompt;

/// Settings shared by every command
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: LastseenConfig,
    /// Set when `LASTSEEN_TESTING` selected a testing profile
    pub profile: Option<TestProfile>,
}

impl Settings {
    /// Load settings from `path`, or from the default location when present
    ///
    /// An explicit path must load cleanly. A broken default settings file
    /// only produces a warning.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config: LastseenConfig = match path {
            Some(path) => core_config::load_config(path)
                .with_context(|| format!("Failed to load settings from {:?}", path))?,
            None => {
                let default_path = core_config::default_settings_path();
                if default_path.exists() {
                    core_config::load_config(&default_path).unwrap_or_else(|e| {
                        print_warning(&format!(
                            "Ignoring settings in {:?}: {}",
                            default_path, e
                        ));
                        LastseenConfig::default()
                    })
                } else {
                    LastseenConfig::default()
                }
            }
        };

        let profile = TestProfile::from_env().context("Failed to load testing profile")?;
        if let Some(profile) = &profile {
            config.apply_profile(profile);
        }

        Ok(Self { config, profile })
    }

    pub fn is_testing(&self) -> bool {
        self.profile.is_some()
    }

    /// Credential source: the testing profile if any, else the terminal
    pub fn prompt(&self) -> Box<dyn CredentialPrompt> {
        match &self.profile {
            Some(profile) => Box::new(FixedCredentials(Credential::new(
                &profile.email,
                &profile.passwd,
            ))),
            None => Box::new(TerminalPrompt),
        }
    }

    pub fn agent(&self) -> Result<Agent> {
        let client = PresenceClient::new(&self.config).context("Failed to create HTTP client")?;
        Ok(Agent::from_config(&self.config, Arc::new(client)))
    }
}
