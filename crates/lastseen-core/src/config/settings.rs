//! Client settings

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;
use super::TestProfile;

/// Settings for the lastseen client and daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LastseenConfig {
    /// Base URL of the presence service
    pub base_url: String,

    /// Path of the login endpoint, relative to `base_url`
    pub login_path: String,

    /// Path of the ping endpoint that rotates the token
    pub refresh_path: String,

    /// Upper bound for each HTTP exchange
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,

    /// How many times `config` re-prompts after a rejected login
    pub max_login_attempts: u32,

    /// D-Bus interface whose `ActiveChanged` signal marks idle transitions
    pub screensaver_interface: String,

    /// Directory holding the token, pidfile and log
    pub state_dir: PathBuf,
}

impl Default for LastseenConfig {
    fn default() -> Self {
        Self {
            base_url: "https://lastseen.me".to_string(),
            login_path: "/api/auth/login".to_string(),
            refresh_path: "/api/pingw".to_string(),
            request_timeout: Duration::from_secs(10),
            max_login_attempts: 5,
            screensaver_interface: "org.gnome.ScreenSaver".to_string(),
            state_dir: super::default_state_dir(),
        }
    }
}

impl LastseenConfig {
    /// Token file, named `config` for compatibility with existing installs
    pub fn token_path(&self) -> PathBuf {
        self.state_dir.join("config")
    }

    /// Pidfile guarding the single daemon instance
    pub fn pid_path(&self) -> PathBuf {
        self.state_dir.join("lastseen.pid")
    }

    /// Log file shared by the daemon and one-shot commands
    pub fn log_path(&self) -> PathBuf {
        self.state_dir.join("lastseen.log")
    }

    /// Full URL of the login endpoint
    pub fn login_url(&self) -> String {
        join_url(&self.base_url, &self.login_path)
    }

    /// Full URL of the refresh endpoint
    pub fn refresh_url(&self) -> String {
        join_url(&self.base_url, &self.refresh_path)
    }

    /// Point the client at a testing profile's server
    pub fn apply_profile(&mut self, profile: &TestProfile) {
        self.base_url = profile.url.clone();
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_service() {
        let config = LastseenConfig::default();
        assert_eq!(config.login_url(), "https://lastseen.me/api/auth/login");
        assert_eq!(config.refresh_url(), "https://lastseen.me/api/pingw");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.max_login_attempts, 5);
    }

    #[test]
    fn test_paths_live_in_state_dir() {
        let config = LastseenConfig {
            state_dir: PathBuf::from("/tmp/ls"),
            ..LastseenConfig::default()
        };
        assert_eq!(config.token_path(), PathBuf::from("/tmp/ls/config"));
        assert_eq!(config.pid_path(), PathBuf::from("/tmp/ls/lastseen.pid"));
        assert_eq!(config.log_path(), PathBuf::from("/tmp/ls/lastseen.log"));
    }

    #[test]
    fn test_url_join_handles_slashes() {
        let config = LastseenConfig {
            base_url: "http://localhost:8000/".to_string(),
            refresh_path: "api/pingw".to_string(),
            ..LastseenConfig::default()
        };
        assert_eq!(config.refresh_url(), "http://localhost:8000/api/pingw");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: LastseenConfig =
            toml::from_str("base_url = \"http://dev.lastseen.test\"\nrequest_timeout = 3\n")
                .unwrap();
        assert_eq!(config.base_url, "http://dev.lastseen.test");
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.refresh_path, "/api/pingw");
    }

    #[test]
    fn test_apply_profile_overrides_url() {
        let mut config = LastseenConfig::default();
        config.apply_profile(&TestProfile {
            url: "http://dev.lastseen.test".to_string(),
            email: "a@b.c".to_string(),
            passwd: "pw".to_string(),
        });
        assert_eq!(config.login_url(), "http://dev.lastseen.test/api/auth/login");
    }
}
