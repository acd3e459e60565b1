//! Core error types for lastseen

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors from loading or persisting the token file
#[derive(Error, Debug)]
pub enum TokenStoreError {
    /// No token file yet; the credential flow has never completed
    #[error("config file not found: {0}")]
    Missing(PathBuf),

    /// The token file exists but does not hold a token
    #[error("invalid config file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Any other I/O failure
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TokenStoreError {
    /// True when the caller should run the credential flow again
    pub fn needs_reconfigure(&self) -> bool {
        matches!(self, Self::Missing(_) | Self::Corrupt { .. })
    }
}

/// Pidfile errors that prevent a lock decision
#[derive(Error, Debug)]
pub enum LockError {
    /// Lock file could not be created, read or removed
    #[error("lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Another process keeps recreating the lock while we reclaim it
    #[error("lock file {0} keeps reappearing, giving up")]
    Contended(PathBuf),
}
