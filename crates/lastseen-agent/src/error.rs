//! Agent error taxonomy

use std::path::PathBuf;

use lastseen_core::{LockError, TokenStoreError};
use thiserror::Error;

use crate::agent::ExchangeKind;
use crate::idle::IdleError;

/// Everything an agent operation can fail with
///
/// Remote and I/O failures are turned into one of these at the agent
/// boundary; the daemon logs them and keeps waiting for the next trigger.
#[derive(Error, Debug)]
pub enum AgentError {
    /// No token yet; the credential flow has to run first
    #[error("config file [{0}] not found, please run `lastseen config`")]
    ConfigMissing(PathBuf),

    /// Token file present but unusable
    #[error("invalid config file [{path}] ({reason}), please run `lastseen config`")]
    ConfigCorrupt { path: PathBuf, reason: String },

    /// 401 from the server; meaning depends on the exchange
    #[error("{}", .kind.auth_failure_message())]
    AuthFailure { kind: ExchangeKind },

    /// Transport failure, server error or unexpected status
    #[error("{message}")]
    RemoteUnavailable { kind: ExchangeKind, message: String },

    /// Singleton violation
    #[error("lastseen already running (PID {pid})")]
    AlreadyRunning { pid: u32 },

    /// Another exchange is outstanding in this process
    #[error("an exchange is already in progress")]
    ExchangeInFlight,

    /// The user kept entering rejected credentials
    #[error("giving up after {0} failed login attempts")]
    TooManyAttempts(u32),

    /// Reading credentials failed (including Ctrl+C at the prompt)
    #[error("could not read credentials: {0}")]
    Prompt(#[source] std::io::Error),

    /// Token file I/O other than missing/corrupt
    #[error(transparent)]
    Store(TokenStoreError),

    /// Pidfile failure
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Session bus failure
    #[error(transparent)]
    Idle(#[from] IdleError),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl AgentError {
    /// True when rerunning `lastseen config` is the fix
    pub fn needs_reconfigure(&self) -> bool {
        matches!(
            self,
            Self::ConfigMissing(_)
                | Self::ConfigCorrupt { .. }
                | Self::AuthFailure {
                    kind: ExchangeKind::Refresh
                }
        )
    }
}

impl From<TokenStoreError> for AgentError {
    fn from(err: TokenStoreError) -> Self {
        match err {
            TokenStoreError::Missing(path) => Self::ConfigMissing(path),
            TokenStoreError::Corrupt { path, reason } => Self::ConfigCorrupt { path, reason },
            other => Self::Store(other),
        }
    }
}
