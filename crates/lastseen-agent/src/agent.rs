//! Presence agent orchestration
//!
//! The [`Agent`] ties the token store to the presence service. It runs
//! exchanges for three triggers: an explicit `run`, daemon startup, and an
//! `ActiveChanged(false)` transition reported by the idle source.
//!
//! At most one exchange is outstanding at a time. Triggers that arrive
//! while one is in flight are dropped, not queued; the next idle
//! transition is the natural retry point.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use lastseen_core::config::LastseenConfig;
use lastseen_core::{Credential, Token, TokenStore};

use crate::client::{ExchangeResult, PresenceApi};
use crate::error::AgentError;
use crate::idle::IdleEvent;

/// Which exchange produced a result
///
/// A 401 means "wrong credentials" for a login and "stored token revoked"
/// for a refresh; callers use this to pick the right follow-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    Login,
    Refresh,
}

impl ExchangeKind {
    pub fn auth_failure_message(self) -> &'static str {
        match self {
            Self::Login => "Sorry, wrong email/password combination, please try again",
            Self::Refresh => {
                "Unable to authenticate using 'ping', please run `lastseen config` again"
            }
        }
    }

    /// User-facing explanation of a failed exchange, `None` on success
    pub fn describe(self, result: &ExchangeResult) -> Option<String> {
        match result {
            ExchangeResult::Success(_) => None,
            ExchangeResult::AuthFailure => Some(self.auth_failure_message().to_string()),
            ExchangeResult::NotFound { status } => Some(format!(
                "Unable to locate destination ({} from {}), please try again later",
                status, self
            )),
            ExchangeResult::ServerError { status } => Some(format!(
                "Uh-oh, looks like the server is having a bad hair day ({} from {}). \
                 Please try again later or report this if it persists.",
                status, self
            )),
            ExchangeResult::TransportError { reason } => {
                Some(format!("Could not reach lastseen during {}: {}", self, reason))
            }
        }
    }
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login => f.write_str("login"),
            Self::Refresh => f.write_str("ping"),
        }
    }
}

/// Whether an exchange is outstanding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Idle,
    Exchanging,
}

/// What [`Agent::handle_idle_event`] did with an event
#[derive(Debug)]
pub enum Trigger {
    /// A refresh was started; the handle yields its outcome
    Started(JoinHandle<Result<Token, AgentError>>),
    /// Inactive transition while an exchange was outstanding
    Dropped,
    /// `is_active == true`; presence is only recorded going inactive
    Ignored,
}

/// Source of login credentials for the `config` flow
pub trait CredentialPrompt: Send {
    /// Ask for credentials; `attempt` starts at 1
    fn prompt(&mut self, attempt: u32) -> io::Result<Credential>;

    /// Called after the server rejected the last credentials
    fn rejected(&mut self, _message: &str) {}
}

/// Prompt that always answers with the same credentials
#[derive(Debug, Clone)]
pub struct FixedCredentials(pub Credential);

impl CredentialPrompt for FixedCredentials {
    fn prompt(&mut self, _attempt: u32) -> io::Result<Credential> {
        Ok(self.0.clone())
    }
}

struct Inner {
    api: Arc<dyn PresenceApi>,
    store: TokenStore,
    in_flight: AtomicBool,
}

/// Marks the agent as exchanging until dropped
struct ExchangeGuard {
    inner: Arc<Inner>,
}

impl Drop for ExchangeGuard {
    fn drop(&mut self) {
        self.inner.in_flight.store(false, Ordering::Release);
    }
}

/// Presence agent
#[derive(Clone)]
pub struct Agent {
    inner: Arc<Inner>,
    max_login_attempts: u32,
}

impl Agent {
    pub fn new(api: Arc<dyn PresenceApi>, store: TokenStore) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                store,
                in_flight: AtomicBool::new(false),
            }),
            max_login_attempts: 5,
        }
    }

    /// Agent using the token path and login attempt limit from `config`
    pub fn from_config(config: &LastseenConfig, api: Arc<dyn PresenceApi>) -> Self {
        Self::new(api, TokenStore::new(config.token_path()))
            .with_max_login_attempts(config.max_login_attempts)
    }

    pub fn with_max_login_attempts(mut self, attempts: u32) -> Self {
        self.max_login_attempts = attempts.max(1);
        self
    }

    pub fn store(&self) -> &TokenStore {
        &self.inner.store
    }

    pub fn state(&self) -> AgentState {
        if self.inner.in_flight.load(Ordering::Acquire) {
            AgentState::Exchanging
        } else {
            AgentState::Idle
        }
    }

    fn try_begin(&self) -> Option<ExchangeGuard> {
        self.inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ExchangeGuard {
                inner: Arc::clone(&self.inner),
            })
    }

    /// Record presence once with the stored token
    ///
    /// On success the rotated token replaces the stored one. On any
    /// failure the token file is left untouched.
    pub async fn run_once(&self) -> Result<Token, AgentError> {
        let _guard = self.try_begin().ok_or(AgentError::ExchangeInFlight)?;
        self.refresh_stored().await
    }

    /// [`run_once`](Self::run_once), falling back to the credential flow
    /// when there is no usable token yet
    pub async fn run_or_configure(
        &self,
        prompt: &mut dyn CredentialPrompt,
    ) -> Result<Token, AgentError> {
        match self.run_once().await {
            Err(e @ (AgentError::ConfigMissing(_) | AgentError::ConfigCorrupt { .. })) => {
                tracing::info!("{}; starting credential flow", e);
                self.configure(prompt).await
            }
            other => other,
        }
    }

    /// Log in and store the issued token
    ///
    /// Rejected credentials are prompted for again, up to the configured
    /// number of attempts.
    pub async fn configure(
        &self,
        prompt: &mut dyn CredentialPrompt,
    ) -> Result<Token, AgentError> {
        let _guard = self.try_begin().ok_or(AgentError::ExchangeInFlight)?;
        let max = self.max_login_attempts;

        for attempt in 1..=max {
            let credential = prompt.prompt(attempt).map_err(AgentError::Prompt)?;
            let result = self.inner.api.authenticate(&credential).await;
            drop(credential);

            match self.settle(ExchangeKind::Login, result) {
                Err(AgentError::AuthFailure { kind }) => {
                    tracing::info!("Login attempt {} of {} rejected", attempt, max);
                    prompt.rejected(kind.auth_failure_message());
                }
                other => return other,
            }
        }

        Err(AgentError::TooManyAttempts(max))
    }

    /// React to an idle transition
    ///
    /// `is_active == false` starts one refresh in the background unless
    /// one is already outstanding. `is_active == true` never triggers an
    /// exchange.
    pub fn handle_idle_event(&self, event: IdleEvent) -> Trigger {
        if event.is_active {
            tracing::info!("ActiveChanged is true (not updating)");
            return Trigger::Ignored;
        }

        let Some(guard) = self.try_begin() else {
            tracing::debug!("Exchange already in flight, dropping idle trigger");
            return Trigger::Dropped;
        };

        let agent = self.clone();
        Trigger::Started(tokio::spawn(async move {
            let _guard = guard;
            agent.refresh_stored().await
        }))
    }

    /// Feed idle events to the agent until the stream ends or `shutdown`
    /// fires
    pub async fn run_event_loop<S>(&self, mut events: S, shutdown: CancellationToken)
    where
        S: Stream<Item = IdleEvent> + Unpin,
    {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown requested, leaving event loop");
                    return;
                }
                event = events.next() => match event {
                    Some(event) => {
                        tracing::debug!("Idle event: {:?}", event);
                        // Outcome is logged by the exchange itself
                        let _ = self.handle_idle_event(event);
                    }
                    None => {
                        tracing::warn!("Idle event stream ended");
                        return;
                    }
                }
            }
        }
    }

    async fn refresh_stored(&self) -> Result<Token, AgentError> {
        let token = match self.inner.store.load() {
            Ok(token) => token,
            Err(e) => {
                let err = AgentError::from(e);
                tracing::warn!("{}", err);
                return Err(err);
            }
        };
        let result = self.inner.api.refresh(&token).await;
        self.settle(ExchangeKind::Refresh, result)
    }

    /// Persist a successful exchange or turn a failure into an error
    fn settle(&self, kind: ExchangeKind, result: ExchangeResult) -> Result<Token, AgentError> {
        match result {
            ExchangeResult::Success(token) => {
                // The previous token is already invalid on the server
                if let Err(e) = self.inner.store.save(&token) {
                    tracing::error!("Failed to save new token after {}: {}", kind, e);
                    return Err(e.into());
                }
                match kind {
                    ExchangeKind::Login => tracing::info!("Logged in, token saved"),
                    ExchangeKind::Refresh => {
                        tracing::info!("updated lastseen time and refreshed token")
                    }
                }
                Ok(token)
            }
            ExchangeResult::AuthFailure => {
                match kind {
                    ExchangeKind::Login => tracing::warn!("{}", kind.auth_failure_message()),
                    ExchangeKind::Refresh => tracing::error!(
                        "Credentials/token invalid, reconfigure required: {}",
                        kind.auth_failure_message()
                    ),
                }
                Err(AgentError::AuthFailure { kind })
            }
            other => {
                let message = kind.describe(&other).unwrap_or_default();
                tracing::warn!("{}", message);
                Err(AgentError::RemoteUnavailable { kind, message })
            }
        }
    }
}
