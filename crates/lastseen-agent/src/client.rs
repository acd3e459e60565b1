//! HTTP client for the lastseen presence service
//!
//! Two exchanges are supported: `authenticate` trades an email/password
//! for a token, `refresh` trades the current token for a rotated one and
//! records the user as seen. Every outcome is classified here, once, into
//! an [`ExchangeResult`]; what a given outcome *means* depends on which
//! exchange produced it and is decided by the [`Agent`](crate::Agent).

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Serialize;

use lastseen_core::config::LastseenConfig;
use lastseen_core::{Credential, Token};

use crate::error::AgentError;

/// Outcome of one presence exchange
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeResult {
    /// 2xx with a token body; the token replaces the stored one
    Success(Token),
    /// 401
    AuthFailure,
    /// Any non-2xx status that is neither 401 nor 5xx (402, 404, ...)
    NotFound { status: u16 },
    /// 5xx, or a 2xx whose body is not a token
    ServerError { status: u16 },
    /// Connection failure, timeout or truncated response
    TransportError { reason: String },
}

impl ExchangeResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Map an HTTP status and body onto an [`ExchangeResult`]
pub fn classify_status(status: u16, body: &str) -> ExchangeResult {
    match status {
        200..=299 => match Token::from_json(body) {
            Ok(token) => ExchangeResult::Success(token),
            Err(e) => {
                tracing::warn!("Server answered {} without a usable token: {}", status, e);
                ExchangeResult::ServerError { status }
            }
        },
        401 => ExchangeResult::AuthFailure,
        500..=599 => ExchangeResult::ServerError { status },
        _ => ExchangeResult::NotFound { status },
    }
}

/// The two remote exchanges the agent depends on
#[async_trait]
pub trait PresenceApi: Send + Sync {
    /// Log in with credentials and obtain a fresh token
    async fn authenticate(&self, credential: &Credential) -> ExchangeResult;

    /// Record presence and rotate the token
    async fn refresh(&self, token: &Token) -> ExchangeResult;
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    token: &'a str,
}

/// reqwest-backed [`PresenceApi`]
#[derive(Debug, Clone)]
pub struct PresenceClient {
    http: reqwest::Client,
    login_url: String,
    refresh_url: String,
}

impl PresenceClient {
    /// Build a client for the endpoints in `config`
    ///
    /// Every request is bounded by `config.request_timeout`.
    pub fn new(config: &LastseenConfig) -> Result<Self, AgentError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("lastseen-cli/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            login_url: config.login_url(),
            refresh_url: config.refresh_url(),
        })
    }

    async fn post<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> ExchangeResult {
        let response = match self
            .http
            .post(url)
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return transport_error(url, e),
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(text) => {
                tracing::debug!("POST {} -> {}", url, status);
                classify_status(status, &text)
            }
            Err(e) => transport_error(url, e),
        }
    }
}

#[async_trait]
impl PresenceApi for PresenceClient {
    async fn authenticate(&self, credential: &Credential) -> ExchangeResult {
        self.post(&self.login_url, credential).await
    }

    async fn refresh(&self, token: &Token) -> ExchangeResult {
        let body = RefreshRequest {
            token: &token.access_token,
        };
        self.post(&self.refresh_url, &body).await
    }
}

fn transport_error(url: &str, e: reqwest::Error) -> ExchangeResult {
    let reason = if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        format!("could not connect: {}", e)
    } else {
        e.to_string()
    };
    tracing::debug!("POST {} failed: {}", url, reason);
    ExchangeResult::TransportError { reason }
}
