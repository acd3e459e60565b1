//! lastseen-agent: Presence agent for lastseen
//!
//! The agent proves the user's presence to the lastseen service. It
//! exchanges the stored token for a fresh one once at startup and again
//! every time the desktop session goes idle (screen lock).

pub mod agent;
pub mod client;
pub mod error;
pub mod idle;

pub use agent::{Agent, AgentState, CredentialPrompt, ExchangeKind, FixedCredentials, Trigger};
pub use client::{ExchangeResult, PresenceApi, PresenceClient};
pub use error::AgentError;
pub use idle::{IdleEvent, IdleEventSource, IdleSubscription};
