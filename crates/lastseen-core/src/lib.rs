//! lastseen-core: Core storage and configuration for lastseen
//!
//! This crate owns everything that lives on disk: the settings file, the
//! rotated access token and the pidfile that keeps a single daemon alive
//! per user.

pub mod config;
pub mod error;
pub mod pidfile;
pub mod token;

pub use error::{ConfigError, LockError, TokenStoreError};
pub use pidfile::{Acquire, SingletonGuard};
pub use token::{Credential, Token, TokenStore};
