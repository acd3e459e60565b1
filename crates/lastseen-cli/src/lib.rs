//! lastseen-cli: Command-line interface for lastseen
//!
//! Provides the `lastseen` binary: `config` to log in, `run` to record
//! presence once and `daemon` to keep doing it on every screen lock.

pub mod commands;
pub mod logging;
pub mod output;
pub mod prompt;
