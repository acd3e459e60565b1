//! lastseen CLI
//!
//! Keeps the user's lastseen.me "last seen" time current:
//! - `config` logs in and stores a token
//! - `run` records presence once
//! - `daemon` records presence every time the screen locks

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};

use lastseen_agent::AgentError;
use lastseen_cli::commands::{self, Settings};
use lastseen_cli::logging;
use lastseen_cli::output::{print_error, print_error_chain};
use lastseen_cli::prompt::is_interrupt;

const GOODBYE: &str = "Okay, bye. Feel free to try again later.";

#[derive(Parser)]
#[command(name = "lastseen")]
#[command(author, version, about = "Keep your lastseen.me time up to date")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to settings file (default: ~/.lastseen/settings.toml)
    #[arg(short, long, global = true)]
    settings: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store a token, replacing any previous one
    #[command(long_flag = "config")]
    Config,

    /// Update your lastseen time once, logging in first if needed
    #[command(long_flag = "run")]
    Run,

    /// Start the daemon that updates your lastseen time on every screen lock
    #[command(long_flag = "daemon")]
    Daemon {
        /// Run in foreground (don't detach)
        #[arg(short, long)]
        foreground: bool,
    },
}

impl Cli {
    /// Global flags for a re-spawned copy of this process
    fn forwarded_args(&self) -> Result<Vec<OsString>> {
        let mut args = Vec::new();
        if let Some(path) = &self.settings {
            let path = if path.is_absolute() {
                path.clone()
            } else {
                std::env::current_dir()
                    .context("Failed to resolve settings path")?
                    .join(path)
            };
            args.push(OsString::from("--settings"));
            args.push(path.into_os_string());
        }
        if self.quiet {
            args.push(OsString::from("--quiet"));
        }
        for _ in 0..self.verbose {
            args.push(OsString::from("--verbose"));
        }
        Ok(args)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let Some(command) = &cli.command else {
        let _ = Cli::command().print_help();
        return ExitCode::SUCCESS;
    };

    let settings = match Settings::load(cli.settings.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            print_error_chain(&e);
            return ExitCode::FAILURE;
        }
    };

    let _logging = logging::init(
        logging::console_level(cli.quiet, cli.verbose),
        Some(&settings.config.log_path()),
    );
    tracing::info!("running lastseen cli");

    match execute(&cli, command, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if was_interrupted(&e) => {
            println!("\n\n{}", GOODBYE);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            if settings.is_testing() {
                print_error_chain(&e);
            } else {
                print_error(&e.to_string());
            }
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: &Cli, command: &Commands, settings: &Settings) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    match command {
        Commands::Config => runtime.block_on(commands::config_command(settings)),
        Commands::Run => runtime.block_on(commands::run_command(settings)),
        Commands::Daemon { foreground: true } => {
            runtime.block_on(commands::run_foreground(settings))
        }
        Commands::Daemon { foreground: false } => {
            commands::daemon_command(settings, &cli.forwarded_args()?)
        }
    }
}

/// Ctrl+C at a credential prompt
fn was_interrupted(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        if let Some(AgentError::Prompt(e)) = cause.downcast_ref::<AgentError>() {
            return is_interrupt(e);
        }
        cause
            .downcast_ref::<std::io::Error>()
            .is_some_and(is_interrupt)
    })
}
