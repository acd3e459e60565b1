//! `lastseen daemon`: record presence on every screen lock
//!
//! Without `--foreground` the command only checks that no daemon is
//! running yet and starts a detached copy of itself. The detached copy
//! owns the pidfile for its whole lifetime.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use lastseen_agent::{AgentError, IdleEventSource};
use lastseen_core::pidfile::{is_process_alive, read_pid_file};
use lastseen_core::{Acquire, SingletonGuard};

use crate::commands::Settings;
use crate::output::{print_info, print_success};

/// Start the daemon in the background
///
/// `forward` holds the global flags to hand to the detached process.
pub fn daemon_command(settings: &Settings, forward: &[OsString]) -> Result<()> {
    if let Some(pid) = running_instance(&settings.config.pid_path()) {
        print_info(&format!("lastseen already running (PID {})", pid));
        return Ok(());
    }

    let token_path = settings.config.token_path();
    if !token_path.is_file() {
        return Err(AgentError::ConfigMissing(token_path).into());
    }

    let exe = std::env::current_exe().context("Failed to locate lastseen executable")?;
    let mut cmd = std::process::Command::new(exe);
    cmd.args(forward)
        .arg("daemon")
        .arg("--foreground")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    // Detach from the terminal's process group so its Ctrl+C never arrives
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let child = cmd.spawn().context("Failed to start daemon")?;
    print_success(&format!("lastseen daemon started (PID: {})", child.id()));
    Ok(())
}

/// Run the daemon in this process until SIGINT or SIGTERM
///
/// Signal handlers are installed as soon as the pidfile is claimed, so a
/// signal at any later point still releases it.
pub async fn run_foreground(settings: &Settings) -> Result<()> {
    tracing::info!("starting lastseen daemon");

    let acquired = SingletonGuard::acquire(settings.config.pid_path()).map_err(AgentError::from)?;
    let guard = match acquired {
        Acquire::Acquired(guard) => guard,
        Acquire::AlreadyRunning { pid } => {
            tracing::info!("lastseen already running (PID {}), exiting", pid);
            return Err(AgentError::AlreadyRunning { pid }.into());
        }
    };

    let shutdown = CancellationToken::new();
    install_signal_handler(shutdown.clone())?;

    let result = serve(settings, shutdown).await;

    drop(guard);
    tracing::info!("lastseen daemon stopped");
    result
}

async fn serve(settings: &Settings, shutdown: CancellationToken) -> Result<()> {
    let agent = settings.agent()?;

    tokio::select! {
        _ = shutdown.cancelled() => {
            tracing::info!("Shutdown requested during startup ping");
            return Ok(());
        }
        result = agent.run_once() => {
            if let Err(e) = result {
                tracing::debug!("Startup ping did not complete: {}", e);
            }
        }
    }

    let source = IdleEventSource::new(settings.config.screensaver_interface.as_str());
    let events = tokio::select! {
        _ = shutdown.cancelled() => {
            tracing::info!("Shutdown requested while connecting to the session bus");
            return Ok(());
        }
        subscribed = source.subscribe() => subscribed,
    };
    let events = events
        .map_err(AgentError::from)
        .context("Failed to watch for screen saver signals")?;

    agent.run_event_loop(events, shutdown).await;
    Ok(())
}

/// PID of a live daemon holding the pidfile, if any
fn running_instance(pid_path: &Path) -> Option<u32> {
    read_pid_file(pid_path)
        .ok()
        .flatten()
        .filter(|pid| is_process_alive(*pid))
}

/// Cancel `shutdown` on SIGINT or SIGTERM
///
/// The handlers are registered before this returns.
#[cfg(unix)]
fn install_signal_handler(shutdown: CancellationToken) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => {
                tracing::info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, shutting down");
            }
        }
        shutdown.cancel();
    });
    Ok(())
}

#[cfg(not(unix))]
fn install_signal_handler(shutdown: CancellationToken) -> Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, shutting down");
            shutdown.cancel();
        }
    });
    Ok(())
}
