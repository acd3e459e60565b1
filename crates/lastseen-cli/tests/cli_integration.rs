//! CLI integration tests
//!
//! Tests the lastseen binary using assert_cmd. Every test points HOME and
//! the settings file at a scratch directory so nothing touches the real
//! `~/.lastseen`.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn lastseen(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("lastseen")
        .expect("Failed to locate lastseen binary - ensure it's built before running tests");
    cmd.env("HOME", home)
        .env_remove("LASTSEEN_TESTING")
        .env_remove("RUST_LOG");
    cmd
}

/// Settings file aiming at an address nothing listens on
fn write_settings(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("settings.toml");
    std::fs::write(
        &path,
        format!(
            "base_url = \"http://127.0.0.1:9\"\nrequest_timeout = 2\nstate_dir = {:?}\n",
            dir.join("state").display().to_string()
        ),
    )
    .unwrap();
    path
}

#[test]
fn test_cli_help() {
    let home = tempfile::tempdir().unwrap();
    lastseen(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("lastseen"))
        .stdout(predicate::str::contains("Keep your lastseen.me time up to date"));
}

#[test]
fn test_cli_version() {
    let home = tempfile::tempdir().unwrap();
    lastseen(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("lastseen"));
}

#[test]
fn test_no_arguments_prints_usage() {
    let home = tempfile::tempdir().unwrap();
    lastseen(home.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("daemon"));
}

#[test]
fn test_unknown_argument_fails() {
    let home = tempfile::tempdir().unwrap();
    lastseen(home.path())
        .arg("--frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_unknown_subcommand_fails() {
    let home = tempfile::tempdir().unwrap();
    lastseen(home.path()).arg("status").assert().failure();
}

#[test]
fn test_cli_daemon_help() {
    let home = tempfile::tempdir().unwrap();
    lastseen(home.path())
        .args(["daemon", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("screen lock"))
        .stdout(predicate::str::contains("--foreground"));
}

#[test]
fn test_cli_run_help() {
    let home = tempfile::tempdir().unwrap();
    lastseen(home.path())
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("once"));
}

#[test]
fn test_missing_explicit_settings_fails() {
    let home = tempfile::tempdir().unwrap();
    lastseen(home.path())
        .args(["--settings", "/nonexistent/settings.toml", "run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load settings"));
}

#[test]
fn test_daemon_without_token_fails() {
    let home = tempfile::tempdir().unwrap();
    let settings = write_settings(home.path());
    lastseen(home.path())
        .arg("--settings")
        .arg(&settings)
        .arg("daemon")
        .assert()
        .failure()
        .stderr(predicate::str::contains("lastseen config"));
    assert!(!home.path().join("state").join("lastseen.pid").exists());
}

#[test]
fn test_daemon_already_running_is_not_an_error() {
    let home = tempfile::tempdir().unwrap();
    let settings = write_settings(home.path());
    let state = home.path().join("state");
    std::fs::create_dir_all(&state).unwrap();
    // The test process itself is alive for the duration of the check
    let holder = std::process::id().to_string();
    std::fs::write(state.join("lastseen.pid"), &holder).unwrap();

    lastseen(home.path())
        .arg("--settings")
        .arg(&settings)
        .arg("daemon")
        .assert()
        .success()
        .stdout(predicate::str::contains("already running"));

    assert_eq!(
        std::fs::read_to_string(state.join("lastseen.pid")).unwrap(),
        holder
    );
}

#[test]
fn test_run_with_unreachable_server_keeps_token() {
    let home = tempfile::tempdir().unwrap();
    let settings = write_settings(home.path());
    let state = home.path().join("state");
    std::fs::create_dir_all(&state).unwrap();
    std::fs::write(state.join("config"), r#"{"access_token":"t1"}"#).unwrap();

    lastseen(home.path())
        .arg("--settings")
        .arg(&settings)
        .arg("run")
        .assert()
        .failure();

    assert_eq!(
        std::fs::read_to_string(state.join("config")).unwrap(),
        r#"{"access_token":"t1"}"#
    );
    assert!(state.join("lastseen.log").exists());
}

#[cfg(unix)]
#[test]
fn test_sigterm_during_startup_ping_releases_pidfile() {
    use std::net::TcpListener;
    use std::process::Stdio;
    use std::time::{Duration, Instant};

    // Accepts the startup ping and never answers it
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let home = tempfile::tempdir().unwrap();
    let state = home.path().join("state");
    std::fs::create_dir_all(&state).unwrap();
    std::fs::write(state.join("config"), r#"{"access_token":"t1"}"#).unwrap();
    let settings = home.path().join("settings.toml");
    std::fs::write(
        &settings,
        format!(
            "base_url = \"http://{}\"\nrequest_timeout = 60\nstate_dir = {:?}\n",
            addr,
            state.display().to_string()
        ),
    )
    .unwrap();

    let mut child = std::process::Command::new(assert_cmd::cargo::cargo_bin("lastseen"))
        .env("HOME", home.path())
        .env_remove("LASTSEEN_TESTING")
        .arg("--settings")
        .arg(&settings)
        .args(["daemon", "--foreground"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    // The ping is only sent after the pidfile is claimed and the handlers
    // are installed
    listener.set_nonblocking(true).unwrap();
    let deadline = Instant::now() + Duration::from_secs(10);
    let _held = loop {
        match listener.accept() {
            Ok((stream, _)) => break stream,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                if Instant::now() > deadline {
                    let _ = child.kill();
                    panic!("daemon never sent the startup ping");
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(e) => panic!("accept failed: {}", e),
        }
    };
    let pid_path = state.join("lastseen.pid");
    assert_eq!(
        std::fs::read_to_string(&pid_path).unwrap().trim(),
        child.id().to_string()
    );

    // SAFETY: signalling our own child process
    unsafe {
        libc::kill(child.id() as libc::pid_t, libc::SIGTERM);
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() > deadline {
            let _ = child.kill();
            panic!("daemon did not exit after SIGTERM");
        }
        std::thread::sleep(Duration::from_millis(20));
    };

    assert!(status.success(), "unexpected exit: {:?}", status);
    assert!(!pid_path.exists());
}
