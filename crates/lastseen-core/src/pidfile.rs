//! PID file utilities for single-instance management
//!
//! The daemon claims `~/.lastseen/lastseen.pid` before it subscribes to
//! idle events. A pidfile naming a process that no longer exists, or
//! holding anything other than a pid, is stale and gets reclaimed rather
//! than wedging every future start.
//!
//! A pid that has been reused by an unrelated live process is reported as
//! [`Acquire::AlreadyRunning`]. Telling the two apart would need the
//! holder's start time in the file.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::LockError;

/// Outcome of [`SingletonGuard::acquire`]
#[derive(Debug)]
pub enum Acquire {
    /// This process now owns the lock
    Acquired(SingletonGuard),
    /// A live process already holds the lock
    AlreadyRunning { pid: u32 },
}

/// Exclusive claim on the pidfile, released when dropped
#[derive(Debug)]
pub struct SingletonGuard {
    path: PathBuf,
    pid: u32,
}

impl SingletonGuard {
    /// Claim the pidfile at `path` for the current process
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Acquire, LockError> {
        Self::acquire_as(path.into(), std::process::id())
    }

    fn acquire_as(path: PathBuf, pid: u32) -> Result<Acquire, LockError> {
        let io_err = |source: io::Error| LockError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        // One reclaim per attempt; a second collision means someone else won
        for _ in 0..2 {
            match create_exclusive(&path, pid) {
                Ok(()) => {
                    tracing::debug!("Acquired pidfile {:?} for PID {}", path, pid);
                    return Ok(Acquire::Acquired(Self {
                        path: path.clone(),
                        pid,
                    }));
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(io_err(e)),
            }

            match read_pid_file(&path) {
                Ok(Some(holder)) if is_process_alive(holder) => {
                    tracing::info!("lastseen already running (PID {})", holder);
                    return Ok(Acquire::AlreadyRunning { pid: holder });
                }
                Ok(Some(holder)) => {
                    tracing::info!("removed stale pid {} from {:?}", holder, path);
                }
                // Vanished between create and read; just retry
                Ok(None) => continue,
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    tracing::info!("removed unreadable pidfile {:?}: {}", path, e);
                }
                Err(e) => return Err(io_err(e)),
            }

            remove_pid_file(&path).map_err(io_err)?;
        }

        Err(LockError::Contended(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl Drop for SingletonGuard {
    fn drop(&mut self) {
        // Never delete a lock that a newer daemon has since claimed
        match read_pid_file(&self.path) {
            Ok(Some(pid)) if pid != self.pid => {
                tracing::warn!(
                    "PID file {:?} now belongs to PID {}, leaving it",
                    self.path,
                    pid
                );
                return;
            }
            _ => {}
        }
        match remove_pid_file(&self.path) {
            Ok(()) => tracing::debug!("Released pidfile {:?}", self.path),
            Err(e) => tracing::warn!("Failed to remove PID file {:?}: {}", self.path, e),
        }
    }
}

fn create_exclusive(path: &Path, pid: u32) -> io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    writeln!(file, "{}", pid)?;
    file.sync_all()
}

/// Read the PID from the PID file
///
/// Returns `Ok(Some(pid))` if the file exists and contains a valid PID,
/// `Ok(None)` if the file doesn't exist, or an `InvalidData` error if the
/// content is not a PID.
pub fn read_pid_file(path: &Path) -> io::Result<Option<u32>> {
    match fs::File::open(path) {
        Ok(mut file) => {
            let mut raw = Vec::new();
            file.read_to_end(&mut raw)?;
            let pid = String::from_utf8_lossy(&raw)
                .trim()
                .parse::<u32>()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            if pid == 0 {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "PID 0"));
            }
            Ok(Some(pid))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Remove the PID file
///
/// Returns `Ok(())` even if the file doesn't exist.
pub fn remove_pid_file(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Check if a process with the given PID is still alive
///
/// Uses kill(pid, 0): success or EPERM means the process exists.
#[cfg(unix)]
pub fn is_process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // SAFETY: signal 0 performs only the existence and permission check
    let result = unsafe { libc::kill(pid, 0) };
    if result == 0 {
        return true;
    }
    io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
pub fn is_process_alive(pid: u32) -> bool {
    pid == std::process::id()
}
