//! Pidfile handling for the daemon.
//!
//! The pidfile marks a live daemon so that client commands can check for it
//! before connecting, and so `tomato kill` knows whom to signal.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Pidfile error type.
#[derive(Debug, Error)]
pub enum PidFileError {
    /// Another live process owns the pidfile.
    #[error("tomato daemon is already running (pid {0})")]
    AlreadyRunning(u32),

    /// The pidfile does not contain a pid.
    #[error("Invalid pidfile contents in {0:?}")]
    Invalid(PathBuf),

    /// Reading or writing the pidfile failed.
    #[error("Pidfile I/O error on {path:?}: {source}")]
    Io {
        /// Pidfile path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

/// Result type for pidfile operations.
pub type Result<T> = std::result::Result<T, PidFileError>;

// ============================================================================
// PidFile
// ============================================================================

/// Pidfile owned by the running daemon; removed on release or drop.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Writes the current process id to `path`.
    ///
    /// A pidfile naming a dead process, or holding garbage, is overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`PidFileError::AlreadyRunning`] if the file names a live
    /// process other than this one, or an I/O error if it cannot be written.
    pub fn acquire(path: &Path) -> Result<Self> {
        let own_pid = std::process::id();

        match read_pid(path) {
            Ok(Some(pid)) if pid != own_pid && is_process_alive(pid) => {
                return Err(PidFileError::AlreadyRunning(pid));
            }
            Ok(Some(pid)) => tracing::debug!(pid, "overwriting stale pidfile"),
            Ok(None) => {}
            Err(PidFileError::Invalid(_)) => tracing::warn!("overwriting invalid pidfile {:?}", path),
            Err(e) => return Err(e),
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| PidFileError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        std::fs::write(path, format!("{}\n", own_pid)).map_err(|source| PidFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Returns the pidfile path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the pidfile.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove pidfile {:?}: {}", self.path, e);
            }
        }
    }
}

// ============================================================================
// Process helpers
// ============================================================================

/// Reads the pid stored in `path`.
///
/// Returns `Ok(None)` if the file does not exist.
///
/// # Errors
///
/// Returns [`PidFileError::Invalid`] if the contents are not a pid.
pub fn read_pid(path: &Path) -> Result<Option<u32>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PidFileError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    contents
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|pid| *pid > 0)
        .map(Some)
        .ok_or_else(|| PidFileError::Invalid(path.to_path_buf()))
}

/// Returns true if a process with the given pid exists.
pub fn is_process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }

    // SAFETY: signal 0 performs the permission and existence checks only.
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }

    // The process exists but belongs to someone else.
    io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Returns the daemon's pid if the pidfile names a live process.
pub fn daemon_pid(path: &Path) -> Option<u32> {
    read_pid(path)
        .ok()
        .flatten()
        .filter(|pid| is_process_alive(*pid))
}

/// Sends SIGTERM to the process with the given pid.
///
/// # Errors
///
/// Returns the OS error if the signal cannot be delivered.
pub fn terminate(pid: u32) -> io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;

    // SAFETY: plain kill(2) call with a validated pid.
    if unsafe { libc::kill(pid, libc::SIGTERM) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

// ============================================================================
// Tests
// ============================================================================
