//! Daemon configuration.
//!
//! All on-disk artifacts (socket, pidfile, log) live in one per-user
//! directory, `$XDG_RUNTIME_DIR/tomato` when available and the system temp
//! directory otherwise.

use std::path::{Path, PathBuf};

use crate::types::TimerConfig;

/// Name of the directory holding the daemon's runtime files.
pub const APP_DIR: &str = "tomato";

/// Socket file name
const SOCKET_FILE: &str = "tomato.sock";

/// Pidfile name
const PID_FILE: &str = "tomato.pid";

/// Log file name
const LOG_FILE: &str = "tomato.log";

/// Returns the directory holding the daemon's runtime files.
pub fn runtime_dir() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}

/// Default socket path.
pub fn default_socket_path() -> PathBuf {
    runtime_dir().join(SOCKET_FILE)
}

/// Default pidfile path.
pub fn default_pid_file() -> PathBuf {
    runtime_dir().join(PID_FILE)
}

/// Default log file path.
pub fn default_log_file() -> PathBuf {
    runtime_dir().join(LOG_FILE)
}

// ============================================================================
// DaemonConfig
// ============================================================================

/// Everything the daemon needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Unix socket the IPC server listens on
    pub socket_path: PathBuf,
    /// Pidfile marking the live daemon
    pub pid_file: PathBuf,
    /// File the daemon writes its logs to
    pub log_file: PathBuf,
    /// Timer settings
    pub timer: TimerConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            pid_file: default_pid_file(),
            log_file: default_log_file(),
            timer: TimerConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Places the socket, pidfile and log file inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            socket_path: dir.join(SOCKET_FILE),
            pid_file: dir.join(PID_FILE),
            log_file: dir.join(LOG_FILE),
            timer: TimerConfig::default(),
        }
    }

    /// Sets the socket path.
    pub fn with_socket_path(mut self, path: PathBuf) -> Self {
        self.socket_path = path;
        self
    }

    /// Sets the pidfile path.
    pub fn with_pid_file(mut self, path: PathBuf) -> Self {
        self.pid_file = path;
        self
    }

    /// Sets the timer configuration.
    pub fn with_timer(mut self, timer: TimerConfig) -> Self {
        self.timer = timer;
        self
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.socket_path == self.pid_file {
            return Err("socket path and pidfile must differ".to_string());
        }
        self.timer.validate()
    }
}

// ============================================================================
// Tests
// ============================================================================
