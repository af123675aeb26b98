//! Command definitions for the focus timer CLI.
//!
//! Uses clap derive macro for argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{default_pid_file, default_socket_path, DaemonConfig};
use crate::types::{TimerConfig, DEFAULT_FOCUS_MINUTES, MAX_FOCUS_MINUTES};

// ============================================================================
// CLI Structure
// ============================================================================

/// Focus timer CLI
#[derive(Parser, Debug)]
#[command(
    name = "tomato",
    version,
    about = "A focus timer that runs in the background",
    long_about = "Start, stop and query a single focus timer kept by a background daemon.\n\
                  Run `tomato daemon` once, then use the other commands from any shell.",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Print bare values suitable for scripts
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Daemon socket path
    #[arg(long, global = true, env = "TOMATO_SOCKET", default_value_os_t = default_socket_path())]
    pub socket: PathBuf,

    /// Daemon pidfile path
    #[arg(long, global = true, env = "TOMATO_PID_FILE", default_value_os_t = default_pid_file())]
    pub pid_file: PathBuf,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start a new focus interval
    Start,

    /// Stop the running interval
    Stop,

    /// Show the time left on the clock
    Remaining,

    /// Exit successfully if a timer is running
    Running,

    /// Exit successfully if the daemon is up
    Up,

    /// Terminate the daemon
    Kill,

    /// Run the daemon in the foreground
    #[command(alias = "server")]
    Daemon(DaemonArgs),

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Daemon Command Arguments
// ============================================================================

/// Arguments for the daemon command
#[derive(Args, Debug, Clone)]
pub struct DaemonArgs {
    /// Focus duration in minutes (1-120)
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_FOCUS_MINUTES,
        value_parser = clap::value_parser!(u64).range(1..=MAX_FOCUS_MINUTES)
    )]
    pub focus: u64,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Default for DaemonArgs {
    fn default() -> Self {
        Self {
            focus: DEFAULT_FOCUS_MINUTES,
            log_file: None,
        }
    }
}

impl Cli {
    /// Builds the daemon configuration from the global flags and daemon arguments.
    pub fn daemon_config(&self, args: &DaemonArgs) -> DaemonConfig {
        let mut config = DaemonConfig::default()
            .with_socket_path(self.socket.clone())
            .with_pid_file(self.pid_file.clone())
            .with_timer(TimerConfig::default().with_focus_minutes(args.focus));

        if let Some(log_file) = &args.log_file {
            config.log_file = log_file.clone();
        }

        config
    }
}

// ============================================================================
// Tests
// ============================================================================
