//! Focus Timer Library
//!
//! This library provides the core functionality for the `tomato` focus timer.
//! It includes:
//! - Timer state machine with scheduled, cancellable expiry
//! - IPC server/client for daemon-CLI communication
//! - Daemon lifecycle (pidfile, signals, socket cleanup)
//! - CLI command parsing and display utilities
//! - Type definitions for configuration and the wire protocol

pub mod cli;
pub mod config;
pub mod daemon;
pub mod types;

// Re-export commonly used types for convenience
pub use config::DaemonConfig;
pub use daemon::{FocusTimer, TimerError, TimerEvent};
pub use types::{ErrorCode, IpcRequest, IpcResponse, ResponseData, TimerConfig};
