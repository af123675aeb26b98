//! Daemon module for the focus timer.
//!
//! This module contains the core daemon functionality:
//! - `timer`: Timer state machine with scheduled expiry
//! - `ipc`: Unix socket server and request dispatch
//! - `pidfile`: Pidfile control and process liveness checks
//! - `server`: Process lifecycle and graceful shutdown

pub mod ipc;
pub mod pidfile;
pub mod server;
pub mod timer;

pub use ipc::{IpcServer, RequestHandler};
pub use server::run_daemon;
pub use timer::{FocusTimer, TimerError, TimerEvent};
