//! Core data types for the focus timer.
//!
//! This module defines the data structures used for:
//! - Timer configuration with validation
//! - IPC request/response serialization

use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Default focus duration in minutes
pub const DEFAULT_FOCUS_MINUTES: u64 = 25;

/// Upper bound accepted for the focus duration in minutes
pub const MAX_FOCUS_MINUTES: u64 = 120;

// ============================================================================
// TimerConfig
// ============================================================================

/// Configuration for the focus timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    /// Length of one countdown interval
    pub focus_duration: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            focus_duration: Duration::from_secs(DEFAULT_FOCUS_MINUTES * 60),
        }
    }
}

impl TimerConfig {
    /// Creates a configuration with the given focus duration.
    pub fn new(focus_duration: Duration) -> Self {
        Self { focus_duration }
    }

    /// Returns a copy of this configuration with the focus duration set in minutes.
    pub fn with_focus_minutes(mut self, minutes: u64) -> Self {
        self.focus_duration = Duration::from_secs(minutes * 60);
        self
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.focus_duration.is_zero() {
            return Err("focus duration must be greater than zero".to_string());
        }
        if self.focus_duration > Duration::from_secs(MAX_FOCUS_MINUTES * 60) {
            return Err(format!(
                "focus duration must be at most {} minutes",
                MAX_FOCUS_MINUTES
            ));
        }
        Ok(())
    }
}

// ============================================================================
// IPC Types
// ============================================================================

/// IPC request from client to daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum IpcRequest {
    /// Start a new focus interval
    Start,
    /// Stop the running interval
    Stop,
    /// Query the time left on the clock
    Remaining,
    /// Query whether a timer is running
    Running,
}

/// Machine-readable error codes carried by error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Start was called while a timer was already running
    AlreadyRunning,
    /// The request could not be decoded
    InvalidRequest,
}

/// Response data for IPC responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseData {
    /// Wall-clock end of the running interval
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Local>>,
    /// Remaining time in milliseconds
    #[serde(rename = "remainingMillis", skip_serializing_if = "Option::is_none")]
    pub remaining_millis: Option<u64>,
    /// Whether a timer is running
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running: Option<bool>,
}

impl ResponseData {
    /// Creates response data carrying a deadline.
    pub fn with_deadline(mut self, deadline: DateTime<Local>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Creates response data carrying a remaining duration.
    pub fn with_remaining(mut self, remaining: Duration) -> Self {
        self.remaining_millis = Some(u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Creates response data carrying the running flag.
    pub fn with_running(mut self, running: bool) -> Self {
        self.running = Some(running);
        self
    }

    /// Returns the remaining time as a `Duration`, if present.
    pub fn remaining(&self) -> Option<Duration> {
        self.remaining_millis.map(Duration::from_millis)
    }
}

/// IPC response from daemon to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpcResponse {
    /// Response status ("success" or "error")
    pub status: String,
    /// Human-readable message
    pub message: String,
    /// Error code for error responses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    /// Optional response data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

impl IpcResponse {
    /// Creates a success response.
    pub fn success(message: impl Into<String>, data: Option<ResponseData>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            code: None,
            data,
        }
    }

    /// Creates an error response.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            code: Some(code),
            data: None,
        }
    }

    /// Attaches data to the response.
    pub fn with_data(mut self, data: ResponseData) -> Self {
        self.data = Some(data);
        self
    }

    /// Returns true if this is a success response.
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

// ============================================================================
// Tests
// ============================================================================
