//! IPC Client for communicating with the focus timer daemon.
//!
//! This module provides:
//! - Unix Domain Socket client with typed replies
//! - Connection retry logic
//! - Timeout handling

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::config::default_socket_path;
use crate::types::{ErrorCode, IpcRequest, IpcResponse, ResponseData};

// ============================================================================
// Constants
// ============================================================================

/// Connection timeout in seconds
const CONNECTION_TIMEOUT_SECS: u64 = 5;

/// Read/write timeout in seconds
const IO_TIMEOUT_SECS: u64 = 5;

/// Maximum response size in bytes (64KB)
const MAX_RESPONSE_SIZE: usize = 65536;

/// Maximum connection attempts
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds (base delay, multiplied by attempt number)
const RETRY_DELAY_MS: u64 = 200;

// ============================================================================
// DaemonError
// ============================================================================

/// Error reply sent back by the daemon.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct DaemonError {
    /// Machine-readable error code
    pub code: Option<ErrorCode>,
    /// Human-readable message
    pub message: String,
    /// Data attached to the error, such as the running timer's deadline
    pub data: Option<ResponseData>,
}

impl DaemonError {
    /// Returns true if Start was rejected because a timer is running.
    pub fn is_already_running(&self) -> bool {
        self.code == Some(ErrorCode::AlreadyRunning)
    }
}

// ============================================================================
// IpcClient
// ============================================================================

/// IPC client for daemon communication.
#[derive(Debug, Clone)]
pub struct IpcClient {
    /// Socket path
    socket_path: PathBuf,
    /// Connection timeout
    timeout: Duration,
}

impl IpcClient {
    /// Creates a new IPC client with the default socket path.
    pub fn new() -> Self {
        Self::with_socket_path(default_socket_path())
    }

    /// Creates a new IPC client with a custom socket path.
    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: Duration::from_secs(CONNECTION_TIMEOUT_SECS),
        }
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Starts a focus interval and returns when it will finish.
    ///
    /// # Errors
    ///
    /// Fails with a [`DaemonError`] carrying [`ErrorCode::AlreadyRunning`] if a
    /// timer is already running, or with a transport error.
    pub async fn start(&self) -> Result<DateTime<Local>> {
        let data = self.call(IpcRequest::Start).await?;
        data.deadline
            .context("Daemon reply to start is missing the deadline")
    }

    /// Stops the running interval and returns the time that was left.
    pub async fn stop(&self) -> Result<Duration> {
        let data = self.call(IpcRequest::Stop).await?;
        Ok(data.remaining().unwrap_or_default())
    }

    /// Returns the time left on the clock (zero when idle).
    pub async fn remaining(&self) -> Result<Duration> {
        let data = self.call(IpcRequest::Remaining).await?;
        Ok(data.remaining().unwrap_or_default())
    }

    /// Returns whether a timer is running.
    pub async fn is_running(&self) -> Result<bool> {
        let data = self.call(IpcRequest::Running).await?;
        Ok(data.running.unwrap_or(false))
    }

    /// Sends a request and unwraps the success payload.
    async fn call(&self, request: IpcRequest) -> Result<ResponseData> {
        let response = self.send_request(&request).await?;

        if !response.is_success() {
            return Err(DaemonError {
                code: response.code,
                message: response.message,
                data: response.data,
            }
            .into());
        }

        Ok(response.data.unwrap_or_default())
    }

    /// Connects to the daemon, retrying with a linear backoff.
    ///
    /// Only connecting is retried: once a request has been written, a
    /// failure is reported as-is so Start is never sent twice.
    async fn connect_with_retry(&self) -> Result<UnixStream> {
        let mut last_error = None;

        for attempt in 1..=MAX_RETRIES {
            match self.connect().await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    tracing::warn!("connection failed (attempt {}/{}): {:#}", attempt, MAX_RETRIES, e);
                    last_error = Some(e);

                    if attempt < MAX_RETRIES {
                        let delay = Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt));
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("no connection attempt was made")))
    }

    async fn connect(&self) -> Result<UnixStream> {
        timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("Connection timed out")?
            .with_context(|| {
                format!(
                    "Cannot connect to the daemon at {:?}; start it with `tomato daemon`",
                    self.socket_path
                )
            })
    }

    /// Sends a single request to the daemon and returns its raw response.
    async fn send_request(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let mut stream = self.connect_with_retry().await?;

        let request_json = serde_json::to_vec(request).context("Failed to serialize request")?;

        timeout(
            Duration::from_secs(IO_TIMEOUT_SECS),
            stream.write_all(&request_json),
        )
        .await
        .context("Write timed out")?
        .context("Failed to send request")?;

        // Shutdown write side to signal end of request
        stream
            .shutdown()
            .await
            .context("Failed to shut down the write side")?;

        let mut buffer = Vec::with_capacity(256);
        timeout(
            Duration::from_secs(IO_TIMEOUT_SECS),
            (&mut stream)
                .take(MAX_RESPONSE_SIZE as u64)
                .read_to_end(&mut buffer),
        )
        .await
        .context("Read timed out")?
        .context("Failed to receive response")?;

        if buffer.is_empty() {
            anyhow::bail!("The daemon closed the connection without replying");
        }

        serde_json::from_slice(&buffer).context("Failed to parse response")
    }
}

impl Default for IpcClient {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
