//! IPC Server for the focus timer.
//!
//! This module provides Unix Domain Socket IPC functionality:
//! - Server that listens on a Unix socket
//! - Request/response handling for timer commands
//! - Integration with FocusTimer for command execution

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::time::{timeout, Duration};

use crate::types::{ErrorCode, IpcRequest, IpcResponse, ResponseData};

use super::timer::{FocusTimer, TimerError};

// ============================================================================
// Constants
// ============================================================================

/// Maximum request size in bytes (4KB)
const MAX_REQUEST_SIZE: usize = 4096;

/// Read timeout in seconds
const READ_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// IpcError
// ============================================================================

/// IPC-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// Read error
    #[error("Failed to read request: {0}")]
    ReadError(#[source] std::io::Error),

    /// Request could not be decoded
    #[error("Invalid request: {0}")]
    InvalidRequest(#[source] serde_json::Error),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Request too large
    #[error("Request too large (max {MAX_REQUEST_SIZE} bytes)")]
    RequestTooLarge,

    /// Client closed the connection without sending anything
    #[error("Connection closed by client")]
    EmptyRequest,
}

// ============================================================================
// IpcServer
// ============================================================================

/// Unix Domain Socket IPC server.
pub struct IpcServer {
    /// Unix socket listener
    listener: UnixListener,
    /// Socket path (for cleanup)
    socket_path: PathBuf,
}

impl IpcServer {
    /// Creates a new IPC server bound to the specified socket path.
    ///
    /// If the socket file already exists, it will be removed before binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub fn new(socket_path: &Path) -> Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .with_context(|| format!("Failed to remove existing socket: {:?}", socket_path))?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket directory: {:?}", parent))?;
        }

        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("Failed to bind Unix socket: {:?}", socket_path))?;

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
        })
    }

    /// Accepts an incoming client connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be accepted.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .context("Failed to accept connection")?;
        Ok(stream)
    }

    /// Receives and deserializes an IPC request from the stream.
    ///
    /// Reads until the client half-closes its side, bounded by a read
    /// timeout and [`MAX_REQUEST_SIZE`].
    ///
    /// # Errors
    ///
    /// Returns an error if reading or deserialization fails.
    pub async fn receive_request(stream: &mut UnixStream) -> Result<IpcRequest, IpcError> {
        let mut buffer = Vec::with_capacity(256);
        let limit = (MAX_REQUEST_SIZE + 1) as u64;

        let read_result = timeout(
            Duration::from_secs(READ_TIMEOUT_SECS),
            (&mut *stream).take(limit).read_to_end(&mut buffer),
        )
        .await;

        match read_result {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(IpcError::ReadError(e)),
            Err(_) => return Err(IpcError::Timeout),
        }

        if buffer.is_empty() {
            return Err(IpcError::EmptyRequest);
        }
        if buffer.len() > MAX_REQUEST_SIZE {
            return Err(IpcError::RequestTooLarge);
        }

        serde_json::from_slice(&buffer).map_err(IpcError::InvalidRequest)
    }

    /// Serializes and sends an IPC response to the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub async fn send_response(stream: &mut UnixStream, response: &IpcResponse) -> Result<()> {
        let json = serde_json::to_vec(response).context("Failed to serialize IPC response")?;

        stream
            .write_all(&json)
            .await
            .context("Failed to write response")?;
        stream.flush().await.context("Failed to flush response")?;

        Ok(())
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        // Clean up socket file on drop
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

// ============================================================================
// RequestHandler
// ============================================================================

/// Handles IPC requests by dispatching to the FocusTimer.
#[derive(Clone)]
pub struct RequestHandler {
    /// Shared reference to the timer
    timer: Arc<FocusTimer>,
}

impl RequestHandler {
    /// Creates a new request handler for the given timer.
    pub fn new(timer: Arc<FocusTimer>) -> Self {
        Self { timer }
    }

    /// Handles an IPC request and returns the appropriate response.
    pub async fn handle(&self, request: IpcRequest) -> IpcResponse {
        tracing::debug!(?request, "handling request");

        match request {
            IpcRequest::Start => self.handle_start().await,
            IpcRequest::Stop => self.handle_stop().await,
            IpcRequest::Remaining => self.handle_remaining().await,
            IpcRequest::Running => self.handle_running().await,
        }
    }

    /// Serves one connection: a single request followed by a single response.
    ///
    /// Undecodable requests get an `invalid_request` error response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be read or the response cannot be written.
    pub async fn serve(&self, mut stream: UnixStream) -> Result<()> {
        let response = match IpcServer::receive_request(&mut stream).await {
            Ok(request) => self.handle(request).await,
            Err(e @ IpcError::InvalidRequest(_)) | Err(e @ IpcError::RequestTooLarge) => {
                tracing::warn!("rejecting request: {}", e);
                IpcResponse::error(ErrorCode::InvalidRequest, e.to_string())
            }
            Err(e) => return Err(e.into()),
        };

        IpcServer::send_response(&mut stream, &response).await
    }

    /// Handles the start command.
    async fn handle_start(&self) -> IpcResponse {
        match self.timer.start().await {
            Ok(deadline) => IpcResponse::success(
                "timer started",
                Some(
                    ResponseData::default()
                        .with_deadline(deadline)
                        .with_remaining(self.timer.focus_duration())
                        .with_running(true),
                ),
            ),
            Err(e @ TimerError::AlreadyRunning { deadline }) => {
                IpcResponse::error(ErrorCode::AlreadyRunning, e.to_string()).with_data(
                    ResponseData::default()
                        .with_deadline(deadline)
                        .with_running(true),
                )
            }
        }
    }

    /// Handles the stop command.
    async fn handle_stop(&self) -> IpcResponse {
        let remaining = self.timer.stop().await;

        IpcResponse::success(
            "timer stopped",
            Some(
                ResponseData::default()
                    .with_remaining(remaining)
                    .with_running(false),
            ),
        )
    }

    /// Handles the remaining command.
    async fn handle_remaining(&self) -> IpcResponse {
        let remaining = self.timer.remaining().await;
        let running = !remaining.is_zero();

        IpcResponse::success(
            "",
            Some(
                ResponseData::default()
                    .with_remaining(remaining)
                    .with_running(running),
            ),
        )
    }

    /// Handles the running command.
    async fn handle_running(&self) -> IpcResponse {
        let running = self.timer.is_running().await;

        IpcResponse::success("", Some(ResponseData::default().with_running(running)))
    }
}

// ============================================================================
// Tests
// ============================================================================
