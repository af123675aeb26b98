//! Daemon process lifecycle.
//!
//! Owns the pidfile, the IPC server and the timer for the lifetime of the
//! process, and tears them down on SIGINT/SIGTERM.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

use crate::config::DaemonConfig;

use super::ipc::{IpcServer, RequestHandler};
use super::pidfile::PidFile;
use super::timer::{FocusTimer, TimerEvent};

/// Runs the daemon until a shutdown signal arrives.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, another daemon holds
/// the pidfile, the socket cannot be bound, or accepting connections fails.
pub async fn run_daemon(config: DaemonConfig) -> Result<()> {
    config.validate().map_err(anyhow::Error::msg)?;

    let pidfile = PidFile::acquire(&config.pid_file)?;

    // Install handlers before the socket exists so no signal is missed.
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    let server = IpcServer::new(&config.socket_path)?;
    tracing::info!(
        socket = ?config.socket_path,
        pid = std::process::id(),
        focus_secs = config.timer.focus_duration.as_secs(),
        "starting server"
    );

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let timer = Arc::new(FocusTimer::new(config.timer, event_tx));
    let events = tokio::spawn(log_events(event_rx));

    let shutdown = async move {
        tokio::select! {
            _ = sigint.recv() => tracing::info!("received SIGINT"),
            _ = sigterm.recv() => tracing::info!("received SIGTERM"),
        }
    };

    let result = serve(&server, RequestHandler::new(Arc::clone(&timer)), shutdown).await;

    tracing::info!("shutting down");
    // Cancels a pending expiry before the runtime goes away.
    timer.stop().await;
    events.abort();

    tracing::info!("removing socket {:?}", server.socket_path());
    drop(server);
    tracing::info!("removing pidfile {:?}", pidfile.path());
    pidfile.release();

    result
}

/// Accepts connections until `shutdown` resolves, serving each on its own task.
///
/// # Errors
///
/// Returns an error if accepting a connection fails.
pub async fn serve<F>(server: &IpcServer, handler: RequestHandler, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => return Ok(()),
            accepted = server.accept() => {
                let stream = accepted?;
                let handler = handler.clone();
                tokio::spawn(async move {
                    if let Err(e) = handler.serve(stream).await {
                        tracing::warn!("connection failed: {:#}", e);
                    }
                });
            }
        }
    }
}

/// Logs timer events until the channel closes.
async fn log_events(mut events: mpsc::UnboundedReceiver<TimerEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            TimerEvent::Started { deadline } => {
                tracing::info!("timer will finish at {}", deadline.format("%H:%M"));
            }
            TimerEvent::Stopped { remaining } => {
                tracing::info!("timer stopped with {}s left", remaining.as_secs());
            }
            TimerEvent::Expired => tracing::info!("time is up"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixStream;
    use tokio::sync::oneshot;

    use crate::types::{IpcResponse, TimerConfig};

    async fn request(path: &std::path::Path, payload: &[u8]) -> IpcResponse {
        let mut stream = UnixStream::connect(path).await.unwrap();
        stream.write_all(payload).await.unwrap();
        stream.shutdown().await.unwrap();

        let mut buffer = Vec::new();
        stream.read_to_end(&mut buffer).await.unwrap();
        serde_json::from_slice(&buffer).unwrap()
    }

    #[tokio::test]
    async fn test_serve_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("serve.sock");
        let server = IpcServer::new(&socket_path).unwrap();

        let (tx, _rx) = mpsc::unbounded_channel();
        let timer = Arc::new(FocusTimer::new(TimerConfig::default(), tx));
        let handler = RequestHandler::new(Arc::clone(&timer));

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let client_path = socket_path.clone();
        let client = tokio::spawn(async move {
            let started = request(&client_path, br#"{"command":"start"}"#).await;
            let running = request(&client_path, br#"{"command":"running"}"#).await;
            let _ = stop_tx.send(());
            (started, running)
        });

        serve(&server, handler, async {
            let _ = stop_rx.await;
        })
        .await
        .unwrap();

        let (started, running) = client.await.unwrap();
        assert!(started.is_success());
        assert_eq!(running.data.unwrap().running, Some(true));
        assert!(timer.is_running().await);
    }

    #[tokio::test]
    async fn test_run_daemon_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            DaemonConfig::in_dir(dir.path()).with_timer(TimerConfig::new(Duration::ZERO));

        let result = run_daemon(config).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_run_daemon_refuses_second_instance() {
        let dir = tempfile::tempdir().unwrap();
        let config = DaemonConfig::in_dir(dir.path());
        let mut child = std::process::Command::new("sleep").arg("5").spawn().unwrap();
        std::fs::write(&config.pid_file, child.id().to_string()).unwrap();

        let result = run_daemon(config.clone()).await;
        let _ = child.kill();
        let _ = child.wait();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("already running"));
        assert!(!config.socket_path.exists());
    }
}
