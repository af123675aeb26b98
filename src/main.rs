//! tomato - a focus timer kept by a background daemon
//!
//! Run `tomato daemon` once; `start`, `stop`, `remaining` and `running`
//! then talk to it over a Unix socket.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};

use tomato::cli::{Cli, Commands, Display, IpcClient};
use tomato::daemon::{pidfile, run_daemon};

/// Exit code for `running` and `up` when the answer is no
const NOT_RUNNING_EXIT_CODE: u8 = 33;

/// Main entry point
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Daemon(args)) => {
            let log_file = args
                .log_file
                .clone()
                .unwrap_or_else(tomato::config::default_log_file);
            init_daemon_tracing(&log_file, cli.verbose);
        }
        _ => init_tracing(cli.verbose),
    }

    match execute(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            Display::show_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

/// Initializes the tracing subscriber for CLI commands.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

/// Initializes the tracing subscriber for the daemon, writing to `log_file`.
fn init_daemon_tracing(log_file: &Path, verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if let Some(parent) = log_file.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file);

    match file {
        Ok(file) => {
            eprintln!("Will write logs to: {}", log_file.display());
            fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        Err(e) => {
            fmt().with_env_filter(filter).with_target(false).init();
            tracing::warn!("Failed to open log file {:?}: {}", log_file, e);
        }
    }
}

/// Executes the CLI command and returns the process exit status.
async fn execute(cli: Cli) -> Result<u8> {
    tracing::debug!(socket = ?cli.socket, pid_file = ?cli.pid_file, "parsed arguments");

    let display = Display::new(cli.quiet);

    match &cli.command {
        Some(Commands::Start) => {
            let deadline = connect(&cli)?.start().await?;
            display.show_start_success(&deadline);
        }
        Some(Commands::Stop) => {
            let remaining = connect(&cli)?.stop().await?;
            display.show_stop_success(remaining);
        }
        Some(Commands::Remaining) => {
            let remaining = connect(&cli)?.remaining().await?;
            display.show_remaining(remaining);
        }
        Some(Commands::Running) => {
            if !connect(&cli)?.is_running().await? {
                return Ok(NOT_RUNNING_EXIT_CODE);
            }
        }
        Some(Commands::Up) => {
            if pidfile::daemon_pid(&cli.pid_file).is_none() {
                return Ok(NOT_RUNNING_EXIT_CODE);
            }
        }
        Some(Commands::Kill) => {
            let pid = pidfile::daemon_pid(&cli.pid_file).context("tomato daemon is not running")?;
            pidfile::terminate(pid)
                .with_context(|| format!("Failed to signal daemon (pid {})", pid))?;
            tracing::info!(pid, "sent SIGTERM to daemon");
        }
        Some(Commands::Daemon(args)) => {
            run_daemon(cli.daemon_config(args)).await?;
        }
        Some(Commands::Completions { shell }) => {
            generate_completions(*shell);
        }
        None => {
            // No command provided, show help
            Cli::command().print_help()?;
        }
    }

    Ok(0)
}

/// Returns a client for the daemon, after checking that the daemon is alive.
fn connect(cli: &Cli) -> Result<IpcClient> {
    if pidfile::daemon_pid(&cli.pid_file).is_none() {
        anyhow::bail!("tomato daemon is not running; start it with `tomato daemon`");
    }

    Ok(IpcClient::with_socket_path(cli.socket.clone()))
}

/// Generates shell completion scripts.
fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

// ============================================================================
// Tests
// ============================================================================
