//! `ackline` - tiered alarm escalation over SMS

use clap::Parser;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

use ackline::cli::args::Cli;
use ackline::cli::commands;
use ackline::error::ExitCode;
use ackline::observability::{LogSettings, init_logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(&LogSettings::from_cli(&cli));

    let cancel = CancellationToken::new();

    // First signal shuts down gracefully, a second one exits immediately
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => Some(sigterm),
            Err(e) => {
                tracing::warn!(error = %e, "failed to register SIGTERM handler");
                None
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            Some(()) = recv(sigterm.as_mut()) => {}
        }

        eprintln!("\nShutting down gracefully... (press Ctrl+C again to force)");
        shutdown.cancel();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => std::process::exit(ExitCode::INTERRUPTED),
            Some(()) = recv(sigterm.as_mut()) => std::process::exit(ExitCode::TERMINATED),
        }
    });

    let result = commands::dispatch(cli, cancel).await;

    match result {
        Ok(()) => std::process::exit(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

async fn recv(sigterm: Option<&mut tokio::signal::unix::Signal>) -> Option<()> {
    match sigterm {
        Some(sigterm) => sigterm.recv().await,
        None => std::future::pending().await,
    }
}
