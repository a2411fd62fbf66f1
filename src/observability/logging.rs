//! Logging initialization for `ackline`.
//!
//! The default filter keeps third-party crates at `warn` while alarm
//! lifecycle logs (trigger, tier activation, acknowledgment, reset) stay
//! visible even without `-v`. `ACKLINE_LOG_LEVEL` replaces the filter
//! entirely.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

use crate::cli::args::{Cli, ColorChoice};

/// Environment variable holding a full `EnvFilter` directive.
pub const LOG_LEVEL_ENV: &str = "ACKLINE_LOG_LEVEL";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable format with optional ANSI colors.
    #[default]
    Human,
    /// Newline-delimited JSON for log shippers.
    Json,
}

/// How the subscriber is set up, resolved from the global CLI flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSettings {
    /// Output format.
    pub format: LogFormat,
    /// `-v` count.
    pub verbosity: u8,
    /// `-q`: errors only.
    pub quiet: bool,
    /// ANSI color choice.
    pub color: ColorChoice,
}

impl LogSettings {
    /// Settings from the global flags.
    #[must_use]
    pub const fn from_cli(cli: &Cli) -> Self {
        Self {
            format: if cli.log_json {
                LogFormat::Json
            } else {
                LogFormat::Human
            },
            verbosity: cli.verbose,
            quiet: cli.quiet,
            color: cli.color,
        }
    }

    /// Filter directive used when `ACKLINE_LOG_LEVEL` is unset.
    ///
    /// - quiet → `error`
    /// - 0 → alarm lifecycle at `info`, everything else `warn`
    /// - 1 → all of `ackline` at `info`
    /// - 2 → `ackline` at `debug`, dependencies at `info`
    /// - 3+ → `ackline` at `trace`, dependencies at `debug`
    #[must_use]
    pub const fn directive(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbosity {
            0 => "warn,ackline::escalation=info",
            1 => "warn,ackline=info",
            2 => "info,ackline=debug",
            _ => "debug,ackline=trace",
        }
    }

    fn use_ansi(&self) -> bool {
        match self.color {
            ColorChoice::Auto => {
                std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
            }
            ColorChoice::Always => true,
            ColorChoice::Never => false,
        }
    }
}

/// Installs the global tracing subscriber on stderr.
///
/// A second call is a no-op.
pub fn init_logging(settings: &LogSettings) {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .unwrap_or_else(|_| EnvFilter::new(settings.directive()));
    let show_target = settings.verbosity >= 2;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(show_target)
        .with_writer(std::io::stderr);

    let _ = match settings.format {
        LogFormat::Human => builder.with_ansi(settings.use_ansi()).try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
