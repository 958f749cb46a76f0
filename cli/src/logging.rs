//! # Structured Logging
//!
//! Initializes the `tracing` subscriber with a pretty or JSON format and
//! `RUST_LOG`-style filtering.
//!
//! Log output goes to stderr. Stdout carries only the JSON that each
//! subcommand prints, so `keel decode-tx ... | jq` keeps working with
//! logging turned up.

use std::io::IsTerminal;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default for `--log-level`, used unless `RUST_LOG` is set.
/// The protocol crate logs every signing retry at debug, so it stays at warn.
pub const DEFAULT_FILTER: &str = "keel=info,keel_protocol=warn";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable output for a terminal.
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Accepts "json" or "pretty" (case-insensitive). Anything else is `Pretty`.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Initialize the global tracing subscriber. Call once, early in `main()`.
///
/// `RUST_LOG` overrides `default_level` when set, e.g.:
///
/// ```text
/// RUST_LOG=keel=debug,keel_protocol=trace
/// ```
pub fn init_logging(default_level: &str, format: LogFormat) {
    let (env_filter, source) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, "RUST_LOG"),
        Err(_) => (EnvFilter::new(default_level), "--log-level"),
    };

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_ansi(std::io::stderr().is_terminal())
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_current_span(false)
                        .with_target(true),
                )
                .init();
        }
    }

    tracing::debug!(?format, filter_from = source, "logging initialized");
}
