//! Logging infrastructure for asbridge
//!
//! Provides unified logging setup using the tracing ecosystem. The
//! runtime is a library embedded in a host application, so output
//! always goes to stderr; the host is expected to own any further
//! routing (to a file, to a journal, ...) via its own `tracing` layers
//! if it wants that.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::{AsbridgeError, Result};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level filter (e.g., "info", "debug", "asbridge_scm=debug,tokio=warn")
    pub filter: String,
    /// Include span events (enter/exit) — useful for tracing the SCM
    /// loop's iteration boundaries.
    pub span_events: bool,
    /// Include file/line in logs
    pub file_line: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: std::env::var("ASBRIDGE_LOG").unwrap_or_else(|_| "info".into()),
            span_events: false,
            file_line: false,
        }
    }
}

impl LogConfig {
    /// Quiet defaults suitable for an embedding application that only
    /// wants warnings and errors surfaced.
    pub fn quiet() -> Self {
        Self {
            filter: std::env::var("ASBRIDGE_LOG").unwrap_or_else(|_| "warn".into()),
            span_events: false,
            file_line: false,
        }
    }

    /// Verbose defaults suitable for development, with span events and
    /// file/line annotations turned on.
    pub fn development() -> Self {
        Self {
            filter: "debug".into(),
            span_events: true,
            file_line: true,
        }
    }
}

/// Initialize logging with default configuration.
///
/// Uses the `ASBRIDGE_LOG` env var for the filter, defaulting to "info".
pub fn init_logging() -> Result<()> {
    init_logging_with_config(LogConfig::default())
}

/// Initialize logging with a custom configuration.
pub fn init_logging_with_config(config: LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| AsbridgeError::config(format!("invalid log filter: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr);

    let fmt_layer = if config.span_events {
        fmt_layer.with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
    } else {
        fmt_layer
    };

    let fmt_layer = if config.file_line {
        fmt_layer.with_file(true).with_line_number(true)
    } else {
        fmt_layer.with_file(false).with_line_number(false)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| AsbridgeError::internal(format!("failed to init logging: {}", e)))?;

    Ok(())
}
