//! # Observability
//!
//! Centralized structured logging for linkcourier services.
//!
//! Services call [`init_with_config`] once at startup and use the standard
//! `tracing` macros everywhere else. Every event is written as one JSON
//! line to the configured log file, optionally mirrored to stderr.
//!
//! ## Identity redaction
//!
//! Requesters are anonymous. Event fields named in [`REDACTED_FIELDS`]
//! (raw sender and recipient addresses) are replaced with `"[redacted]"`
//! before they reach any sink, so a stray `tracing::debug!(sender = %raw)`
//! never persists an identity. Log the `user_hash` instead.
//!
//! ## Usage
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "linkcourier".into(),
//!         default_level: "debug".into(),
//!         also_stderr: true,
//!         ..Default::default()
//!     });
//!     tracing::info!("ready");
//! }
//! ```

mod json_layer;
mod writer;

use std::path::PathBuf;

pub use json_layer::{JsonLayer, LogEntry, REDACTED_FIELDS};
pub use writer::{CentralLogWriter, WriterFactory};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service (e.g., "linkcourier", "publisher").
    /// Included in every log line for filtering.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// Optional custom log file path.
    /// Defaults to `~/.linkcourier/logs/linkcourier.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Also emit logs to stderr for immediate feedback.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize logging with default settings for the given service.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with custom configuration.
///
/// Falls back to a stderr-only subscriber when the log file cannot be
/// opened, so a read-only home directory never prevents a message from
/// being handled. Calling this twice is harmless; the second call is a
/// no-op.
pub fn init_with_config(config: LogConfig) {
    writer::init_subscriber(&config);
}

/// Re-export tracing macros for convenience.
/// Services can use `observability::info!()` or `tracing::info!()`.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;
