//! Global log/tracing subscriber setup.
//!
//! Library code logs through the `log` facade and opens `tracing` spans per
//! job. [`init_logging`] routes both into one `tracing-subscriber` pipeline.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::ScriptqError;

/// Builds the filter: `RUST_LOG` when set, else the configured level.
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Installs the global subscriber and the `log` bridge.
///
/// Returns an error if a global logger or subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ScriptqError> {
    tracing_log::LogTracer::init().map_err(|e| ScriptqError::Logging(e.to_string()))?;

    let filter = build_filter(config);
    let result = match config.format {
        LogFormat::Pretty => tracing::subscriber::set_global_default(
            Registry::default()
                .with(filter)
                .with(fmt::layer().with_target(true)),
        ),
        LogFormat::Json => tracing::subscriber::set_global_default(
            Registry::default()
                .with(filter)
                .with(fmt::layer().json().with_current_span(true)),
        ),
    };

    result.map_err(|e| ScriptqError::Logging(e.to_string()))
}
