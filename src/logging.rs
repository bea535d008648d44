//! Structured logging setup for the driver binaries.
//!
//! Uses `tracing` with an env-filter: the `DGEN_DRIVER_LOG` environment
//! variable takes precedence, then the configured level. Driver jobs are
//! short-lived processes, so output goes to stderr (records may be piped
//! through stdout by consumers) in text or JSON format.

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Environment variable holding an env-filter directive string.
pub const LOG_ENV_VAR: &str = "DGEN_DRIVER_LOG";

#[derive(Debug, Error)]
#[error("invalid logging configuration: {0}")]
pub struct LoggingConfigError(String);

/// Logging configuration, built from CLI flags.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error, off
    pub level: String,
    /// Output format: text or json
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Call once, early in `main`; later calls fail.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), LoggingConfigError> {
    let default = LoggingConfig::default();
    let config = config.unwrap_or(&default);

    let filter = match EnvFilter::try_from_env(LOG_ENV_VAR) {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| LoggingConfigError(format!("invalid log level directive: {e}")))?,
    };

    let base = Registry::default().with(filter);
    match config.format.as_str() {
        "json" => base
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .try_init(),
        "text" => base
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init(),
        other => {
            return Err(LoggingConfigError(format!(
                "invalid log format: {other} (must be 'json' or 'text')"
            )))
        }
    }
    .map_err(|e| LoggingConfigError(format!("failed to install subscriber: {e}")))
}
