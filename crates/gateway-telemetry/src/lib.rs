//! # Gateway Telemetry
//!
//! Installs the global `tracing` subscriber for every gateway process.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gateway_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! let _guard = init_telemetry(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `dispatch-gateway` | Service name stamped on startup logs |
//! | `DG_LOG_LEVEL` | `RUST_LOG`, then `info` | `EnvFilter` directives |
//! | `DG_JSON_LOGS` | `true` in containers | One JSON object per line |

mod config;

pub use config::TelemetryConfig;

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("invalid log filter '{directives}': {reason}")]
    Filter { directives: String, reason: String },

    #[error("global subscriber already installed: {0}")]
    AlreadyInitialized(String),
}

/// Build the level filter for `config`.
pub fn build_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(&config.log_level).map_err(|e| TelemetryError::Filter {
        directives: config.log_level.clone(),
        reason: e.to_string(),
    })
}

/// Install the global subscriber.
///
/// Returns a guard that must be held for the lifetime of the process.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let filter = build_filter(config)?;

    let output = if config.json_logs {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(output.with_filter(filter))
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))?;

    tracing::info!(
        service = %config.service_name,
        log_level = %config.log_level,
        json_logs = config.json_logs,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard {
        service_name: config.service_name.clone(),
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
}

impl TelemetryGuard {
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}
