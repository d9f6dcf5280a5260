//! Telemetry configuration from environment variables.

use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub service_name: String,

    /// `EnvFilter` directives, e.g. `info` or `info,shared_bus=debug`
    pub log_level: String,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "dispatch-gateway".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// - `OTEL_SERVICE_NAME`: service name (default: dispatch-gateway)
    /// - `DG_LOG_LEVEL` or `RUST_LOG`: filter directives (default: info)
    /// - `DG_JSON_LOGS`: JSON output (default: true in containers)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let is_container =
            lookup("KUBERNETES_SERVICE_HOST").is_some() || lookup("DOCKER_CONTAINER").is_some();

        Self {
            service_name: lookup("OTEL_SERVICE_NAME")
                .unwrap_or_else(|| "dispatch-gateway".to_string()),

            log_level: lookup("DG_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or_else(|| "info".to_string()),

            json_logs: lookup("DG_JSON_LOGS")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(is_container),
        }
    }
}
