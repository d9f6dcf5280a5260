//! Gateway configuration with validation.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main gateway configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP ingress
    pub http: HttpConfig,
    /// Statically configured downstream addresses
    pub downstreams: DownstreamConfig,
    /// Per-transport call bounds
    pub timeouts: TimeoutConfig,
    /// How `log` actions reach the log store
    pub log_route: LogRoute,
}

impl GatewayConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.max_body_bytes == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_body_bytes cannot be 0".into(),
            ));
        }

        let urls = [
            ("auth_url", &self.downstreams.auth_url),
            ("log_url", &self.downstreams.log_url),
            ("mail_url", &self.downstreams.mail_url),
            ("log_rpc_url", &self.downstreams.log_rpc_url),
        ];
        for (field, url) in urls {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidUrl {
                    field,
                    url: url.clone(),
                });
            }
        }

        if self.timeouts.http.is_zero() {
            return Err(ConfigError::InvalidTimeout("http timeout cannot be 0".into()));
        }
        if self.timeouts.rpc.is_zero() {
            return Err(ConfigError::InvalidTimeout("rpc timeout cannot be 0".into()));
        }

        Ok(())
    }

    /// Get HTTP ingress bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }
}

/// HTTP ingress configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Request bodies above this size are refused with 413.
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            max_body_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownstreamConfig {
    /// Credential store, HTTP-JSON.
    pub auth_url: String,
    /// Log store, HTTP-JSON.
    pub log_url: String,
    /// Mail sender, HTTP-JSON.
    pub mail_url: String,
    /// Log store, JSON-RPC over HTTP.
    pub log_rpc_url: String,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            auth_url: "http://authentication-service/authenticate".to_string(),
            log_url: "http://logger-service/log".to_string(),
            mail_url: "http://mail-service/send".to_string(),
            log_rpc_url: "http://logger-service:5001".to_string(),
        }
    }
}

/// Timeout configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// HTTP-class downstream calls
    #[serde(with = "humantime_serde")]
    pub http: Duration,
    /// RPC-class downstream calls
    #[serde(with = "humantime_serde")]
    pub rpc: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            http: Duration::from_secs(30),
            rpc: Duration::from_secs(5),
        }
    }
}

/// Transport used for `log` actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRoute {
    #[default]
    Rpc,
    Http,
    /// Publish `log.INFO` on the event channel; the consumer writes it.
    Event,
}

impl LogRoute {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogRoute::Rpc => "rpc",
            LogRoute::Http => "http",
            LogRoute::Event => "event",
        }
    }
}

impl FromStr for LogRoute {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rpc" => Ok(LogRoute::Rpc),
            "http" => Ok(LogRoute::Http),
            "event" => Ok(LogRoute::Event),
            other => Err(ConfigError::InvalidLogRoute(other.to_string())),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid limit: {0}")]
    InvalidLimit(String),

    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("invalid url for {field}: '{url}'")]
    InvalidUrl { field: &'static str, url: String },

    #[error("invalid log route '{0}' (expected rpc, http or event)")]
    InvalidLogRoute(String),
}
