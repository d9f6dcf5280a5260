//! # Node Configuration
//!
//! Defaults for every component, overridden from the environment.
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `DG_HTTP_PORT` | `gateway.http.port` |
//! | `DG_AUTH_URL` | `gateway.downstreams.auth_url` |
//! | `DG_LOG_URL` | `gateway.downstreams.log_url` |
//! | `DG_MAIL_URL` | `gateway.downstreams.mail_url` |
//! | `DG_LOG_RPC_URL` | `gateway.downstreams.log_rpc_url` |
//! | `DG_LOG_ROUTE` | `gateway.log_route` |
//! | `DG_RPC_PORT` | `rpc_server.port` |
//! | `DG_BROKER_URI` | `channel.uri` |

use std::env;

use action_gateway::{ConfigError, GatewayConfig, LogRoute};
use event_consumer::ConsumerConfig;
use shared_bus::{ChannelConfig, ChannelError};
use thiserror::Error;
use transport_clients::RpcServerConfig;

/// Complete node configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeConfig {
    pub gateway: GatewayConfig,
    /// Producer side of the event channel.
    pub channel: ChannelConfig,
    pub consumer: ConsumerConfig,
    pub rpc_server: RpcServerConfig,
}

#[derive(Debug, Error)]
pub enum NodeConfigError {
    #[error("invalid value '{value}' for {var}: {reason}")]
    InvalidVar {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Gateway(#[from] ConfigError),

    #[error("event channel config: {0}")]
    Channel(#[from] ChannelError),

    #[error("consumer topology differs from producer topology")]
    TopologyMismatch,
}

impl NodeConfig {
    pub fn from_env() -> Result<Self, NodeConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, NodeConfigError> {
        let mut config = NodeConfig::default();

        if let Some(port) = parse_port(&lookup, "DG_HTTP_PORT")? {
            config.gateway.http.port = port;
        }
        if let Some(port) = parse_port(&lookup, "DG_RPC_PORT")? {
            config.rpc_server.port = port;
        }

        let downstreams = &mut config.gateway.downstreams;
        for (var, slot) in [
            ("DG_AUTH_URL", &mut downstreams.auth_url),
            ("DG_LOG_URL", &mut downstreams.log_url),
            ("DG_MAIL_URL", &mut downstreams.mail_url),
            ("DG_LOG_RPC_URL", &mut downstreams.log_rpc_url),
        ] {
            if let Some(url) = lookup(var) {
                *slot = url;
            }
        }

        if let Some(route) = lookup("DG_LOG_ROUTE") {
            config.gateway.log_route =
                route
                    .parse::<LogRoute>()
                    .map_err(|e| NodeConfigError::InvalidVar {
                        var: "DG_LOG_ROUTE",
                        value: route.clone(),
                        reason: e.to_string(),
                    })?;
        }

        if let Some(uri) = lookup("DG_BROKER_URI") {
            config.channel.uri = uri;
        }

        Ok(config)
    }

    /// Validate every component before anything starts.
    pub fn validate(&self) -> Result<(), NodeConfigError> {
        self.gateway.validate()?;
        self.channel.validate()?;
        self.consumer.validate()?;
        if self.consumer.topology != self.channel.topology {
            return Err(NodeConfigError::TopologyMismatch);
        }
        Ok(())
    }
}

fn parse_port(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<u16>, NodeConfigError> {
    lookup(var)
        .map(|value| {
            value
                .trim()
                .parse::<u16>()
                .map_err(|e| NodeConfigError::InvalidVar {
                    var,
                    value: value.clone(),
                    reason: e.to_string(),
                })
        })
        .transpose()
}
