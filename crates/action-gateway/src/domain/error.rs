//! Gateway service errors.

use thiserror::Error;

use super::config::ConfigError;

/// Errors raised while building or running the gateway service.
///
/// Per-request failures are [`shared_types::DispatchError`]s and never
/// surface here.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A downstream client could not be constructed.
    #[error("client setup error: {0}")]
    Client(String),

    #[error("server bind error: {0}")]
    Bind(String),

    #[error("server error: {0}")]
    Server(String),
}
