//! # Error Types
//!
//! The dispatch error taxonomy shared by the router and its transports.

use thiserror::Error;

/// Errors returned by a single dispatch.
///
/// Channel-level failures (`ChannelUnavailable`, `ChannelDisconnected`) live
/// in `shared-bus`; by the time the router is serving traffic the channel is
/// connected, so a failed publish surfaces as `DownstreamUnavailable`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Discriminant outside the closed action set.
    #[error("unknown action: '{0}'")]
    UnknownAction(String),

    /// Payload missing, malformed, or carrying an empty field.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// Network, timeout, or protocol failure talking to the downstream.
    #[error("downstream unavailable: {0}")]
    DownstreamUnavailable(String),

    /// The downstream answered and refused the request.
    #[error("{message}")]
    DownstreamRejected {
        /// HTTP status reported by the downstream, when there was one.
        status: Option<u16>,
        /// The downstream's own message, relayed unchanged.
        message: String,
    },
}

impl DispatchError {
    /// Rejection carrying only a message.
    pub fn rejected(message: impl Into<String>) -> Self {
        DispatchError::DownstreamRejected {
            status: None,
            message: message.into(),
        }
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::UnknownAction(_) => "UnknownAction",
            DispatchError::ValidationFailed(_) => "ValidationFailed",
            DispatchError::DownstreamUnavailable(_) => "DownstreamUnavailable",
            DispatchError::DownstreamRejected { .. } => "DownstreamRejected",
        }
    }
}
