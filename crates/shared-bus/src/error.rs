//! Event channel errors.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// `connect()` exhausted its retry budget. Fatal at startup.
    #[error("event channel unavailable after {attempts} attempt(s): {reason}")]
    ChannelUnavailable { attempts: u32, reason: String },

    /// The connection dropped under an open channel or subscription.
    #[error("event channel disconnected: {0}")]
    ChannelDisconnected(String),

    /// A single connection attempt failed.
    #[error("broker connection failed: {0}")]
    Connect(String),

    /// Declaring or resolving exchanges, queues, or bindings failed.
    #[error("topology error: {0}")]
    Topology(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("codec error: {0}")]
    Codec(String),
}

impl ChannelError {
    /// Whether the error means the underlying connection is gone.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, ChannelError::ChannelDisconnected(_))
    }
}

impl From<serde_json::Error> for ChannelError {
    fn from(e: serde_json::Error) -> Self {
        ChannelError::Codec(e.to_string())
    }
}
