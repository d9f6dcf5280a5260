//! Transport-level errors.

use shared_types::DispatchError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection refused, timeout, or an unreadable response.
    #[error("downstream unavailable: {0}")]
    Unavailable(String),

    /// The downstream answered and said no.
    #[error("{message}")]
    Rejected {
        status: Option<u16>,
        message: String,
    },
}

impl TransportError {
    pub fn rejected(status: Option<u16>, message: impl Into<String>) -> Self {
        TransportError::Rejected {
            status,
            message: message.into(),
        }
    }
}

impl From<TransportError> for DispatchError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Unavailable(reason) => DispatchError::DownstreamUnavailable(reason),
            TransportError::Rejected { status, message } => {
                DispatchError::DownstreamRejected { status, message }
            }
        }
    }
}
