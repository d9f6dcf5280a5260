use std::fmt;

use serde::Serialize;

/// Lifecycle of an [`EventConsumer`](crate::EventConsumer).
///
/// `Stopped` is reached only through cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConsumerState {
    Disconnected,
    Connecting,
    Subscribed,
    Stopped,
}

impl ConsumerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsumerState::Disconnected => "disconnected",
            ConsumerState::Connecting => "connecting",
            ConsumerState::Subscribed => "subscribed",
            ConsumerState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
