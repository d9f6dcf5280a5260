//! Consumer configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared_bus::{ChannelError, RetryPolicy, Topology};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Must match what the producer declares.
    pub topology: Topology,
    /// Delay between reconnect attempts. Attempts are never capped.
    pub reconnect: RetryPolicy,
    /// Requeue a message whose downstream call failed instead of dropping it.
    pub requeue_on_failure: bool,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            topology: Topology::default(),
            reconnect: RetryPolicy::exponential(Duration::from_secs(1), Duration::from_secs(30)),
            requeue_on_failure: false,
        }
    }
}

impl ConsumerConfig {
    pub fn validate(&self) -> Result<(), ChannelError> {
        // The consumer reconnects until shutdown; a cap would be ignored.
        if let Some(cap) = self.reconnect.max_attempts {
            return Err(ChannelError::Topology(format!(
                "reconnect.max_attempts must be unset, got {cap}"
            )));
        }
        self.topology.validate()
    }
}
