//! Outbound port for event publication.

use async_trait::async_trait;
use shared_bus::{ChannelError, EventChannel, EventProducer};
use shared_types::EventMessage;

/// Producer side of the event channel, as seen by the router.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, routing_key: &str, message: &EventMessage) -> Result<(), ChannelError>;
}

#[async_trait]
impl EventPublisher for EventChannel {
    async fn publish(&self, routing_key: &str, message: &EventMessage) -> Result<(), ChannelError> {
        EventChannel::publish(self, routing_key, message).await
    }
}

#[async_trait]
impl EventPublisher for EventProducer {
    async fn publish(&self, routing_key: &str, message: &EventMessage) -> Result<(), ChannelError> {
        EventProducer::publish(self, routing_key, message).await
    }
}
