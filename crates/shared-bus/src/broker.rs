//! # Broker Abstraction
//!
//! The seam between the event channel and a concrete message broker. A
//! [`Broker`] hands out independent connections; each [`BrokerConnection`]
//! owns its socket exclusively, so producer and subscriber never share one.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::ChannelError;
use crate::topology::Topology;

/// Factory for broker connections.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Open a fresh connection and channel.
    async fn connect(&self) -> Result<Box<dyn BrokerConnection>, ChannelError>;

    /// Human-readable target for logs (never includes credentials).
    fn describe(&self) -> String;
}

/// One open connection plus channel.
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    /// Declare exchange, queue, and binding if absent.
    async fn declare(&self, topology: &Topology) -> Result<(), ChannelError>;

    /// Publish raw bytes. Returns once the write is handed to the broker.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: Vec<u8>,
    ) -> Result<(), ChannelError>;

    /// Start consuming `queue` with manual acknowledgement.
    async fn consume(&self, queue: &str) -> Result<DeliveryStream, ChannelError>;

    fn is_open(&self) -> bool;

    async fn close(&self);
}

/// Deliveries from a consumer; ends when the connection goes away.
pub type DeliveryStream = BoxStream<'static, Result<Delivery, ChannelError>>;

/// A raw message handed to a consumer.
pub struct Delivery {
    pub routing_key: String,
    pub payload: Vec<u8>,
    /// Set when the broker delivered this message before without an ack.
    pub redelivered: bool,
    pub ack: AckHandle,
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("routing_key", &self.routing_key)
            .field("payload_len", &self.payload.len())
            .field("redelivered", &self.redelivered)
            .finish()
    }
}

/// Broker-specific acknowledgement.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> Result<(), ChannelError>;
    async fn reject(&self, requeue: bool) -> Result<(), ChannelError>;
}

/// Settles exactly one delivery. Consumed by `ack` or `reject`.
pub struct AckHandle {
    inner: Box<dyn Acknowledger>,
}

impl AckHandle {
    pub fn new(acknowledger: impl Acknowledger + 'static) -> Self {
        Self {
            inner: Box::new(acknowledger),
        }
    }

    /// Mark the delivery processed; the broker forgets it.
    pub async fn ack(self) -> Result<(), ChannelError> {
        self.inner.ack().await
    }

    /// Refuse the delivery. With `requeue = false` it is dead-lettered.
    pub async fn reject(self, requeue: bool) -> Result<(), ChannelError> {
        self.inner.reject(requeue).await
    }
}

impl std::fmt::Debug for AckHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AckHandle")
    }
}
