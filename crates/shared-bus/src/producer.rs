//! # Event Producer
//!
//! The router's publishing handle. It owns its own connection and
//! re-establishes it on the next publish after the broker dropped it.
//!
//! Each `publish()` makes at most one reconnect attempt and exactly one
//! publish. A publish that fails is reported, never retried here.

use std::sync::Arc;

use shared_types::EventMessage;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::broker::Broker;
use crate::channel::{ChannelConfig, EventChannel};
use crate::error::ChannelError;
use crate::topology::Topology;

pub struct EventProducer {
    broker: Arc<dyn Broker>,
    topology: Topology,
    channel: Mutex<Option<Arc<EventChannel>>>,
}

impl EventProducer {
    /// Open the first channel under the config's bootstrap retry budget.
    ///
    /// Fails with [`ChannelError::ChannelUnavailable`] like
    /// [`EventChannel::connect`].
    pub async fn connect(
        broker: Arc<dyn Broker>,
        config: &ChannelConfig,
    ) -> Result<Self, ChannelError> {
        let channel = EventChannel::connect_with(broker.as_ref(), config).await?;
        Ok(Self {
            broker,
            topology: config.topology.clone(),
            channel: Mutex::new(Some(Arc::new(channel))),
        })
    }

    /// Publish `message` under `routing_key`, reconnecting first if the
    /// current channel is gone.
    pub async fn publish(
        &self,
        routing_key: &str,
        message: &EventMessage,
    ) -> Result<(), ChannelError> {
        let channel = self.current().await?;
        let result = channel.publish(routing_key, message).await;
        if let Err(e) = &result {
            if e.is_disconnect() {
                self.discard(&channel).await;
            }
        }
        result
    }

    /// Whether the held channel is open right now.
    pub async fn is_connected(&self) -> bool {
        self.channel
            .lock()
            .await
            .as_ref()
            .is_some_and(|channel| channel.is_connected())
    }

    pub async fn close(&self) {
        let Some(channel) = self.channel.lock().await.take() else {
            return;
        };
        match Arc::try_unwrap(channel) {
            Ok(channel) => channel.close().await,
            // An in-flight publish still holds it; its drop closes the connection.
            Err(_) => warn!("Producer channel busy at close, dropping"),
        }
    }

    async fn current(&self) -> Result<Arc<EventChannel>, ChannelError> {
        let mut slot = self.channel.lock().await;
        if let Some(channel) = slot.as_ref() {
            if channel.is_connected() {
                return Ok(Arc::clone(channel));
            }
        }

        // Stale or missing; one attempt, the caller sees the failure.
        *slot = None;
        let channel = Arc::new(
            EventChannel::try_connect(self.broker.as_ref(), self.topology.clone())
                .await
                .inspect_err(|e| {
                    warn!(broker = %self.broker.describe(), error = %e, "Producer reconnect failed")
                })?,
        );
        info!(broker = %self.broker.describe(), "Producer channel re-established");
        *slot = Some(Arc::clone(&channel));
        Ok(channel)
    }

    async fn discard(&self, failed: &Arc<EventChannel>) {
        let mut slot = self.channel.lock().await;
        if slot.as_ref().is_some_and(|held| Arc::ptr_eq(held, failed)) {
            *slot = None;
        }
    }
}
