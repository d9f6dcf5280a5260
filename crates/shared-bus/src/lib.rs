//! # Shared Bus - Topic-Routed Event Channel
//!
//! Carries [`EventMessage`](shared_types::EventMessage)s from the router
//! (producer side) to the event consumer (subscriber side) through a topic
//! exchange and a durable queue.
//!
//! ```text
//! ┌──────────────┐  publish(log.INFO)  ┌──────────────┐   bind log.*   ┌──────────┐
//! │ ActionRouter │ ──────────────────► │  logs_topic  │ ─────────────► │   logs   │
//! └──────────────┘                     │   (topic)    │                │ (durable)│
//!                                      └──────────────┘                └────┬─────┘
//!                                                                           │ subscribe()
//!                                                                           ▼
//!                                                                  ┌────────────────┐
//!                                                                  │ EventConsumer  │
//!                                                                  │  ack / reject  │
//!                                                                  └────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Topology is declared idempotently on every `connect()`.
//! - `connect()` retries under a [`RetryPolicy`] and gives up with
//!   [`ChannelError::ChannelUnavailable`].
//! - `publish()` is fire-and-forget: no publisher confirms.
//! - [`EventProducer`] reopens its channel on the next publish after a drop.
//! - A subscription ends with [`ChannelError::ChannelDisconnected`] when the
//!   connection drops; it never resubscribes on its own.
//! - Unacknowledged deliveries are redelivered after a disconnect.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod broker;
pub mod channel;
pub mod error;
pub mod memory;
pub mod producer;
pub mod retry;
pub mod subscriber;
pub mod topology;

#[cfg(feature = "amqp")]
pub mod amqp;

pub use broker::{AckHandle, Acknowledger, Broker, BrokerConnection, Delivery, DeliveryStream};
pub use channel::{ChannelConfig, EventChannel};
pub use error::ChannelError;
pub use memory::{BrokerStats, InMemoryBroker};
pub use producer::EventProducer;
pub use retry::RetryPolicy;
pub use subscriber::{IncomingEvent, Subscription};
pub use topology::{routing_key_matches, ExchangeKind, Topology};

#[cfg(feature = "amqp")]
pub use amqp::AmqpBroker;

/// Default topic exchange for log events.
pub const DEFAULT_EXCHANGE: &str = "logs_topic";

/// Default durable queue the consumer group reads from.
pub const DEFAULT_QUEUE: &str = "logs";

/// Default binding: every `log.<LEVEL>` key.
pub const DEFAULT_BINDING: &str = "log.*";
