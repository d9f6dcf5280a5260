//! # Event Consumer
//!
//! Drains the durable event queue into the log store.
//!
//! ```text
//!            ┌──────────────┐  connect()+subscribe() ok  ┌────────────┐
//!   start ─► │  Connecting  │ ─────────────────────────► │ Subscribed │
//!            └──────────────┘                            └─────┬──────┘
//!                  ▲                                           │ ChannelDisconnected
//!                  │ backoff elapsed  ┌──────────────┐         │
//!                  └───────────────── │ Disconnected │ ◄───────┘
//!                                     └──────────────┘
//!   cancel (from any state) ─► Stopped
//! ```
//!
//! A message is acknowledged only after the downstream accepted it, so a
//! crash between receipt and processing leads to redelivery rather than
//! loss.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod consumer;
pub mod state;

pub use config::ConsumerConfig;
pub use consumer::{ConsumerStats, EventConsumer};
pub use state::ConsumerState;
