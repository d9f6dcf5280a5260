//! # Action Gateway
//!
//! Classifies an inbound action envelope and hands it to exactly one
//! downstream: a direct HTTP-JSON or JSON-RPC call, or a publish on the
//! event channel.
//!
//! ```text
//!  POST /handle
//!       │
//!       ▼
//!  Envelope::from_slice ──► validate ──► ActionRouter::dispatch
//!                                              │
//!            ┌───────────────┬─────────────────┼───────────────────┐
//!            ▼               ▼                 ▼                   ▼
//!      auth (HTTP)     mail (HTTP)    log (RPC | HTTP)     log (event: log.INFO)
//! ```
//!
//! # Guarantees
//!
//! - Unknown actions and invalid payloads fail before any network call.
//! - One downstream call or one publish per dispatch, never retried here.
//! - HTTP-class calls are bounded at 30s, RPC-class calls at 5s.
//! - Downstream error messages reach the caller unchanged.

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod metrics;
pub mod ports;
pub mod router;
pub mod service;

pub use domain::config::{
    ConfigError, DownstreamConfig, GatewayConfig, HttpConfig, LogRoute, TimeoutConfig,
};
pub use domain::error::GatewayError;
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use ports::outbound::EventPublisher;
pub use router::{ActionRouter, Downstreams};
pub use service::{http_router, status_for, GatewayService};
