//! # Dispatch Gateway Node Runtime
//!
//! Wires the gateway together.
//!
//! ## Startup Sequence
//!
//! 1. Telemetry (done by the binary before anything else logs)
//! 2. Log store RPC server
//! 3. Producer event channel, bounded retry, fatal on `ChannelUnavailable`
//! 4. Router built and HTTP ingress bound
//! 5. Event consumer task (own connection) and ingress task spawned
//!
//! Any failure before step 5 stops what steps 2 and 3 opened.
//!
//! Shutdown runs the other way: ingress drains, the consumer is cancelled,
//! the producer channel closes, the RPC server stops.

pub mod config;
pub mod runtime;

pub use config::{NodeConfig, NodeConfigError};
pub use runtime::{select_broker, NodeRuntime};
