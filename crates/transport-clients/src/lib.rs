//! # Transport Clients
//!
//! Typed clients for the gateway's downstream services, plus the server side
//! of the log store's RPC contract.
//!
//! | Transport | Client | Timeout | Retry |
//! |-----------|--------|---------|-------|
//! | HTTP-JSON | [`HttpJsonClient`] | 30s | none |
//! | JSON-RPC  | [`RpcLogClient`]   | 5s  | none |
//!
//! Addresses are always passed in at construction; nothing here reads
//! global state, so tests can point a client at a stub.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod downstream;
pub mod error;
pub mod http;
pub mod rpc;
pub mod server;

pub use downstream::{CredentialService, LogService, MailService};
pub use error::TransportError;
pub use http::{HttpJsonClient, HttpReply, DEFAULT_HTTP_TIMEOUT};
pub use rpc::{LoggerRpcClient, LoggerRpcServer, RpcLogClient, RpcPayload, DEFAULT_RPC_TIMEOUT};
pub use server::{
    serve, InMemoryLogStore, LogEntry, LogStore, LoggerRpcService, RpcServerConfig,
    RpcServerHandle, StoreError, RPC_SUCCESS_PREFIX,
};
