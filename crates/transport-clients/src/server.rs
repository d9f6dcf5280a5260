//! Log store RPC server.
//!
//! Serves `logger_logInfo` over HTTP JSON-RPC on top of a pluggable
//! [`LogStore`]. Handlers hold no shared mutable state beyond the store, so
//! concurrent calls are independent.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use jsonrpsee::core::RpcResult;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::error::{ErrorObject, ErrorObjectOwned, INVALID_PARAMS_CODE};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::rpc::{LoggerRpcServer, RpcPayload};

/// Prefix of every successful `logger_logInfo` reply.
pub const RPC_SUCCESS_PREFIX: &str = "Processed payload via RPC:";

/// Server-defined JSON-RPC error code for store failures.
const STORE_ERROR_CODE: i32 = -32000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 5001,
        }
    }
}

impl RpcServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// A stored log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub name: String,
    pub data: String,
}

impl LogEntry {
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("log store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence behind the RPC endpoint.
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn insert(&self, entry: LogEntry) -> Result<(), StoreError>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryLogStore {
    entries: RwLock<Vec<LogEntry>>,
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl LogStore for InMemoryLogStore {
    async fn insert(&self, entry: LogEntry) -> Result<(), StoreError> {
        self.entries.write().push(entry);
        Ok(())
    }
}

/// `logger` namespace implementation.
#[derive(Clone)]
pub struct LoggerRpcService {
    store: Arc<dyn LogStore>,
}

impl LoggerRpcService {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl LoggerRpcServer for LoggerRpcService {
    async fn log_info(&self, payload: RpcPayload) -> RpcResult<String> {
        if payload.name.trim().is_empty() {
            return Err(invalid_params("Name must not be empty"));
        }
        if payload.data.trim().is_empty() {
            return Err(invalid_params("Data must not be empty"));
        }

        self.store
            .insert(LogEntry::new(payload.name.clone(), payload.data))
            .await
            .map_err(|e| {
                warn!(error = %e, "failed to store log entry");
                ErrorObject::owned(STORE_ERROR_CODE, e.to_string(), None::<()>)
            })?;

        debug!(name = %payload.name, "log entry stored");
        Ok(format!("{RPC_SUCCESS_PREFIX} {}", payload.name))
    }
}

fn invalid_params(message: &str) -> ErrorObjectOwned {
    ErrorObject::owned(INVALID_PARAMS_CODE, message, None::<()>)
}

/// Running RPC server.
pub struct RpcServerHandle {
    addr: SocketAddr,
    handle: ServerHandle,
}

impl RpcServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// `http://` URL clients should dial.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop accepting calls and wait for in-flight ones to finish.
    pub async fn stop(self) {
        if self.handle.stop().is_err() {
            debug!("rpc server already stopped");
        }
        self.handle.stopped().await;
    }
}

/// Bind and start the log RPC server. Port 0 picks an ephemeral port.
pub async fn serve(
    config: &RpcServerConfig,
    store: Arc<dyn LogStore>,
) -> std::io::Result<RpcServerHandle> {
    let server = Server::builder().build(config.socket_addr()).await?;
    let addr = server.local_addr()?;
    let handle = server.start(LoggerRpcService::new(store).into_rpc());
    info!(%addr, "log rpc server listening");
    Ok(RpcServerHandle { addr, handle })
}
