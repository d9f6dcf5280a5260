//! JSON-RPC transport for the log store.
//!
//! Wire contract: method `logger_logInfo`, one positional argument
//! `{"Name": string, "Data": string}`, result is a confirmation string.

use std::time::Duration;

use async_trait::async_trait;
use jsonrpsee::core::{ClientError, RpcResult};
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::proc_macros::rpc;
use serde::{Deserialize, Serialize};
use shared_types::LogPayload;
use tracing::debug;

use crate::downstream::LogService;
use crate::error::TransportError;

pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(5);

/// Argument of `logger_logInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcPayload {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Data")]
    pub data: String,
}

impl From<&LogPayload> for RpcPayload {
    fn from(entry: &LogPayload) -> Self {
        Self {
            name: entry.name.clone(),
            data: entry.data.clone(),
        }
    }
}

#[rpc(server, client, namespace = "logger")]
pub trait LoggerRpc {
    /// Store one entry and confirm it.
    #[method(name = "logInfo")]
    async fn log_info(&self, payload: RpcPayload) -> RpcResult<String>;
}

/// [`LogService`] backed by a remote `logger_logInfo` endpoint.
#[derive(Debug, Clone)]
pub struct RpcLogClient {
    url: String,
    client: HttpClient,
}

impl RpcLogClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let url = url.into();
        let client = HttpClientBuilder::default()
            .request_timeout(timeout)
            .build(&url)
            .map_err(|e| TransportError::Unavailable(format!("rpc client setup failed: {e}")))?;
        Ok(Self { url, client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl LogService for RpcLogClient {
    async fn write_log(&self, entry: &LogPayload) -> Result<String, TransportError> {
        let reply = self
            .client
            .log_info(RpcPayload::from(entry))
            .await
            .map_err(|e| map_client_error(&self.url, e))?;
        debug!(url = %self.url, name = %entry.name, "log entry accepted over rpc");
        Ok(reply)
    }
}

/// A JSON-RPC error object is an explicit refusal; anything else means the
/// call never completed.
fn map_client_error(url: &str, err: ClientError) -> TransportError {
    match err {
        ClientError::Call(object) => TransportError::rejected(None, object.message()),
        other => TransportError::Unavailable(format!("rpc call to {url} failed: {other}")),
    }
}
