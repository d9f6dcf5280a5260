//! HTTP-JSON transport.
//!
//! One POST per call, JSON body in, `{error,message,data?}` out. The request
//! timeout bounds the whole exchange; there is no retry at this layer.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use shared_types::{AuthPayload, LogPayload, MailPayload, ResponseBody};
use tracing::debug;

use crate::downstream::{CredentialService, LogService, MailService};
use crate::error::TransportError;

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// A successful (2xx) reply.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    /// Decoded body, when the downstream sent a response envelope.
    pub body: Option<ResponseBody>,
}

/// HTTP client bound to a single downstream endpoint.
#[derive(Debug, Clone)]
pub struct HttpJsonClient {
    url: String,
    client: reqwest::Client,
}

impl HttpJsonClient {
    /// Creates a client posting to `url` with the given request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Unavailable(format!("http client setup failed: {e}")))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POSTs `body` as JSON.
    ///
    /// Non-2xx statuses and 2xx envelopes with `error: true` come back as
    /// [`TransportError::Rejected`] carrying the downstream's message.
    pub async fn post_json<T>(&self, body: &T) -> Result<HttpReply, TransportError>
    where
        T: Serialize + ?Sized + Sync,
    {
        let response = self
            .client
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Unavailable(format!("POST {} failed: {e}", self.url)))?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            TransportError::Unavailable(format!("failed reading response from {}: {e}", self.url))
        })?;
        debug!(url = %self.url, status = status.as_u16(), "downstream replied");

        if !status.is_success() {
            return Err(TransportError::Rejected {
                status: Some(status.as_u16()),
                message: error_message(status, &bytes),
            });
        }

        let body = if bytes.is_empty() {
            None
        } else {
            serde_json::from_slice::<ResponseBody>(&bytes).ok()
        };
        if let Some(envelope) = body.as_ref().filter(|b| b.error) {
            return Err(TransportError::Rejected {
                status: Some(status.as_u16()),
                message: envelope.message.clone(),
            });
        }

        Ok(HttpReply {
            status: status.as_u16(),
            body,
        })
    }
}

/// Pulls `message` out of a JSON error body, falling back to the raw text.
fn error_message(status: StatusCode, body: &[u8]) -> String {
    let message = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());
    if message.is_empty() {
        status.to_string()
    } else {
        message
    }
}

#[async_trait]
impl CredentialService for HttpJsonClient {
    async fn authenticate(&self, credentials: &AuthPayload) -> Result<ResponseBody, TransportError> {
        match self.post_json(credentials).await {
            Ok(reply) => Ok(reply
                .body
                .unwrap_or_else(|| ResponseBody::success("Authenticated!"))),
            Err(TransportError::Rejected {
                status: Some(401), ..
            }) => Err(TransportError::rejected(Some(401), "invalid credentials")),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl LogService for HttpJsonClient {
    async fn write_log(&self, entry: &LogPayload) -> Result<String, TransportError> {
        self.post_json(entry).await?;
        Ok("logged".to_string())
    }
}

#[async_trait]
impl MailService for HttpJsonClient {
    async fn send_mail(&self, mail: &MailPayload) -> Result<String, TransportError> {
        self.post_json(mail).await?;
        Ok(format!("Message sent to {}", mail.to))
    }
}
