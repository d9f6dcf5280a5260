//! Downstream service contracts.
//!
//! The router and the event consumer depend on these traits, never on a
//! concrete transport, so either side can be driven by a stub.

use async_trait::async_trait;
use shared_types::{AuthPayload, LogPayload, MailPayload, ResponseBody};

use crate::error::TransportError;

/// User-credential store.
#[async_trait]
pub trait CredentialService: Send + Sync {
    /// Check a credentials pair; the reply carries the downstream's data.
    async fn authenticate(&self, credentials: &AuthPayload) -> Result<ResponseBody, TransportError>;
}

/// Log-entry store.
#[async_trait]
pub trait LogService: Send + Sync {
    /// Persist one entry; returns the downstream's confirmation text.
    async fn write_log(&self, entry: &LogPayload) -> Result<String, TransportError>;
}

/// Outbound mail sender.
#[async_trait]
pub trait MailService: Send + Sync {
    async fn send_mail(&self, mail: &MailPayload) -> Result<String, TransportError>;
}
