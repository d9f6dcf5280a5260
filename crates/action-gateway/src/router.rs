//! # Action Router
//!
//! Matches a decoded [`Envelope`] exhaustively and performs exactly one
//! downstream call or publish for it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use shared_types::{
    ActionKind, AuthPayload, DispatchError, Envelope, EventMessage, LogLevel, LogPayload,
    MailPayload, ResponseBody,
};
use tracing::{debug, warn};
use transport_clients::{
    CredentialService, HttpJsonClient, LogService, MailService, RpcLogClient, TransportError,
};

use crate::domain::config::{GatewayConfig, LogRoute, TimeoutConfig};
use crate::domain::error::GatewayError;
use crate::metrics::DispatchMetrics;
use crate::ports::outbound::EventPublisher;

/// The collaborators a router dispatches to.
#[derive(Clone)]
pub struct Downstreams {
    pub credentials: Arc<dyn CredentialService>,
    pub mail: Arc<dyn MailService>,
    /// Log store over HTTP-JSON.
    pub log_http: Arc<dyn LogService>,
    /// Log store over JSON-RPC.
    pub log_rpc: Arc<dyn LogService>,
    pub events: Arc<dyn EventPublisher>,
}

impl Downstreams {
    /// Real HTTP and RPC clients pointed at the configured addresses.
    pub fn from_config(
        config: &GatewayConfig,
        events: Arc<dyn EventPublisher>,
    ) -> Result<Self, GatewayError> {
        let http = |url: &str| {
            HttpJsonClient::new(url, config.timeouts.http)
                .map_err(|e| GatewayError::Client(e.to_string()))
        };
        let log_rpc = RpcLogClient::new(&config.downstreams.log_rpc_url, config.timeouts.rpc)
            .map_err(|e| GatewayError::Client(e.to_string()))?;

        Ok(Self {
            credentials: Arc::new(http(&config.downstreams.auth_url)?),
            mail: Arc::new(http(&config.downstreams.mail_url)?),
            log_http: Arc::new(http(&config.downstreams.log_url)?),
            log_rpc: Arc::new(log_rpc),
            events,
        })
    }
}

pub struct ActionRouter {
    downstreams: Downstreams,
    log_route: LogRoute,
    timeouts: TimeoutConfig,
    metrics: Arc<DispatchMetrics>,
}

impl ActionRouter {
    pub fn new(downstreams: Downstreams, log_route: LogRoute, timeouts: TimeoutConfig) -> Self {
        Self {
            downstreams,
            log_route,
            timeouts,
            metrics: Arc::new(DispatchMetrics::new()),
        }
    }

    /// Build a router with real transport clients from `config`.
    pub fn from_config(
        config: &GatewayConfig,
        events: Arc<dyn EventPublisher>,
    ) -> Result<Self, GatewayError> {
        config.validate()?;
        let downstreams = Downstreams::from_config(config, events)?;
        Ok(Self::new(
            downstreams,
            config.log_route,
            config.timeouts.clone(),
        ))
    }

    pub fn metrics(&self) -> Arc<DispatchMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn log_route(&self) -> LogRoute {
        self.log_route
    }

    /// Decode a raw request body. Failures count as failed dispatches.
    pub fn decode(&self, body: &[u8]) -> Result<Envelope, DispatchError> {
        Envelope::from_slice(body).map_err(|e| {
            warn!(error = %e, kind = e.kind(), "Rejected inbound envelope");
            self.metrics.record_dispatch(None, false);
            e
        })
    }

    /// Decode a raw request body and dispatch it.
    pub async fn dispatch_bytes(&self, body: &[u8]) -> Result<ResponseBody, DispatchError> {
        let envelope = self.decode(body)?;
        self.dispatch(envelope).await
    }

    /// Dispatch one envelope to its downstream.
    pub async fn dispatch(&self, envelope: Envelope) -> Result<ResponseBody, DispatchError> {
        let kind = envelope.kind();
        let result = match envelope.validate() {
            Ok(()) => self.route(envelope).await,
            Err(e) => Err(e),
        };

        self.metrics.record_dispatch(Some(kind), result.is_ok());
        match &result {
            Ok(reply) => debug!(action = %kind, message = %reply.message, "Dispatched"),
            Err(e) => warn!(action = %kind, error = %e, kind = e.kind(), "Dispatch failed"),
        }
        result
    }

    async fn route(&self, envelope: Envelope) -> Result<ResponseBody, DispatchError> {
        match envelope {
            Envelope::Auth { auth } => self.authenticate(auth).await,
            Envelope::Log { log } => self.log(log).await,
            Envelope::Mail { mail } => self.send_mail(mail).await,
        }
    }

    async fn authenticate(&self, auth: AuthPayload) -> Result<ResponseBody, DispatchError> {
        let reply = bounded(
            ActionKind::Auth,
            self.timeouts.http,
            self.downstreams.credentials.authenticate(&auth),
        )
        .await?;

        let body = ResponseBody::success("Authenticated!");
        Ok(match reply.data {
            Some(data) => body.with_data(data),
            None => body,
        })
    }

    async fn log(&self, log: LogPayload) -> Result<ResponseBody, DispatchError> {
        let message = match self.log_route {
            LogRoute::Rpc => {
                bounded(
                    ActionKind::Log,
                    self.timeouts.rpc,
                    self.downstreams.log_rpc.write_log(&log),
                )
                .await?
            }
            LogRoute::Http => {
                bounded(
                    ActionKind::Log,
                    self.timeouts.http,
                    self.downstreams.log_http.write_log(&log),
                )
                .await?
            }
            LogRoute::Event => return self.publish_log(log).await,
        };
        Ok(ResponseBody::success(message))
    }

    /// Accepted, not processed: the consumer writes the entry later.
    async fn publish_log(&self, log: LogPayload) -> Result<ResponseBody, DispatchError> {
        let routing_key = LogLevel::Info.routing_key();
        let message = EventMessage::from(log);
        self.downstreams
            .events
            .publish(&routing_key, &message)
            .await
            .map_err(|e| DispatchError::DownstreamUnavailable(e.to_string()))?;
        self.metrics.record_event_published();
        Ok(ResponseBody::success(format!(
            "Event accepted: {}",
            message.name
        )))
    }

    async fn send_mail(&self, mail: MailPayload) -> Result<ResponseBody, DispatchError> {
        let message = bounded(
            ActionKind::Mail,
            self.timeouts.http,
            self.downstreams.mail.send_mail(&mail),
        )
        .await?;
        Ok(ResponseBody::success(message))
    }
}

/// Run one downstream call under `limit`.
async fn bounded<T, F>(kind: ActionKind, limit: Duration, call: F) -> Result<T, DispatchError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(DispatchError::from),
        Err(_) => Err(DispatchError::DownstreamUnavailable(format!(
            "{kind} call timed out after {}ms",
            limit.as_millis()
        ))),
    }
}
