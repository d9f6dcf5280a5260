//! HTTP ingress.
//!
//! | Route | Method | Answer |
//! |-------|--------|--------|
//! | `/handle` | POST | dispatch result, `{error,message,data?}` |
//! | `/` | POST | liveness probe |
//! | `/health` | GET | `{"status":"ok"}` |
//! | `/metrics` | GET | dispatch counters |

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use shared_types::{ActionKind, DispatchError, ResponseBody};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::info;

use crate::domain::config::GatewayConfig;
use crate::domain::error::GatewayError;
use crate::router::ActionRouter;

/// HTTP front of an [`ActionRouter`].
pub struct GatewayService {
    config: GatewayConfig,
    router: Arc<ActionRouter>,
}

impl GatewayService {
    pub fn new(config: GatewayConfig, router: Arc<ActionRouter>) -> Result<Self, GatewayError> {
        config.validate()?;
        Ok(Self { config, router })
    }

    pub fn router(&self) -> Arc<ActionRouter> {
        Arc::clone(&self.router)
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, GatewayError> {
        let addr = self.config.http_addr();
        TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{addr}: {e}")))
    }

    /// Serve on `listener` until `shutdown` resolves, then drain in-flight
    /// requests.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: Option<SocketAddr> = listener.local_addr().ok();
        let app = http_router(self.router, self.config.http.max_body_bytes);

        info!(addr = ?addr, "HTTP ingress listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| GatewayError::Server(e.to_string()))?;
        info!("HTTP ingress stopped");
        Ok(())
    }
}

/// Build the ingress routes around `router`.
pub fn http_router(router: Arc<ActionRouter>, max_body_bytes: usize) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(max_body_bytes));

    Router::new()
        .route("/", post(broker_probe))
        .route("/handle", post(handle_submission))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .layer(middleware)
        .with_state(router)
}

async fn handle_submission(
    State(router): State<Arc<ActionRouter>>,
    body: Bytes,
) -> impl IntoResponse {
    let envelope = match router.decode(&body) {
        Ok(envelope) => envelope,
        Err(e) => return (status_for(&e), Json(ResponseBody::from(&e))),
    };

    // Auth answers synchronously; everything else is accepted.
    let success = match envelope.kind() {
        ActionKind::Auth => StatusCode::OK,
        ActionKind::Log | ActionKind::Mail => StatusCode::ACCEPTED,
    };
    match router.dispatch(envelope).await {
        Ok(reply) => (success, Json(reply)),
        Err(e) => (status_for(&e), Json(ResponseBody::from(&e))),
    }
}

/// HTTP status for a failed dispatch.
pub fn status_for(err: &DispatchError) -> StatusCode {
    match err {
        DispatchError::UnknownAction(_) | DispatchError::ValidationFailed(_) => {
            StatusCode::BAD_REQUEST
        }
        DispatchError::DownstreamRejected { status, .. } => status
            .and_then(|s| StatusCode::from_u16(s).ok())
            .filter(StatusCode::is_client_error)
            .unwrap_or(StatusCode::BAD_REQUEST),
        DispatchError::DownstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
    }
}

async fn broker_probe() -> impl IntoResponse {
    Json(ResponseBody::success("Hit the broker"))
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn metrics(State(router): State<Arc<ActionRouter>>) -> impl IntoResponse {
    Json(router.metrics().snapshot())
}
