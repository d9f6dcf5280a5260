//! Shared test fixtures.

use std::sync::Arc;
use std::time::Duration;

use axum::{body::Bytes, extract::State, http::StatusCode, routing::post, Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

/// One recorded request.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub body: Bytes,
}

impl RecordedCall {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }
}

#[derive(Default)]
struct StubState {
    calls: Mutex<Vec<RecordedCall>>,
    /// Statuses to answer with, front first; empty means 202.
    script: Mutex<Vec<StatusCode>>,
    reply: Mutex<Value>,
}

/// An HTTP downstream on `127.0.0.1:0` that records every POST.
#[derive(Clone)]
pub struct StubDownstream {
    pub url: String,
    state: Arc<StubState>,
}

impl StubDownstream {
    pub async fn spawn(reply: Value) -> Self {
        let state = Arc::new(StubState {
            reply: Mutex::new(reply),
            ..StubState::default()
        });
        let app = Router::new()
            .route("/", post(record))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            url: format!("http://{addr}/"),
            state,
        }
    }

    /// A stub answering `{"error":false,"message":"ok"}`.
    pub async fn accepting() -> Self {
        Self::spawn(json!({"error": false, "message": "ok"})).await
    }

    /// Answer the next requests with these statuses, in order.
    pub fn script(&self, statuses: &[StatusCode]) {
        *self.state.script.lock() = statuses.to_vec();
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.calls.lock().len()
    }
}

async fn record(State(state): State<Arc<StubState>>, body: Bytes) -> (StatusCode, Json<Value>) {
    state.calls.lock().push(RecordedCall { body });
    let status = {
        let mut script = state.script.lock();
        if script.is_empty() {
            StatusCode::ACCEPTED
        } else {
            script.remove(0)
        }
    };
    let reply = if status.is_success() {
        state.reply.lock().clone()
    } else {
        json!({"error": true, "message": format!("stub refused with {}", status.as_u16())})
    };
    (status, Json(reply))
}

/// An address nothing listens on.
pub async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}/")
}

/// Poll `check` until it holds or five seconds pass.
pub async fn eventually(what: &str, check: impl Fn() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for: {what}");
}
