//! Control-plane WebSocket handling: parse `RpcRequest` frames, dispatch
//! through the registry, write responses back.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use moot_rpc::{MethodRegistry, RpcContext, RpcRequest, RpcResponse};
use tracing::{debug, instrument, warn};

/// Fallback JSON for when response serialization itself fails.
const SERIALIZATION_FALLBACK: &str =
    r#"{"id":"unknown","success":false,"error":{"code":"INTERNAL_ERROR","message":"serialization failure"}}"#;

/// Counts live control-plane connections.
#[derive(Default)]
pub struct ConnectionTracker {
    active: AtomicUsize,
}

impl ConnectionTracker {
    /// Create a tracker with no connections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current connection count.
    #[must_use]
    pub fn count(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    fn enter(&self) {
        let _ = self.active.fetch_add(1, Ordering::Relaxed);
    }

    fn leave(&self) {
        let _ = self.active.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Handle an incoming WebSocket text message.
///
/// Parses the message as an `RpcRequest`, dispatches to the registry, and
/// returns the serialized `RpcResponse`.
#[instrument(skip_all, fields(method))]
pub async fn handle_message(
    message: &str,
    registry: &MethodRegistry,
    ctx: &RpcContext,
) -> String {
    let request: RpcRequest = match serde_json::from_str(message) {
        Ok(r) => r,
        Err(e) => {
            warn!("invalid JSON received");
            let resp =
                RpcResponse::error("unknown", "INVALID_PARAMS", format!("Invalid JSON: {e}"));
            return serialize_response(&resp);
        }
    };

    let _ = tracing::Span::current().record("method", request.method.as_str());
    debug!(method = request.method, id = request.id, "dispatching RPC");

    if !registry.has_method(&request.method) {
        warn!(method = request.method, "unknown RPC method");
    }

    let response = registry.dispatch(request, ctx).await;
    serialize_response(&response)
}

fn serialize_response(response: &RpcResponse) -> String {
    serde_json::to_string(response).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to serialize response");
        SERIALIZATION_FALLBACK.to_string()
    })
}

/// Run one agent connection until it closes.
pub async fn run_control_socket(
    ws: WebSocket,
    registry: Arc<MethodRegistry>,
    ctx: Arc<RpcContext>,
    tracker: Arc<ConnectionTracker>,
) {
    tracker.enter();
    let (mut ws_tx, mut ws_rx) = ws.split();

    while let Some(Ok(msg)) = ws_rx.next().await {
        match msg {
            Message::Text(text) => {
                let response = handle_message(text.as_str(), &registry, &ctx).await;
                if ws_tx.send(Message::Text(response.into())).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => {}
        }
    }

    tracker.leave();
    debug!("control connection closed");
}
