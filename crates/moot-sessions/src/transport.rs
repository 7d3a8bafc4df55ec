//! Per-session HTTP + WebSocket transport.
//!
//! Each session gets its own small Axum app: `GET /` serves the injected
//! question-renderer bundle, `GET /ws` upgrades into the single browser
//! WebSocket. The socket loop replays pending questions on connect,
//! forwards outbound frames from the store, and feeds inbound `response`
//! frames back into it. Malformed inbound frames are ignored.
//!
//! The session's shutdown token also terminates open sockets: without
//! that, the server's graceful shutdown would wait on the browser to
//! hang up.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use moot_core::SessionId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::protocol::ClientFrame;
use crate::store::SessionStore;

/// Outbound frame buffer per client.
const CLIENT_CHANNEL_CAPACITY: usize = 256;

/// How long socket teardown waits for queued frames (the `end` frame in
/// particular) to flush.
const FLUSH_TIMEOUT: Duration = Duration::from_millis(500);

/// Shared state for the per-session router.
#[derive(Clone)]
struct TransportState {
    store: Arc<SessionStore>,
    session_id: SessionId,
    shutdown: CancellationToken,
}

/// Build the router for one session's server.
pub(crate) fn router(
    store: Arc<SessionStore>,
    session_id: SessionId,
    shutdown: CancellationToken,
) -> Router {
    let state = TransportState {
        store,
        session_id,
        shutdown,
    };
    Router::new()
        .route("/", get(ui_handler))
        .route("/ws", get(ws_upgrade_handler))
        .with_state(state)
}

/// Serve the router until the shutdown token fires.
pub(crate) fn serve(
    listener: tokio::net::TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let _ = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
            })
            .await;
    })
}

/// GET / — the question-renderer bundle.
async fn ui_handler(State(state): State<TransportState>) -> Html<String> {
    Html(state.store.ui_html().to_string())
}

/// GET /ws — upgrade into the browser socket loop.
async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    State(state): State<TransportState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        run_browser_socket(socket, state.store, state.session_id, state.shutdown)
    })
}

/// Run the socket for a connected browser.
///
/// 1. Attaches the client to the store and replays pending questions
/// 2. Spawns the outbound forwarder (store frames → socket)
/// 3. Applies inbound `response` frames to the store
/// 4. Detaches on disconnect (without cancelling questions); on session
///    shutdown, flushes queued frames and closes the socket
async fn run_browser_socket(
    ws: WebSocket,
    store: Arc<SessionStore>,
    session_id: SessionId,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(CLIENT_CHANNEL_CAPACITY);

    let Some((epoch, replay)) = store.attach_client(&session_id, send_tx) else {
        debug!(session_id = %session_id, "socket for gone session, closing");
        return;
    };
    debug!(session_id = %session_id, replayed = replay.len(), "browser attached");

    for frame in replay {
        if ws_tx
            .send(Message::Text((*frame).clone().into()))
            .await
            .is_err()
        {
            store.detach_client(&session_id, epoch);
            return;
        }
    }

    // Outbound forwarder (store → socket). On session shutdown it drains
    // what is already queued, closes the socket, and exits.
    let outbound_shutdown = shutdown.clone();
    let outbound = tokio::spawn(async move {
        loop {
            tokio::select! {
                maybe = send_rx.recv() => match maybe {
                    Some(msg) => {
                        if ws_tx
                            .send(Message::Text((*msg).clone().into()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    None => break,
                },
                () = outbound_shutdown.cancelled() => {
                    while let Ok(msg) = send_rx.try_recv() {
                        if ws_tx
                            .send(Message::Text((*msg).clone().into()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            maybe = ws_rx.next() => match maybe {
                Some(Ok(Message::Text(text))) => {
                    handle_frame(&store, &session_id, text.as_str());
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Axum answers pings itself; binary frames are not part
                // of the protocol.
                Some(Ok(_)) => {}
            },
            () = shutdown.cancelled() => break,
        }
    }

    if shutdown.is_cancelled() {
        // Give the forwarder a moment to flush the end frame.
        let _ = tokio::time::timeout(FLUSH_TIMEOUT, outbound).await;
    } else {
        outbound.abort();
    }
    store.detach_client(&session_id, epoch);
    debug!(session_id = %session_id, "browser detached");
}

/// Apply a single inbound text frame. Malformed frames are ignored.
fn handle_frame(store: &SessionStore, session_id: &SessionId, text: &str) {
    match serde_json::from_str::<ClientFrame>(text) {
        Ok(ClientFrame::Connected) => {
            debug!(session_id = %session_id, "browser reported connected");
        }
        Ok(ClientFrame::Response { id, answer }) => {
            if !store.apply_response(session_id, &id, answer) {
                debug!(question_id = %id, "ignoring response for unknown or settled question");
            }
        }
        Err(e) => {
            debug!(error = %e, "ignoring malformed browser frame");
        }
    }
}
