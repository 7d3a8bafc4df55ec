//! `MootServer` — the control-plane Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use moot_rpc::{MethodRegistry, RpcContext};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::ws::{ConnectionTracker, run_control_socket};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Connection accounting.
    pub connections: Arc<ConnectionTracker>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// RPC method registry.
    pub registry: Arc<MethodRegistry>,
    /// RPC context shared across handlers.
    pub rpc_context: Arc<RpcContext>,
    /// Server configuration.
    pub config: ServerConfig,
    /// Prometheus metrics handle for rendering.
    pub metrics_handle: Arc<PrometheusHandle>,
}

/// The control-plane server.
pub struct MootServer {
    config: ServerConfig,
    registry: Arc<MethodRegistry>,
    connections: Arc<ConnectionTracker>,
    shutdown: Arc<ShutdownCoordinator>,
    rpc_context: Arc<RpcContext>,
    metrics_handle: Arc<PrometheusHandle>,
    start_time: Instant,
}

impl MootServer {
    /// Create a new server.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        registry: MethodRegistry,
        rpc_context: RpcContext,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
            connections: Arc::new(ConnectionTracker::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            rpc_context: Arc::new(rpc_context),
            metrics_handle: Arc::new(metrics_handle),
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes and middleware.
    #[must_use]
    pub fn router(&self) -> Router {
        let state = AppState {
            connections: Arc::clone(&self.connections),
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
            registry: Arc::clone(&self.registry),
            rpc_context: Arc::clone(&self.rpc_context),
            config: self.config.clone(),
            metrics_handle: Arc::clone(&self.metrics_handle),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_upgrade_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind to a TCP port and start serving. Returns the bound address and
    /// a join handle for the server task.
    #[instrument(skip_all, fields(host = %self.config.host, port = self.config.port))]
    pub async fn listen(
        &self,
    ) -> Result<(SocketAddr, tokio::task::JoinHandle<()>), std::io::Error> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let bound_addr = listener.local_addr()?;

        let methods = self.registry.methods().len();
        info!(addr = %bound_addr, methods, "control server started");

        let router = self.router();
        let shutdown_token = self.shutdown.token();

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown_token.cancelled().await;
                    info!("control server shutdown initiated");
                })
                .await;
            info!("control server shutdown complete");
        });

        Ok((bound_addr, handle))
    }

    /// Get the shutdown coordinator.
    #[must_use]
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the method registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<MethodRegistry> {
        &self.registry
    }

    /// Get the RPC context.
    #[must_use]
    pub fn rpc_context(&self) -> &Arc<RpcContext> {
        &self.rpc_context
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.connections.count();
    let live_sessions = state.rpc_context.sessions.live_session_count();
    Json(health::health_check(state.start_time, connections, live_sessions))
}

/// GET /metrics — Prometheus text format.
async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

/// GET /ws — WebSocket upgrade handler.
async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, StatusCode> {
    let current = state.connections.count();
    if current >= state.config.max_connections {
        tracing::warn!(
            current,
            max = state.config.max_connections,
            "connection limit reached, rejecting WebSocket upgrade"
        );
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    let registry = state.registry;
    let ctx = state.rpc_context;
    let tracker = state.connections;

    Ok(ws
        .max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| run_control_socket(socket, registry, ctx, tracker)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc as StdArc;
    use tower::ServiceExt;

    use moot_rpc::handlers::register_all;
    use moot_runtime::Orchestrator;
    use moot_sessions::{SessionStore, SessionStoreConfig};
    use moot_settings::MootSettings;
    use moot_state::BrainstormStore;

    fn make_rpc_context() -> (RpcContext, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let sessions = SessionStore::new(SessionStoreConfig {
            skip_browser: true,
            ..SessionStoreConfig::default()
        });
        let state = StdArc::new(BrainstormStore::new(dir.path()).unwrap());
        let orchestrator = StdArc::new(Orchestrator::new(
            StdArc::clone(&sessions),
            StdArc::clone(&state),
        ));
        (
            RpcContext::new(orchestrator, sessions, state, MootSettings::default()),
            dir,
        )
    }

    fn make_metrics_handle() -> PrometheusHandle {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .build_recorder()
            .handle()
    }

    fn make_server() -> (MootServer, tempfile::TempDir) {
        let (ctx, dir) = make_rpc_context();
        let mut registry = MethodRegistry::new();
        register_all(&mut registry);
        (
            MootServer::new(ServerConfig::default(), registry, ctx, make_metrics_handle()),
            dir,
        )
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let (server, _dir) = make_server();
        let app = server.router();

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["connections"], 0);
        assert_eq!(parsed["live_sessions"], 0);
    }

    #[tokio::test]
    async fn metrics_endpoint_renders() {
        let (server, _dir) = make_server();
        let app = server.router();

        let req = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let (server, _dir) = make_server();
        let app = server.router();

        let req = Request::builder()
            .uri("/nonexistent")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ws_endpoint_requires_upgrade() {
        let (server, _dir) = make_server();
        let app = server.router();

        let req = Request::builder().uri("/ws").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_ne!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn server_listen_binds_ephemeral_port() {
        let (server, _dir) = make_server();
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);

        server.shutdown().trigger();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn server_graceful_shutdown_completes() {
        let (server, _dir) = make_server();
        let (_, handle) = server.listen().await.unwrap();

        server.shutdown().trigger();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("shutdown timed out")
            .expect("join error");
    }

    #[tokio::test]
    async fn health_reachable_over_http_while_running() {
        let (server, _dir) = make_server();
        let (addr, handle) = server.listen().await.unwrap();

        let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
        assert!(resp.status().is_success());
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");

        server.shutdown().trigger();
        let _ = handle.await;
    }
}
