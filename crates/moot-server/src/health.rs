//! Health check payload.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Response body for `GET /health`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the server is serving.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Current control-plane WebSocket connections.
    pub connections: usize,
    /// Live browser sessions.
    pub live_sessions: usize,
}

/// Build the current health snapshot.
#[must_use]
pub fn health_check(start_time: Instant, connections: usize, live_sessions: usize) -> HealthResponse {
    HealthResponse {
        status: "ok".to_string(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        live_sessions,
    }
}
