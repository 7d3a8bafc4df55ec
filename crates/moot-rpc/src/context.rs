//! Shared context handed to every RPC handler.

use std::sync::Arc;
use std::time::Instant;

use moot_runtime::Orchestrator;
use moot_sessions::SessionStore;
use moot_settings::MootSettings;
use moot_state::BrainstormStore;

/// Dependencies every handler can reach.
#[derive(Clone)]
pub struct RpcContext {
    /// The brainstorm orchestrator.
    pub orchestrator: Arc<Orchestrator>,
    /// The live browser session store.
    pub sessions: Arc<SessionStore>,
    /// The durable branch state store.
    pub state: Arc<BrainstormStore>,
    /// Loaded settings.
    pub settings: MootSettings,
    /// When the server process started.
    pub server_start_time: Instant,
}

impl RpcContext {
    /// Build a context over the given stores.
    #[must_use]
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        sessions: Arc<SessionStore>,
        state: Arc<BrainstormStore>,
        settings: MootSettings,
    ) -> Self {
        Self {
            orchestrator,
            sessions,
            state,
            settings,
            server_start_time: Instant::now(),
        }
    }
}
