//! Orchestrator error types.

use thiserror::Error;

/// Errors raised by orchestrator operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Live session store failure.
    #[error(transparent)]
    Sessions(#[from] moot_sessions::SessionStoreError),

    /// Branch state store failure.
    #[error(transparent)]
    State(#[from] moot_state::StateError),

    /// A substituted probe implementation failed for one answer.
    #[error("probe failed: {0}")]
    Probe(String),
}

impl OrchestratorError {
    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sessions(e) => e.code(),
            Self::State(e) => e.code(),
            Self::Probe(_) => "PROBE_FAILURE",
        }
    }
}
