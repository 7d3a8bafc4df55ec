//! Branch state store error types.

use moot_core::BranchId;
use thiserror::Error;

/// Errors raised by branch state store operations.
#[derive(Debug, Error)]
pub enum StateError {
    /// `create_session` on a session that is already persisted.
    #[error("brainstorm session '{0}' already exists")]
    SessionAlreadyExists(String),

    /// Operation on a session with no persisted state.
    #[error("brainstorm session '{0}' not found")]
    SessionNotFound(String),

    /// Operation on an unknown branch.
    #[error("branch '{0}' not found")]
    BranchNotFound(BranchId),

    /// Mutation of a branch that already reached `done`.
    #[error("branch '{0}' is already done")]
    BranchAlreadyDone(BranchId),

    /// Filesystem failure while persisting or loading.
    #[error("state persistence I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// State file contents could not be (de)serialized.
    #[error("state serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The blocking persistence task failed to run.
    #[error("persistence task failed: {0}")]
    Task(String),
}

impl StateError {
    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::SessionAlreadyExists(_) => "SESSION_ALREADY_EXISTS",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::BranchNotFound(_) => "BRANCH_NOT_FOUND",
            Self::BranchAlreadyDone(_) => "BRANCH_ALREADY_DONE",
            Self::Io(_) | Self::Task(_) => "STATE_IO_ERROR",
            Self::Json(_) => "STATE_SERDE_ERROR",
        }
    }
}
