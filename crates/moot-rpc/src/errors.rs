//! RPC error codes and error type.

use crate::types::RpcErrorBody;

// ── Error code constants ────────────────────────────────────────────

/// Invalid or missing parameters.
pub const INVALID_PARAMS: &str = "INVALID_PARAMS";
/// Unexpected internal error.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
/// Method not found in the registry.
pub const METHOD_NOT_FOUND: &str = "METHOD_NOT_FOUND";
/// Browser session does not exist.
pub const SESSION_NOT_FOUND: &str = "SESSION_NOT_FOUND";
/// Brainstorm state already persisted for this session.
pub const SESSION_ALREADY_EXISTS: &str = "SESSION_ALREADY_EXISTS";
/// Branch does not exist in the brainstorm state.
pub const BRANCH_NOT_FOUND: &str = "BRANCH_NOT_FOUND";
/// Branch already concluded.
pub const BRANCH_ALREADY_DONE: &str = "BRANCH_ALREADY_DONE";
/// The platform browser could not be launched.
pub const BROWSER_OPEN_FAILED: &str = "BROWSER_OPEN_FAILED";

/// RPC error type returned by handlers.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Required parameter missing or wrong type.
    #[error("{message}")]
    InvalidParams {
        /// Description of what is wrong.
        message: String,
    },

    /// Requested resource not found.
    #[error("{message}")]
    NotFound {
        /// Specific error code (e.g. `SESSION_NOT_FOUND`).
        code: String,
        /// Human-readable message.
        message: String,
    },

    /// Internal server error.
    #[error("{message}")]
    Internal {
        /// Description.
        message: String,
    },

    /// Domain-specific error with arbitrary code.
    #[error("{message}")]
    Custom {
        /// Machine-readable code.
        code: String,
        /// Human-readable message.
        message: String,
    },
}

impl RpcError {
    /// Machine-readable error code for this variant.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::InvalidParams { .. } => INVALID_PARAMS,
            Self::NotFound { code, .. } | Self::Custom { code, .. } => code,
            Self::Internal { .. } => INTERNAL_ERROR,
        }
    }

    /// Convert into the wire-format error body.
    #[must_use]
    pub fn to_error_body(&self) -> RpcErrorBody {
        RpcErrorBody {
            code: self.code().to_owned(),
            message: self.to_string(),
            details: None,
        }
    }

    /// Convenience constructor for invalid parameters.
    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
        }
    }
}

impl From<moot_sessions::SessionStoreError> for RpcError {
    fn from(e: moot_sessions::SessionStoreError) -> Self {
        use moot_sessions::SessionStoreError as E;
        match &e {
            E::SessionNotFound(_) => Self::NotFound {
                code: SESSION_NOT_FOUND.to_owned(),
                message: e.to_string(),
            },
            E::BrowserOpenFailed { .. } => Self::Custom {
                code: BROWSER_OPEN_FAILED.to_owned(),
                message: e.to_string(),
            },
            E::Bind(_) => Self::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl From<moot_state::StateError> for RpcError {
    fn from(e: moot_state::StateError) -> Self {
        use moot_state::StateError as E;
        match &e {
            E::SessionNotFound(_) | E::BranchNotFound(_) => Self::NotFound {
                code: e.code().to_owned(),
                message: e.to_string(),
            },
            E::SessionAlreadyExists(_) | E::BranchAlreadyDone(_) => Self::Custom {
                code: e.code().to_owned(),
                message: e.to_string(),
            },
            E::Io(_) | E::Json(_) | E::Task(_) => Self::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl From<moot_runtime::OrchestratorError> for RpcError {
    fn from(e: moot_runtime::OrchestratorError) -> Self {
        match e {
            moot_runtime::OrchestratorError::Sessions(inner) => inner.into(),
            moot_runtime::OrchestratorError::State(inner) => inner.into(),
            moot_runtime::OrchestratorError::Probe(message) => Self::Custom {
                code: "PROBE_FAILURE".to_owned(),
                message,
            },
        }
    }
}
