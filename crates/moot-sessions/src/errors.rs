//! Session store error types.

use moot_core::SessionId;
use thiserror::Error;

/// Errors raised by session store operations.
///
/// Normal non-success outcomes (timeout, cancelled, none-pending) are not
/// errors; they are encoded in the operation output shapes.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    /// Lookup on an unknown session ID.
    #[error("session '{0}' not found")]
    SessionNotFound(SessionId),

    /// The platform browser could not be launched; session creation was
    /// rolled back.
    #[error("failed to open browser at {url}: {message}")]
    BrowserOpenFailed {
        /// URL that was being opened.
        url: String,
        /// Launcher error description.
        message: String,
    },

    /// Binding the per-session server socket failed.
    #[error("failed to bind session server: {0}")]
    Bind(#[from] std::io::Error),
}

impl SessionStoreError {
    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::BrowserOpenFailed { .. } => "BROWSER_OPEN_FAILED",
            Self::Bind(_) => "BIND_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_not_found_display() {
        let err = SessionStoreError::SessionNotFound(SessionId::from("ses_missing1"));
        assert!(err.to_string().contains("ses_missing1"));
        assert_eq!(err.code(), "SESSION_NOT_FOUND");
    }

    #[test]
    fn browser_open_failed_display() {
        let err = SessionStoreError::BrowserOpenFailed {
            url: "http://localhost:4000".into(),
            message: "no display".into(),
        };
        assert!(err.to_string().contains("http://localhost:4000"));
        assert!(err.to_string().contains("no display"));
        assert_eq!(err.code(), "BROWSER_OPEN_FAILED");
    }

    #[test]
    fn bind_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use");
        let err: SessionStoreError = io.into();
        assert_eq!(err.code(), "BIND_ERROR");
        assert!(err.to_string().contains("in use"));
    }
}
