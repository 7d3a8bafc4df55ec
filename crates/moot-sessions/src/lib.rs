//! # moot-sessions
//!
//! Live browser-session management for the moot brainstorming service.
//!
//! This crate owns:
//!
//! - **Waiter registry**: a generic FIFO notification primitive keyed by
//!   string identifiers, with register-with-cancellation, notify-all,
//!   notify-first, and clear
//! - **Session store**: per-session question queues, blocking per-question
//!   and per-session answer consumers with timeout and cancellation, and
//!   the question → session index
//! - **Browser transport**: one small Axum HTTP + WebSocket server per
//!   session on an ephemeral port, serving the question-renderer bundle and
//!   the `/ws` frame protocol
//! - **Browser opener**: launching the platform browser at a session URL

#![deny(unsafe_code)]

pub mod browser;
pub mod errors;
pub mod protocol;
pub mod store;
mod transport;
pub mod types;
pub mod waiters;

pub use browser::{BrowserOpener, PlatformOpener};
pub use errors::SessionStoreError;
pub use store::{SessionStore, SessionStoreConfig};
pub use types::{
    GetAnswerInput, GetAnswerOutput, GetNextAnswerInput, GetNextAnswerOutput, NextAnswerStatus,
    Question, QuestionSummary, SeedQuestion, SessionInfo, StartSessionOutput,
};
