//! # moot-server
//!
//! The control-plane server: one Axum HTTP + WebSocket endpoint where the
//! agent connects and issues RPC method calls (`brainstorm.create`,
//! `answer.next`, ...). Not to be confused with the per-session browser
//! servers owned by `moot-sessions`.
//!
//! Routes: `/health` (JSON status), `/metrics` (Prometheus text),
//! `/ws` (the RPC WebSocket).

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod server;
pub mod shutdown;
pub mod ws;

pub use config::ServerConfig;
pub use server::MootServer;
pub use shutdown::ShutdownCoordinator;
