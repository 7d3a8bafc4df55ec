//! # moot-rpc
//!
//! The tool-call surface of the moot service: a thin adapter mapping
//! JSON-RPC-style method calls onto the session store, the branch state
//! store, and the orchestrator.
//!
//! - **Wire types**: `RpcRequest`, `RpcResponse`, `RpcErrorBody`
//! - **Registry**: `MethodRegistry` with async `MethodHandler`s and
//!   dispatch metrics
//! - **Validation**: per-question-type `config` shape checks and boundary
//!   rules (port ranges, parameter sizes)
//! - **Handlers**: `session.*`, `question.*`, `answer.*`, `brainstorm.*`

#![deny(unsafe_code)]

pub mod context;
pub mod errors;
pub mod handlers;
pub mod registry;
pub mod types;
pub mod validation;

pub use context::RpcContext;
pub use errors::RpcError;
pub use registry::{MethodHandler, MethodRegistry};
pub use types::{RpcErrorBody, RpcRequest, RpcResponse};
