//! # moot-runtime
//!
//! The control layer of the moot brainstorming service.
//!
//! - **Probe**: the pure decision function that, given a branch's Q&A
//!   history, yields either a follow-up question or a terminal finding
//! - **Orchestrator**: couples the live session store and the durable
//!   branch state store, advancing every branch to `done` and driving the
//!   final plan-review interaction

#![deny(unsafe_code)]

pub mod errors;
pub mod orchestrator;
pub mod probe;

pub use errors::OrchestratorError;
pub use orchestrator::{BranchSpec, CreateBrainstormOutput, InitialQuestion, Orchestrator, ProbeFn};
pub use probe::{NextQuestion, ProbeVerdict, probe, synthesize};
