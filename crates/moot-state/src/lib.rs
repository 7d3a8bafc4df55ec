//! # moot-state
//!
//! Durable brainstorm state for the moot service.
//!
//! One JSON file per brainstorm session holds its branch graph: branches,
//! their question/answer history, and findings. All mutating operations on
//! a session are serialized through a per-session async mutex held across
//! the read-modify-write *and* the persist, so concurrent answer
//! recordings can never drop writes. Different sessions never contend.

#![deny(unsafe_code)]

pub mod errors;
pub mod model;
pub mod store;

pub use errors::StateError;
pub use model::{Branch, BranchQuestion, BranchSeed, BranchStatus, BrainstormState, NewBranchQuestion};
pub use store::BrainstormStore;
