//! # moot-core
//!
//! Foundation types for the moot brainstorming service.
//!
//! This crate provides the shared vocabulary that all other moot crates
//! depend on:
//!
//! - **Branded IDs**: `SessionId`, `QuestionId`, `BranchId` as newtypes for
//!   type safety, with the wire-format `ses_`/`q_` short-id generators
//! - **Question catalog**: the closed `QuestionType` set the browser can
//!   render, plus the `QuestionStatus` lifecycle enum
//! - **Answer summaries**: derivation of a one-line human summary from an
//!   opaque answer payload

#![deny(unsafe_code)]

pub mod catalog;
pub mod ids;
pub mod summary;

pub use catalog::{QuestionStatus, QuestionType};
pub use ids::{BranchId, QuestionId, SessionId};
