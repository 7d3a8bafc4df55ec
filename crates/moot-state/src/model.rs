//! The durable brainstorm data model.
//!
//! These structs are the persistence schema: they serialize to the
//! per-session JSON file with snake_case field names, and every field of
//! the file round-trips through them.

use chrono::{DateTime, Utc};
use moot_core::{BranchId, QuestionId, QuestionType, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Lifecycle state of an exploration branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchStatus {
    /// The branch is still being explored.
    Exploring,
    /// The branch concluded with a finding.
    Done,
}

/// A question recorded against a branch, with its eventual answer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BranchQuestion {
    /// Live question ID this entry mirrors.
    pub id: QuestionId,
    /// Catalog type.
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    /// The question text shown to the human.
    pub text: String,
    /// Type-specific configuration payload.
    pub config: Value,
    /// Answer payload, once recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<Value>,
    /// When the answer was recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answered_at: Option<DateTime<Utc>>,
}

impl BranchQuestion {
    /// Whether this question has an answer recorded.
    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.answer.is_some()
    }
}

/// Input for appending a question to a branch.
#[derive(Clone, Debug, Deserialize)]
pub struct NewBranchQuestion {
    /// Live question ID.
    pub id: QuestionId,
    /// Catalog type.
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    /// The question text shown to the human.
    pub text: String,
    /// Type-specific configuration payload.
    pub config: Value,
}

/// One parallel strand of exploration within a brainstorm.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Branch {
    /// Caller-chosen ID, unique within the session.
    pub id: BranchId,
    /// One-line description of what this branch explores.
    pub scope: String,
    /// Lifecycle state.
    pub status: BranchStatus,
    /// Ordered question/answer history.
    pub questions: Vec<BranchQuestion>,
    /// One-sentence synthesis, set iff `status == Done`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finding: Option<String>,
}

impl Branch {
    /// Create a fresh exploring branch.
    #[must_use]
    pub fn exploring(id: BranchId, scope: String) -> Self {
        Self {
            id,
            scope,
            status: BranchStatus::Exploring,
            questions: Vec::new(),
            finding: None,
        }
    }

    /// Questions that carry an answer, in order.
    #[must_use]
    pub fn answered_questions(&self) -> Vec<&BranchQuestion> {
        self.questions.iter().filter(|q| q.is_answered()).collect()
    }

    /// Whether any question is still awaiting its answer.
    #[must_use]
    pub fn has_pending_questions(&self) -> bool {
        self.questions.iter().any(|q| !q.is_answered())
    }
}

/// Seed descriptor for a branch at session creation.
#[derive(Clone, Debug, Deserialize)]
pub struct BranchSeed {
    /// Caller-chosen ID.
    pub id: BranchId,
    /// One-line description.
    pub scope: String,
}

/// The complete durable state of one brainstorm session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BrainstormState {
    /// The brainstorm's own session ID.
    pub session_id: String,
    /// The user's original prompt.
    pub request: String,
    /// The live browser session this state is bound to; reset on reopen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_session_id: Option<SessionId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Refreshed on every mutation.
    pub updated_at: DateTime<Utc>,
    /// Branches by ID.
    pub branches: HashMap<BranchId, Branch>,
    /// Stable iteration order over `branches`.
    pub branch_order: Vec<BranchId>,
}

impl BrainstormState {
    /// Initialize a state with every branch `exploring`, preserving input
    /// order in `branch_order`.
    #[must_use]
    pub fn new(session_id: String, request: String, seeds: Vec<BranchSeed>) -> Self {
        let now = Utc::now();
        let mut branches = HashMap::with_capacity(seeds.len());
        let mut branch_order = Vec::with_capacity(seeds.len());
        for seed in seeds {
            branch_order.push(seed.id.clone());
            let _ = branches.insert(seed.id.clone(), Branch::exploring(seed.id, seed.scope));
        }
        Self {
            session_id,
            request,
            browser_session_id: None,
            created_at: now,
            updated_at: now,
            branches,
            branch_order,
        }
    }

    /// The branch owning `question_id`, if any.
    #[must_use]
    pub fn branch_of_question(&self, question_id: &QuestionId) -> Option<&Branch> {
        self.branch_order
            .iter()
            .filter_map(|id| self.branches.get(id))
            .find(|b| b.questions.iter().any(|q| q.id == *question_id))
    }

    /// First branch in `branch_order` still `exploring`, if any.
    #[must_use]
    pub fn next_exploring_branch(&self) -> Option<&Branch> {
        self.branch_order
            .iter()
            .filter_map(|id| self.branches.get(id))
            .find(|b| b.status == BranchStatus::Exploring)
    }

    /// Whether every branch is `done`.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.branches.values().all(|b| b.status == BranchStatus::Done)
    }

    /// Branches in `branch_order`.
    #[must_use]
    pub fn ordered_branches(&self) -> Vec<&Branch> {
        self.branch_order
            .iter()
            .filter_map(|id| self.branches.get(id))
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
