//! Live question types and the store's operation input/output shapes.

use chrono::{DateTime, Utc};
use moot_core::{QuestionId, QuestionStatus, QuestionType, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A live question owned by a session's queue.
///
/// `config` is opaque to this crate; the adapter layer validates its
/// per-type shape before it gets here. `retrieved` implements at-most-once
/// delivery to session-scoped consumers and never leaves the process.
#[derive(Clone, Debug)]
pub struct Question {
    /// Process-wide unique question ID.
    pub id: QuestionId,
    /// Owning session.
    pub session_id: SessionId,
    /// Catalog type.
    pub question_type: QuestionType,
    /// Type-specific configuration payload.
    pub config: Value,
    /// Lifecycle state.
    pub status: QuestionStatus,
    /// Answer payload, set iff `status == Answered`.
    pub response: Option<Value>,
    /// Whether a session-scoped consumer already took this answer.
    pub retrieved: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Answer time, set iff `status == Answered`.
    pub answered_at: Option<DateTime<Utc>>,
}

impl Question {
    /// Create a fresh pending question.
    #[must_use]
    pub fn pending(
        id: QuestionId,
        session_id: SessionId,
        question_type: QuestionType,
        config: Value,
    ) -> Self {
        Self {
            id,
            session_id,
            question_type,
            config,
            status: QuestionStatus::Pending,
            response: None,
            retrieved: false,
            created_at: Utc::now(),
            answered_at: None,
        }
    }
}

/// A seed question supplied to `start_session`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedQuestion {
    /// Catalog type.
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    /// Type-specific configuration payload.
    pub config: Value,
}

/// Result of `start_session`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionOutput {
    /// The new session's ID.
    pub session_id: SessionId,
    /// Browser URL for the session server.
    pub url: String,
    /// IDs of the seed questions, in insertion order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub question_ids: Vec<QuestionId>,
}

/// Input to `get_answer`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAnswerInput {
    /// Question to read.
    pub question_id: QuestionId,
    /// Suspend until the question resolves.
    #[serde(default)]
    pub block: bool,
    /// Wait budget in milliseconds (default 300 000).
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Result of `get_answer`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAnswerOutput {
    /// Whether an answer was obtained.
    pub completed: bool,
    /// Question status at resolution time.
    pub status: QuestionStatus,
    /// Answer payload when `completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

impl GetAnswerOutput {
    /// An answered outcome.
    #[must_use]
    pub fn answered(response: Value) -> Self {
        Self {
            completed: true,
            status: QuestionStatus::Answered,
            response: Some(response),
        }
    }

    /// A non-completed outcome carrying only a status.
    #[must_use]
    pub fn not_completed(status: QuestionStatus) -> Self {
        Self {
            completed: false,
            status,
            response: None,
        }
    }
}

/// Input to `get_next_answer`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetNextAnswerInput {
    /// Session to consume from.
    pub session_id: SessionId,
    /// Suspend until some question is answered.
    #[serde(default)]
    pub block: bool,
    /// Wait budget in milliseconds (default 300 000).
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Status of a `get_next_answer` resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAnswerStatus {
    /// A fresh answered question was delivered.
    Answered,
    /// Pending questions exist but none is answered yet (non-blocking call).
    Pending,
    /// Neither unretrieved answers nor pending questions exist.
    NonePending,
    /// The wait budget elapsed.
    Timeout,
}

/// Result of `get_next_answer`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetNextAnswerOutput {
    /// Whether an answer was delivered.
    pub completed: bool,
    /// Resolution status.
    pub status: NextAnswerStatus,
    /// Delivered question ID when `completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_id: Option<QuestionId>,
    /// Delivered question type when `completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_type: Option<QuestionType>,
    /// Answer payload when `completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

impl GetNextAnswerOutput {
    /// A delivered-answer outcome.
    #[must_use]
    pub fn answered(question_id: QuestionId, question_type: QuestionType, response: Value) -> Self {
        Self {
            completed: true,
            status: NextAnswerStatus::Answered,
            question_id: Some(question_id),
            question_type: Some(question_type),
            response: Some(response),
        }
    }

    /// A non-completed outcome carrying only a status.
    #[must_use]
    pub fn not_completed(status: NextAnswerStatus) -> Self {
        Self {
            completed: false,
            status,
            question_id: None,
            question_type: None,
            response: None,
        }
    }
}

/// Projection of a question for `list_questions`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSummary {
    /// Question ID.
    pub id: QuestionId,
    /// Catalog type.
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    /// Lifecycle state.
    pub status: QuestionStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Answer time, if answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answered_at: Option<DateTime<Utc>>,
}

/// Projection of a live session for listings and health output.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Session ID.
    pub id: SessionId,
    /// Optional human label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Bound server port.
    pub port: u16,
    /// Browser URL.
    pub url: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Whether a WebSocket client is attached.
    pub connected: bool,
    /// Number of questions ever pushed to this session.
    pub question_count: usize,
}

/// Payload delivered to question-scoped waiters.
#[derive(Clone, Debug)]
pub enum AnswerEvent {
    /// The question was answered with this payload.
    Answered(Value),
    /// The question was cancelled.
    Cancelled,
}

/// Payload delivered to session-scoped waiters.
#[derive(Clone, Debug)]
pub struct NextAnswer {
    /// Answered question.
    pub question_id: QuestionId,
    /// Its catalog type.
    pub question_type: QuestionType,
    /// Answer payload.
    pub response: Value,
}
