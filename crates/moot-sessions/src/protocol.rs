//! The browser WebSocket frame protocol.
//!
//! All frames are JSON objects tagged by `type`. Malformed inbound frames
//! are ignored by the transport.

use moot_core::{QuestionId, QuestionType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server → client frames.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Render a new question.
    Question {
        /// Question ID.
        id: QuestionId,
        /// Catalog type.
        #[serde(rename = "questionType")]
        question_type: QuestionType,
        /// Type-specific configuration payload.
        config: Value,
    },
    /// Remove a pending question from the UI.
    Cancel {
        /// Question ID.
        id: QuestionId,
    },
    /// Session closed; the UI should stop accepting input.
    End,
}

/// Client → server frames.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Emitted once after the WebSocket opens.
    Connected,
    /// Answer submission.
    Response {
        /// Question being answered.
        id: QuestionId,
        /// Type-specific answer payload.
        answer: Value,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
