//! The fixed question-type catalog and the question lifecycle enum.
//!
//! The catalog is closed: the browser bundle knows how to render exactly
//! these types, and the adapter layer validates per-type `config` shapes
//! against the same set. The core treats `config` and `answer` payloads as
//! opaque JSON.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A question type the browser can render.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// Single choice from a list of options.
    PickOne,
    /// Multiple choices from a list of options.
    PickMany,
    /// Yes / no / cancel confirmation.
    Confirm,
    /// Free-form text input.
    AskText,
    /// Image upload.
    AskImage,
    /// File upload.
    AskFile,
    /// Code input with optional language.
    AskCode,
    /// Present options with free-form feedback.
    ShowOptions,
    /// Present a diff for approve / reject / edit.
    ShowDiff,
    /// Present a sectioned plan for approval with per-section annotations.
    ShowPlan,
    /// Present one section for approve / revise.
    ReviewSection,
    /// Order items by preference.
    Rank,
    /// Numeric rating per item.
    Rate,
    /// Thumbs up / down.
    Thumbs,
    /// Single emoji reaction.
    EmojiReact,
    /// Numeric value on a range.
    Slider,
}

impl QuestionType {
    /// Every catalog entry, in wire order.
    pub const ALL: [Self; 16] = [
        Self::PickOne,
        Self::PickMany,
        Self::Confirm,
        Self::AskText,
        Self::AskImage,
        Self::AskFile,
        Self::AskCode,
        Self::ShowOptions,
        Self::ShowDiff,
        Self::ShowPlan,
        Self::ReviewSection,
        Self::Rank,
        Self::Rate,
        Self::Thumbs,
        Self::EmojiReact,
        Self::Slider,
    ];

    /// The snake_case wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PickOne => "pick_one",
            Self::PickMany => "pick_many",
            Self::Confirm => "confirm",
            Self::AskText => "ask_text",
            Self::AskImage => "ask_image",
            Self::AskFile => "ask_file",
            Self::AskCode => "ask_code",
            Self::ShowOptions => "show_options",
            Self::ShowDiff => "show_diff",
            Self::ShowPlan => "show_plan",
            Self::ReviewSection => "review_section",
            Self::Rank => "rank",
            Self::Rate => "rate",
            Self::Thumbs => "thumbs",
            Self::EmojiReact => "emoji_react",
            Self::Slider => "slider",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown question type name.
#[derive(Debug, thiserror::Error)]
#[error("unknown question type '{0}'")]
pub struct UnknownQuestionType(pub String);

impl FromStr for QuestionType {
    type Err = UnknownQuestionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownQuestionType(s.to_owned()))
    }
}

/// Lifecycle state of a live question.
///
/// `Pending` is the only non-terminal state. Transitions: `Pending →
/// Answered` on a client response, `Pending → Cancelled` on explicit
/// cancel, `Pending → Timeout` when a blocking consumer times out on this
/// specific question.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
    /// Awaiting an answer from the browser.
    Pending,
    /// Answered by the browser; the response payload is set.
    Answered,
    /// Explicitly cancelled; never answered.
    Cancelled,
    /// A blocking consumer timed out waiting on this question.
    Timeout,
}

impl QuestionStatus {
    /// Whether this state is final.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// The snake_case wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Answered => "answered",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for QuestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_closed_at_sixteen() {
        assert_eq!(QuestionType::ALL.len(), 16);
    }

    #[test]
    fn wire_names_roundtrip_through_from_str() {
        for t in QuestionType::ALL {
            let parsed: QuestionType = t.as_str().parse().unwrap();
            assert_eq!(parsed, t);
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = "ask_riddle".parse::<QuestionType>().unwrap_err();
        assert!(err.to_string().contains("ask_riddle"));
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&QuestionType::PickOne).unwrap();
        assert_eq!(json, "\"pick_one\"");
        let back: QuestionType = serde_json::from_str("\"emoji_react\"").unwrap();
        assert_eq!(back, QuestionType::EmojiReact);
    }

    #[test]
    fn serde_rejects_unknown_type() {
        let result: Result<QuestionType, _> = serde_json::from_str("\"ask_riddle\"");
        assert!(result.is_err());
    }

    #[test]
    fn display_matches_as_str() {
        assert_eq!(QuestionType::ShowPlan.to_string(), "show_plan");
        assert_eq!(QuestionType::AskText.to_string(), "ask_text");
    }

    #[test]
    fn pending_is_the_only_non_terminal_status() {
        assert!(!QuestionStatus::Pending.is_terminal());
        assert!(QuestionStatus::Answered.is_terminal());
        assert!(QuestionStatus::Cancelled.is_terminal());
        assert!(QuestionStatus::Timeout.is_terminal());
    }

    #[test]
    fn status_serde_uses_snake_case() {
        let json = serde_json::to_string(&QuestionStatus::Timeout).unwrap();
        assert_eq!(json, "\"timeout\"");
        let back: QuestionStatus = serde_json::from_str("\"answered\"").unwrap();
        assert_eq!(back, QuestionStatus::Answered);
    }

    #[test]
    fn status_display() {
        assert_eq!(QuestionStatus::Pending.to_string(), "pending");
        assert_eq!(QuestionStatus::Cancelled.to_string(), "cancelled");
    }
}
