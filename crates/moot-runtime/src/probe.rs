//! The probe: decides whether a branch is finished.
//!
//! A pure function over a branch's Q&A history. An LLM-backed probe can be
//! substituted anywhere a [`ProbeVerdict`] is consumed, as long as it
//! produces the same shape.

use moot_core::QuestionType;
use moot_core::summary::{is_affirmation, summarize_answer};
use moot_state::{Branch, BranchQuestion};
use serde_json::{Value, json};

/// A branch concludes after this many answered questions.
const MAX_ANSWERS_PER_BRANCH: usize = 3;

/// A follow-up question the probe wants pushed.
#[derive(Clone, Debug, PartialEq)]
pub struct NextQuestion {
    /// Catalog type.
    pub question_type: QuestionType,
    /// Type-specific configuration payload.
    pub config: Value,
}

impl NextQuestion {
    /// The question text inside the config, for branch bookkeeping.
    #[must_use]
    pub fn text(&self) -> String {
        self.config
            .get("question")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned()
    }
}

/// The probe's decision for a branch.
#[derive(Clone, Debug, PartialEq)]
pub enum ProbeVerdict {
    /// The branch is finished; record the finding.
    Done {
        /// One-sentence synthesis of the branch.
        finding: String,
    },
    /// Unanswered questions remain; wait for them.
    Wait,
    /// Push this follow-up and keep exploring.
    FollowUp(NextQuestion),
}

/// Decide whether `branch` is finished or what to ask next.
///
/// Rules, in order:
/// 1. Unanswered questions → wait.
/// 2. Three answers → done.
/// 3. Last answer confirmed "yes" → done.
/// 4. Last answer confirmed "no" → ask what needs more discussion.
/// 5. One answer → a priority `pick_one`; two answers → a closing
///    `confirm`; anything else → done.
#[must_use]
pub fn probe(branch: &Branch) -> ProbeVerdict {
    if branch.has_pending_questions() {
        return ProbeVerdict::Wait;
    }

    let answered = branch.answered_questions();
    if answered.len() >= MAX_ANSWERS_PER_BRANCH {
        return ProbeVerdict::Done {
            finding: synthesize(branch),
        };
    }

    if let Some(last) = answered.last() {
        if last.question_type == QuestionType::Confirm {
            match confirm_choice(last) {
                Some("yes") => {
                    return ProbeVerdict::Done {
                        finding: synthesize(branch),
                    };
                }
                Some("no") => {
                    return ProbeVerdict::FollowUp(NextQuestion {
                        question_type: QuestionType::AskText,
                        config: json!({
                            "question": format!(
                                "What aspect of '{}' needs more discussion?",
                                branch.scope
                            ),
                        }),
                    });
                }
                _ => {}
            }
        }
    }

    match answered.len() {
        1 => ProbeVerdict::FollowUp(priority_question(&branch.scope)),
        2 => ProbeVerdict::FollowUp(NextQuestion {
            question_type: QuestionType::Confirm,
            config: json!({
                "question": format!("Is the direction clear for '{}'?", branch.scope),
            }),
        }),
        _ => ProbeVerdict::Done {
            finding: synthesize(branch),
        },
    }
}

/// One-sentence synthesis: the first answer's summary as the headline,
/// the remaining non-affirmation summaries as qualifiers.
#[must_use]
pub fn synthesize(branch: &Branch) -> String {
    let answered = branch.answered_questions();
    let mut summaries = answered
        .iter()
        .filter_map(|q| q.answer.as_ref())
        .map(summarize_answer);

    let Some(headline) = summaries.next() else {
        return format!("No input gathered for '{}'", branch.scope);
    };

    let qualifiers: Vec<String> = answered
        .iter()
        .skip(1)
        .filter_map(|q| q.answer.as_ref())
        .filter(|a| !is_affirmation(a))
        .map(summarize_answer)
        .collect();

    if qualifiers.is_empty() {
        headline
    } else {
        format!("{headline} ({})", qualifiers.join("; "))
    }
}

/// The `choice` field of a confirm answer, if present.
fn confirm_choice(question: &BranchQuestion) -> Option<&str> {
    question
        .answer
        .as_ref()
        .and_then(|a| a.get("choice"))
        .and_then(Value::as_str)
}

/// Scope-derived priority question asked after the first answer.
fn priority_question(scope: &str) -> NextQuestion {
    NextQuestion {
        question_type: QuestionType::PickOne,
        config: json!({
            "question": format!("What matters most for '{scope}'?"),
            "options": [
                {"id": "minimal", "label": "Keep it minimal"},
                {"id": "robust", "label": "Make it robust"},
                {"id": "extensible", "label": "Leave room to extend"},
            ],
        }),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use moot_core::{BranchId, QuestionId};

    fn branch_with(answers: Vec<(QuestionType, Option<Value>)>) -> Branch {
        let mut branch = Branch::exploring(BranchId::from("services"), "Which services".into());
        for (i, (question_type, answer)) in answers.into_iter().enumerate() {
            let answered_at = answer.as_ref().map(|_| Utc::now());
            branch.questions.push(BranchQuestion {
                id: QuestionId::from(format!("q_test000{i}")),
                question_type,
                text: format!("Q{i}"),
                config: json!({}),
                answer,
                answered_at,
            });
        }
        branch
    }

    #[test]
    fn pending_question_means_wait() {
        let branch = branch_with(vec![(QuestionType::AskText, None)]);
        assert_eq!(probe(&branch), ProbeVerdict::Wait);
    }

    #[test]
    fn pending_wins_over_answered() {
        let branch = branch_with(vec![
            (QuestionType::AskText, Some(json!({"text": "a"}))),
            (QuestionType::PickOne, None),
        ]);
        assert_eq!(probe(&branch), ProbeVerdict::Wait);
    }

    #[test]
    fn three_answers_is_done() {
        let branch = branch_with(vec![
            (QuestionType::AskText, Some(json!({"text": "api"}))),
            (QuestionType::PickOne, Some(json!({"selected": "robust"}))),
            (QuestionType::Confirm, Some(json!({"choice": "no"}))),
        ]);
        match probe(&branch) {
            ProbeVerdict::Done { finding } => {
                assert!(finding.contains("api"));
            }
            other => panic!("expected done, got {other:?}"),
        }
    }

    #[test]
    fn confirm_yes_is_done() {
        let branch = branch_with(vec![
            (QuestionType::AskText, Some(json!({"text": "api"}))),
            (QuestionType::Confirm, Some(json!({"choice": "yes"}))),
        ]);
        match probe(&branch) {
            ProbeVerdict::Done { finding } => {
                assert_eq!(finding, "api");
            }
            other => panic!("expected done, got {other:?}"),
        }
    }

    #[test]
    fn confirm_no_asks_for_more_discussion() {
        let branch = branch_with(vec![
            (QuestionType::AskText, Some(json!({"text": "api"}))),
            (QuestionType::Confirm, Some(json!({"choice": "no"}))),
        ]);
        match probe(&branch) {
            ProbeVerdict::FollowUp(next) => {
                assert_eq!(next.question_type, QuestionType::AskText);
                assert!(next.text().contains("Which services"));
                assert!(next.text().contains("more discussion"));
            }
            other => panic!("expected follow-up, got {other:?}"),
        }
    }

    #[test]
    fn one_answer_gets_priority_pick_one() {
        let branch = branch_with(vec![(QuestionType::AskText, Some(json!({"text": "api"})))]);
        match probe(&branch) {
            ProbeVerdict::FollowUp(next) => {
                assert_eq!(next.question_type, QuestionType::PickOne);
                assert!(next.text().contains("Which services"));
                let options = next.config["options"].as_array().unwrap();
                assert!(options.len() >= 2);
            }
            other => panic!("expected follow-up, got {other:?}"),
        }
    }

    #[test]
    fn two_answers_gets_closing_confirm() {
        let branch = branch_with(vec![
            (QuestionType::AskText, Some(json!({"text": "api"}))),
            (QuestionType::PickOne, Some(json!({"selected": "robust"}))),
        ]);
        match probe(&branch) {
            ProbeVerdict::FollowUp(next) => {
                assert_eq!(next.question_type, QuestionType::Confirm);
                assert!(next.text().contains("direction clear"));
            }
            other => panic!("expected follow-up, got {other:?}"),
        }
    }

    #[test]
    fn zero_answers_no_questions_is_done_with_placeholder() {
        let branch = branch_with(vec![]);
        match probe(&branch) {
            ProbeVerdict::Done { finding } => {
                assert!(finding.contains("Which services"));
            }
            other => panic!("expected done, got {other:?}"),
        }
    }

    // ── synthesize ──────────────────────────────────────────────────

    #[test]
    fn synthesize_headline_only() {
        let branch = branch_with(vec![(
            QuestionType::AskText,
            Some(json!({"text": "api, worker"})),
        )]);
        assert_eq!(synthesize(&branch), "api, worker");
    }

    #[test]
    fn synthesize_appends_qualifiers() {
        let branch = branch_with(vec![
            (QuestionType::AskText, Some(json!({"text": "api, worker"}))),
            (QuestionType::PickOne, Some(json!({"selected": "robust"}))),
        ]);
        assert_eq!(synthesize(&branch), "api, worker (robust)");
    }

    #[test]
    fn synthesize_excludes_yes_affirmations() {
        let branch = branch_with(vec![
            (QuestionType::AskText, Some(json!({"text": "api"}))),
            (QuestionType::PickOne, Some(json!({"selected": "robust"}))),
            (QuestionType::Confirm, Some(json!({"choice": "yes"}))),
        ]);
        // The closing "yes" is a pure affirmation, not a qualifier.
        assert_eq!(synthesize(&branch), "api (robust)");
    }

    #[test]
    fn synthesize_keeps_no_answers() {
        let branch = branch_with(vec![
            (QuestionType::AskText, Some(json!({"text": "api"}))),
            (QuestionType::Confirm, Some(json!({"choice": "no"}))),
            (QuestionType::AskText, Some(json!({"text": "error budget"}))),
        ]);
        assert_eq!(synthesize(&branch), "api (no; error budget)");
    }

    #[test]
    fn synthesize_skips_unanswered_questions() {
        let branch = branch_with(vec![
            (QuestionType::AskText, Some(json!({"text": "api"}))),
            (QuestionType::AskText, None),
        ]);
        assert_eq!(synthesize(&branch), "api");
    }
}
