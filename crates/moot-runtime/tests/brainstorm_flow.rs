//! Full brainstorm lifecycle tests: create, answer every question a
//! scripted "human" sees, await completion, review, end.

use std::sync::Arc;
use std::time::Duration;

use moot_core::{QuestionStatus, QuestionType, SessionId};
use moot_runtime::{BranchSpec, InitialQuestion, Orchestrator};
use moot_sessions::{SessionStore, SessionStoreConfig};
use moot_state::{BranchStatus, BrainstormStore};
use serde_json::{Value, json};

fn stores() -> (tempfile::TempDir, Arc<SessionStore>, Arc<BrainstormStore>) {
    let dir = tempfile::tempdir().unwrap();
    let sessions = SessionStore::new(SessionStoreConfig {
        skip_browser: true,
        ..SessionStoreConfig::default()
    });
    let state = Arc::new(BrainstormStore::new(dir.path()).unwrap());
    (dir, sessions, state)
}

fn two_branches() -> Vec<BranchSpec> {
    vec![
        BranchSpec {
            id: "services".into(),
            scope: "Which services need the healthcheck".into(),
            initial_question: InitialQuestion {
                question_type: QuestionType::AskText,
                config: json!({"question": "Which services?"}),
            },
        },
        BranchSpec {
            id: "format".into(),
            scope: "Response format".into(),
            initial_question: InitialQuestion {
                question_type: QuestionType::PickOne,
                config: json!({
                    "question": "JSON or plain?",
                    "options": [
                        {"id": "j", "label": "JSON"},
                        {"id": "p", "label": "Plain"},
                    ],
                }),
            },
        },
    ]
}

/// The canned answer a scripted human gives per question type.
fn canned_answer(question_type: QuestionType) -> Value {
    match question_type {
        QuestionType::AskText => json!({"text": "api, worker"}),
        QuestionType::PickOne => json!({"selected": "robust"}),
        QuestionType::Confirm => json!({"choice": "yes"}),
        QuestionType::ShowPlan => json!({
            "approved": true,
            "annotations": {"services": "also cover the cron runner"},
        }),
        _ => json!({"text": "ok"}),
    }
}

/// Answer every pending question as it appears, until aborted.
fn spawn_responder(
    sessions: Arc<SessionStore>,
    browser_session_id: SessionId,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            for question in sessions.list_questions(Some(&browser_session_id)) {
                if question.status == QuestionStatus::Pending {
                    let _ = sessions.apply_response(
                        &browser_session_id,
                        &question.id,
                        canned_answer(question.question_type),
                    );
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
}

#[tokio::test]
async fn brainstorm_runs_to_completion_with_plan_review() {
    let (_dir, sessions, state) = stores();
    let orchestrator = Orchestrator::new(Arc::clone(&sessions), Arc::clone(&state));

    let out = orchestrator
        .create_brainstorm("Add healthcheck", two_branches())
        .await
        .unwrap();
    let responder = spawn_responder(Arc::clone(&sessions), out.browser_session_id.clone());

    let summary = tokio::time::timeout(
        Duration::from_secs(30),
        orchestrator.await_brainstorm_complete(&out.session_id, &out.browser_session_id),
    )
    .await
    .expect("brainstorm did not complete in time")
    .unwrap();
    responder.abort();

    assert!(state.is_session_complete(&out.session_id).await.unwrap());

    let persisted = state.get_session(&out.session_id).await.unwrap().unwrap();
    for branch in persisted.ordered_branches() {
        assert_eq!(branch.status, BranchStatus::Done, "{} not done", branch.id);
        assert!(
            branch.finding.as_deref().is_some_and(|f| !f.is_empty()),
            "{} has empty finding",
            branch.id
        );
    }

    assert!(summary.contains("Brainstorm complete"));
    assert!(summary.contains("Plan review: approved"));
    assert!(summary.contains("also cover the cron runner"));
}

#[tokio::test]
async fn branches_conclude_after_three_answers() {
    let (_dir, sessions, state) = stores();
    let orchestrator = Orchestrator::new(Arc::clone(&sessions), Arc::clone(&state));

    let out = orchestrator
        .create_brainstorm("Add healthcheck", two_branches())
        .await
        .unwrap();
    let responder = spawn_responder(Arc::clone(&sessions), out.browser_session_id.clone());

    let _ = tokio::time::timeout(
        Duration::from_secs(30),
        orchestrator.await_brainstorm_complete(&out.session_id, &out.browser_session_id),
    )
    .await
    .expect("brainstorm did not complete in time")
    .unwrap();
    responder.abort();

    let persisted = state.get_session(&out.session_id).await.unwrap().unwrap();
    for branch in persisted.ordered_branches() {
        let answered = branch.answered_questions().len();
        assert!(
            answered <= 3,
            "{} gathered {answered} answers, expected at most 3",
            branch.id
        );
    }
}

#[tokio::test]
async fn substituted_probe_completes_after_first_answer() {
    let (_dir, sessions, state) = stores();
    // An "LLM" probe that concludes each branch from its first answer.
    let orchestrator = Orchestrator::with_probe(
        Arc::clone(&sessions),
        Arc::clone(&state),
        Arc::new(|branch| {
            if branch.has_pending_questions() {
                Ok(moot_runtime::ProbeVerdict::Wait)
            } else {
                Ok(moot_runtime::ProbeVerdict::Done {
                    finding: moot_runtime::synthesize(branch),
                })
            }
        }),
    );

    let out = orchestrator
        .create_brainstorm("Add healthcheck", two_branches())
        .await
        .unwrap();
    let responder = spawn_responder(Arc::clone(&sessions), out.browser_session_id.clone());

    let _ = tokio::time::timeout(
        Duration::from_secs(30),
        orchestrator.await_brainstorm_complete(&out.session_id, &out.browser_session_id),
    )
    .await
    .expect("brainstorm did not complete in time")
    .unwrap();
    responder.abort();

    let persisted = state.get_session(&out.session_id).await.unwrap().unwrap();
    let services = persisted.ordered_branches()[0];
    assert_eq!(services.status, BranchStatus::Done);
    assert_eq!(services.questions.len(), 1);
    assert_eq!(services.finding.as_deref(), Some("api, worker"));
}

#[tokio::test]
async fn end_brainstorm_emits_findings_and_removes_state() {
    let (_dir, sessions, state) = stores();
    let orchestrator = Orchestrator::new(Arc::clone(&sessions), Arc::clone(&state));

    let out = orchestrator
        .create_brainstorm("Add healthcheck", two_branches())
        .await
        .unwrap();
    let responder = spawn_responder(Arc::clone(&sessions), out.browser_session_id.clone());

    let _ = tokio::time::timeout(
        Duration::from_secs(30),
        orchestrator.await_brainstorm_complete(&out.session_id, &out.browser_session_id),
    )
    .await
    .expect("brainstorm did not complete in time")
    .unwrap();
    responder.abort();

    let findings = orchestrator.end_brainstorm(&out.session_id).await.unwrap();
    assert!(findings.contains("[services]"));
    assert!(findings.contains("[format]"));

    // State file gone, browser session closed.
    assert!(state.get_session(&out.session_id).await.unwrap().is_none());
    assert!(!sessions.session_exists(&out.browser_session_id));
    assert!(state.list().unwrap().is_empty());
}
