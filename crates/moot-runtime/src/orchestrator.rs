//! The brainstorm orchestrator.
//!
//! Couples the live session store (questions, answers, browser) and the
//! durable branch state store. `create_brainstorm` opens a browser session
//! with one seed question per branch; `await_brainstorm_complete` consumes
//! answers, routes each to its branch, invokes the probe, and pushes
//! follow-ups until every branch is done, then drives the plan-review
//! interaction.

use std::fmt::Write as _;
use std::sync::Arc;

use moot_core::summary::summarize_answer;
use moot_core::{BranchId, QuestionId, QuestionType, SessionId};
use moot_sessions::{
    GetNextAnswerInput, NextAnswerStatus, SeedQuestion, SessionStore, SessionStoreError,
};
use moot_state::{
    Branch, BranchSeed, BranchStatus, BrainstormState, BrainstormStore, NewBranchQuestion,
    StateError,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use crate::errors::OrchestratorError;
use crate::probe::{ProbeVerdict, probe};

/// Hard cap on answer-consumption iterations per `await` call.
const MAX_ITERATIONS: usize = 50;

/// Wait budget for each answer read (5 minutes).
const ANSWER_TIMEOUT_MS: u64 = 300_000;

/// Wait budget for the plan-review response (10 minutes).
const REVIEW_TIMEOUT_MS: u64 = 600_000;

/// Probe implementation: rules by default, substitutable by an LLM-backed
/// variant returning the same verdict shape.
pub type ProbeFn = Arc<dyn Fn(&Branch) -> Result<ProbeVerdict, String> + Send + Sync>;

/// The seed question a branch opens with.
#[derive(Clone, Debug, Deserialize)]
pub struct InitialQuestion {
    /// Catalog type.
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    /// Type-specific configuration payload.
    pub config: Value,
}

/// One branch of a new brainstorm.
#[derive(Clone, Debug, Deserialize)]
pub struct BranchSpec {
    /// Caller-chosen branch ID.
    pub id: BranchId,
    /// One-line description of what the branch explores.
    pub scope: String,
    /// Seed question pushed when the session opens.
    pub initial_question: InitialQuestion,
}

/// Result of `create_brainstorm`.
#[derive(Clone, Debug)]
pub struct CreateBrainstormOutput {
    /// The brainstorm's state-store session ID.
    pub session_id: String,
    /// The live browser session bound to it.
    pub browser_session_id: SessionId,
    /// Browser URL.
    pub url: String,
    /// Human summary naming branches and URL.
    pub summary: String,
}

/// Review outcome extracted from a `show_plan` response.
#[derive(Clone, Debug, Default)]
struct ReviewOutcome {
    approved: bool,
    annotations: Vec<(String, String)>,
    feedback: Option<String>,
}

/// Drives brainstorm sessions from creation to findings.
#[derive(Clone)]
pub struct Orchestrator {
    sessions: Arc<SessionStore>,
    state: Arc<BrainstormStore>,
    probe: ProbeFn,
}

impl Orchestrator {
    /// Create an orchestrator using the rules-based probe.
    #[must_use]
    pub fn new(sessions: Arc<SessionStore>, state: Arc<BrainstormStore>) -> Self {
        Self::with_probe(sessions, state, Arc::new(|branch| Ok(probe(branch))))
    }

    /// Create an orchestrator with a substituted probe.
    #[must_use]
    pub fn with_probe(
        sessions: Arc<SessionStore>,
        state: Arc<BrainstormStore>,
        probe: ProbeFn,
    ) -> Self {
        Self {
            sessions,
            state,
            probe,
        }
    }

    /// The live session store (for adapter-layer passthrough operations).
    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// The branch state store.
    #[must_use]
    pub fn state(&self) -> &Arc<BrainstormStore> {
        &self.state
    }

    // ── create ──────────────────────────────────────────────────────────

    /// Create a brainstorm: durable state, a browser session with one
    /// scope-tagged seed question per branch, and the binding between them.
    #[instrument(skip_all, fields(branches = branches.len()))]
    pub async fn create_brainstorm(
        &self,
        request: &str,
        branches: Vec<BranchSpec>,
    ) -> Result<CreateBrainstormOutput, OrchestratorError> {
        let session_id = SessionId::generate().into_inner();
        let seeds = branches
            .iter()
            .map(|b| BranchSeed {
                id: b.id.clone(),
                scope: b.scope.clone(),
            })
            .collect();
        self.state.create_session(&session_id, request, seeds).await?;

        let seed_questions: Vec<SeedQuestion> = branches
            .iter()
            .map(|b| SeedQuestion {
                question_type: b.initial_question.question_type,
                config: tag_config_with_scope(&b.initial_question.config, &b.scope),
            })
            .collect();

        let started = match self
            .sessions
            .start_session(Some(request.to_owned()), seed_questions)
            .await
        {
            Ok(started) => started,
            Err(e) => {
                // The browser session never opened; drop the durable state
                // rather than leaving an orphan.
                let _ = self.state.delete_session(&session_id).await;
                return Err(e.into());
            }
        };

        self.state
            .set_browser_session_id(&session_id, started.session_id.clone())
            .await?;

        for (branch, question_id) in branches.iter().zip(&started.question_ids) {
            let config = tag_config_with_scope(&branch.initial_question.config, &branch.scope);
            let text = question_text(&config, &branch.scope);
            self.state
                .add_question_to_branch(
                    &session_id,
                    &branch.id,
                    NewBranchQuestion {
                        id: question_id.clone(),
                        question_type: branch.initial_question.question_type,
                        text,
                        config,
                    },
                )
                .await?;
        }

        let names: Vec<&str> = branches.iter().map(|b| b.id.as_str()).collect();
        let summary = format!(
            "Started brainstorm {session_id} with {} branches ({}). Open {} to answer the questions.",
            branches.len(),
            names.join(", "),
            started.url,
        );
        info!(session_id, browser_session_id = %started.session_id, "brainstorm created");

        Ok(CreateBrainstormOutput {
            session_id,
            browser_session_id: started.session_id,
            url: started.url,
            summary,
        })
    }

    // ── the main loop ───────────────────────────────────────────────────

    /// Consume answers until every branch is done (or the wait budget
    /// runs out), then drive the plan review.
    ///
    /// Answer processing runs in spawned tasks; their errors are logged
    /// and never abort the loop. Calling again resumes an incomplete
    /// brainstorm.
    #[instrument(skip(self), fields(session_id, browser_session_id = %browser_session_id))]
    pub async fn await_brainstorm_complete(
        &self,
        session_id: &str,
        browser_session_id: &SessionId,
    ) -> Result<String, OrchestratorError> {
        let mut tasks: JoinSet<()> = JoinSet::new();

        for _ in 0..MAX_ITERATIONS {
            if self.state.is_session_complete(session_id).await? {
                break;
            }

            let next = self
                .sessions
                .get_next_answer(GetNextAnswerInput {
                    session_id: browser_session_id.clone(),
                    block: true,
                    timeout_ms: Some(ANSWER_TIMEOUT_MS),
                })
                .await;

            if !next.completed {
                match next.status {
                    // Everything currently asked is settled; in-flight
                    // processing may push more.
                    NextAnswerStatus::NonePending => {
                        while tasks.join_next().await.is_some() {}
                        continue;
                    }
                    NextAnswerStatus::Timeout => break,
                    _ => continue,
                }
            }

            let (Some(question_id), Some(response)) = (next.question_id, next.response) else {
                continue;
            };
            let orchestrator = self.clone();
            let session_id = session_id.to_owned();
            let browser_session_id = browser_session_id.clone();
            let _ = tasks.spawn(async move {
                if let Err(e) = orchestrator
                    .process_answer(&session_id, &browser_session_id, &question_id, response)
                    .await
                {
                    warn!(error = %e, question_id = %question_id, "failed to process answer");
                }
            });
        }

        while tasks.join_next().await.is_some() {}

        let Some(state) = self.state.get_session(session_id).await? else {
            return Ok(format!("Brainstorm {session_id} no longer exists."));
        };
        if !state.is_complete() {
            return Ok(in_progress_summary(&state));
        }
        self.run_plan_review(browser_session_id, &state).await
    }

    /// Route one answer to its branch, probe, and push any follow-up.
    #[instrument(skip(self, response), fields(session_id, question_id = %question_id))]
    pub async fn process_answer(
        &self,
        session_id: &str,
        browser_session_id: &SessionId,
        question_id: &QuestionId,
        response: Value,
    ) -> Result<(), OrchestratorError> {
        let Some(state) = self.state.get_session(session_id).await? else {
            return Ok(());
        };
        let Some(branch_id) = state.branch_of_question(question_id).map(|b| b.id.clone()) else {
            warn!(question_id = %question_id, "answer does not belong to any branch");
            return Ok(());
        };

        let _ = self
            .state
            .record_answer(session_id, question_id, response)
            .await?;

        // Probe the branch exactly as the serialized write left it.
        let Some(state) = self.state.get_session(session_id).await? else {
            return Ok(());
        };
        let Some(branch) = state.branches.get(&branch_id) else {
            return Ok(());
        };

        match (self.probe)(branch).map_err(OrchestratorError::Probe)? {
            ProbeVerdict::Done { finding } => {
                info!(branch_id = %branch_id, "branch complete");
                self.state
                    .complete_branch(session_id, &branch_id, finding)
                    .await?;
            }
            ProbeVerdict::FollowUp(next) => {
                let text = question_text(&next.config, &branch.scope);
                let new_question_id = self.sessions.push_question(
                    browser_session_id,
                    next.question_type,
                    next.config.clone(),
                )?;
                self.state
                    .add_question_to_branch(
                        session_id,
                        &branch_id,
                        NewBranchQuestion {
                            id: new_question_id,
                            question_type: next.question_type,
                            text,
                            config: next.config,
                        },
                    )
                    .await?;
            }
            ProbeVerdict::Wait => {}
        }
        Ok(())
    }

    // ── plan review ─────────────────────────────────────────────────────

    /// Push the `show_plan` payload and wait for the review response.
    async fn run_plan_review(
        &self,
        browser_session_id: &SessionId,
        state: &BrainstormState,
    ) -> Result<String, OrchestratorError> {
        let config = json!({
            "question": "Review the brainstorm findings",
            "sections": plan_sections(state),
        });
        match self
            .sessions
            .push_question(browser_session_id, QuestionType::ShowPlan, config)
        {
            Ok(_question_id) => {}
            // The browser session is already gone; return findings
            // without review.
            Err(SessionStoreError::SessionNotFound(_)) => {
                return Ok(findings_summary(state, None));
            }
            Err(e) => return Err(e.into()),
        }

        let review = self
            .sessions
            .get_next_answer(GetNextAnswerInput {
                session_id: browser_session_id.clone(),
                block: true,
                timeout_ms: Some(REVIEW_TIMEOUT_MS),
            })
            .await;

        let outcome = review.completed.then(|| {
            let response = review.response.unwrap_or(Value::Null);
            let approved = response.get("approved").and_then(Value::as_bool) == Some(true)
                || response.get("choice").and_then(Value::as_str) == Some("yes");
            let annotations = response
                .get("annotations")
                .and_then(Value::as_object)
                .map(|map| {
                    map.iter()
                        .filter_map(|(section, note)| {
                            note.as_str().map(|n| (section.clone(), n.to_owned()))
                        })
                        .collect()
                })
                .unwrap_or_default();
            let feedback = response
                .get("feedback")
                .or_else(|| response.get("text"))
                .and_then(Value::as_str)
                .map(str::to_owned);
            ReviewOutcome {
                approved,
                annotations,
                feedback,
            }
        });

        Ok(findings_summary(state, outcome))
    }

    // ── teardown & reporting ────────────────────────────────────────────

    /// End a brainstorm: close its browser session, emit findings, delete
    /// the persisted state.
    #[instrument(skip(self), fields(session_id))]
    pub async fn end_brainstorm(&self, session_id: &str) -> Result<String, OrchestratorError> {
        let Some(state) = self.state.get_session(session_id).await? else {
            return Err(StateError::SessionNotFound(session_id.to_owned()).into());
        };
        if let Some(browser_session_id) = &state.browser_session_id {
            let _ = self.sessions.end_session(browser_session_id).await;
        }
        let findings = findings_summary(&state, None);
        self.state.delete_session(session_id).await?;
        info!(session_id, "brainstorm ended");
        Ok(findings)
    }

    /// Render the current status of every branch.
    pub async fn get_session_summary(&self, session_id: &str) -> Result<String, OrchestratorError> {
        let Some(state) = self.state.get_session(session_id).await? else {
            return Err(StateError::SessionNotFound(session_id.to_owned()).into());
        };

        let mut out = format!("Brainstorm {session_id}: \"{}\"\n", state.request);
        for branch in state.ordered_branches() {
            let status = match branch.status {
                BranchStatus::Exploring => "exploring",
                BranchStatus::Done => "done",
            };
            let _ = writeln!(out, "[{status}] {}: {}", branch.id, branch.scope);
            if branch.questions.is_empty() {
                let _ = writeln!(out, "  (no answers)");
            }
            for question in &branch.questions {
                match &question.answer {
                    Some(answer) => {
                        let _ = writeln!(
                            out,
                            "  Q: {} A: {}",
                            question.text,
                            summarize_answer(answer)
                        );
                    }
                    None => {
                        let _ = writeln!(out, "  Q: {} (no answer yet)", question.text);
                    }
                }
            }
            if let Some(finding) = &branch.finding {
                let _ = writeln!(out, "  Finding: {finding}");
            }
        }
        Ok(out)
    }
}

// ── Pure helpers ────────────────────────────────────────────────────────────

/// Clone a question config with its `context` prefixed by `[<scope>] ` so
/// the browser shows which branch the question belongs to.
fn tag_config_with_scope(config: &Value, scope: &str) -> Value {
    let mut config = config.clone();
    let existing = config
        .get("context")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    let tagged = if existing.is_empty() {
        format!("[{scope}]")
    } else {
        format!("[{scope}] {existing}")
    };
    match config.as_object_mut() {
        Some(obj) => {
            let _ = obj.insert("context".to_owned(), Value::String(tagged));
            config
        }
        None => json!({ "context": tagged }),
    }
}

/// The question text inside a config, falling back to the branch scope.
fn question_text(config: &Value, scope: &str) -> String {
    config
        .get("question")
        .and_then(Value::as_str)
        .unwrap_or(scope)
        .to_owned()
}

/// Plan sections: the original request, then one section per branch in
/// stable order.
fn plan_sections(state: &BrainstormState) -> Vec<Value> {
    let mut sections = vec![json!({
        "id": "original-request",
        "title": "Original Request",
        "content": state.request,
    })];
    for branch in state.ordered_branches() {
        let finding = branch.finding.as_deref().unwrap_or("(no finding)");
        let mut discussion = String::new();
        for question in branch.answered_questions() {
            if let Some(answer) = &question.answer {
                let _ = writeln!(
                    discussion,
                    "Q: {} A: {}",
                    question.text,
                    summarize_answer(answer)
                );
            }
        }
        let content = if discussion.is_empty() {
            format!("Finding: {finding}")
        } else {
            format!("Finding: {finding}\n\nDiscussion:\n{discussion}")
        };
        sections.push(json!({
            "id": branch.id.as_str(),
            "title": branch.scope,
            "content": content,
        }));
    }
    sections
}

/// Summary for a brainstorm whose branches are not all done yet.
fn in_progress_summary(state: &BrainstormState) -> String {
    let mut out = format!(
        "Brainstorm in progress for \"{}\". Branch status:\n",
        state.request
    );
    for branch in state.ordered_branches() {
        let status = match branch.status {
            BranchStatus::Exploring => "exploring",
            BranchStatus::Done => "done",
        };
        let answered = branch.answered_questions().len();
        let _ = writeln!(
            out,
            "- [{status}] {}: {} ({answered} answered)",
            branch.id, branch.scope
        );
    }
    out.push_str("Call await again to resume.");
    out
}

/// Final findings summary, with the plan-review outcome if one was
/// collected.
fn findings_summary(state: &BrainstormState, review: Option<ReviewOutcome>) -> String {
    let mut out = format!("Brainstorm complete for \"{}\".\n\nFindings:\n", state.request);
    for branch in state.ordered_branches() {
        let finding = branch.finding.as_deref().unwrap_or("(no finding)");
        let _ = writeln!(out, "- [{}] {finding}", branch.id);
    }
    match review {
        Some(outcome) => {
            let verdict = if outcome.approved {
                "approved"
            } else {
                "not approved"
            };
            let _ = write!(out, "\nPlan review: {verdict}");
            for (section, note) in &outcome.annotations {
                let _ = write!(out, "\n  [{section}] {note}");
            }
            if let Some(feedback) = &outcome.feedback {
                let _ = write!(out, "\n  Feedback: {feedback}");
            }
        }
        None => {
            let _ = write!(out, "\nPlan review: no response collected");
        }
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
