//! The live session store.
//!
//! Owns every active browser session: its question queue, its WebSocket
//! client, its per-session HTTP server, and the two waiter registries that
//! back the blocking consumers. All session and question state is guarded
//! by a single mutex; waiter registration happens inside the same critical
//! section as the status check it depends on, so a wakeup can never be
//! lost between check and suspend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moot_core::{QuestionId, QuestionStatus, QuestionType, SessionId};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::browser::{BrowserOpener, PlatformOpener};
use crate::errors::SessionStoreError;
use crate::protocol::ServerFrame;
use crate::transport;
use crate::types::{
    AnswerEvent, GetAnswerInput, GetAnswerOutput, GetNextAnswerInput, GetNextAnswerOutput,
    NextAnswer, NextAnswerStatus, Question, QuestionSummary, SeedQuestion, SessionInfo,
    StartSessionOutput,
};
use crate::waiters::WaiterRegistry;

/// Default wait budget for blocking consumers (5 minutes).
pub const DEFAULT_ANSWER_TIMEOUT_MS: u64 = 300_000;

/// How long `end_session` waits for the per-session server to wind down.
const SERVER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Session store configuration.
#[derive(Clone, Debug)]
pub struct SessionStoreConfig {
    /// Bind address for per-session servers.
    pub host: String,
    /// Port for per-session servers (`0` = ephemeral, one port per session).
    pub port: u16,
    /// Skip launching the platform browser (testing only).
    pub skip_browser: bool,
    /// The question-renderer bundle served at `GET /`.
    pub ui_html: Arc<str>,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            skip_browser: false,
            ui_html: Arc::from(DEFAULT_UI_HTML),
        }
    }
}

/// Placeholder bundle used when no UI is injected.
const DEFAULT_UI_HTML: &str =
    "<!doctype html><html><body><p>moot session: no UI bundle injected</p></body></html>";

/// A live session.
struct Session {
    id: SessionId,
    title: Option<String>,
    port: u16,
    url: String,
    created_at: DateTime<Utc>,
    /// Question queue in insertion order.
    questions: Vec<Question>,
    /// Attached WebSocket client's send channel, if any.
    client: Option<mpsc::Sender<Arc<String>>>,
    /// Incremented per attach; prevents a stale disconnect from clearing a
    /// newer client.
    client_epoch: u64,
    /// Cancels the per-session server.
    shutdown: CancellationToken,
    /// Join handle of the server task.
    server: tokio::task::JoinHandle<()>,
}

impl Session {
    fn find(&self, question_id: &QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == *question_id)
    }

    fn find_mut(&mut self, question_id: &QuestionId) -> Option<&mut Question> {
        self.questions.iter_mut().find(|q| q.id == *question_id)
    }
}

/// State behind the store mutex.
#[derive(Default)]
struct StoreInner {
    sessions: HashMap<SessionId, Session>,
    /// Process-wide question → session index.
    question_index: HashMap<QuestionId, SessionId>,
}

/// The live session store.
pub struct SessionStore {
    config: SessionStoreConfig,
    inner: Mutex<StoreInner>,
    /// Waiters keyed by question ID (`get_answer`).
    question_waiters: WaiterRegistry<AnswerEvent>,
    /// Waiters keyed by session ID (`get_next_answer`).
    session_waiters: WaiterRegistry<NextAnswer>,
    opener: Arc<dyn BrowserOpener>,
}

impl SessionStore {
    /// Create a store using the platform browser opener.
    #[must_use]
    pub fn new(config: SessionStoreConfig) -> Arc<Self> {
        Self::with_opener(config, Arc::new(PlatformOpener))
    }

    /// Create a store with a custom browser opener.
    #[must_use]
    pub fn with_opener(config: SessionStoreConfig, opener: Arc<dyn BrowserOpener>) -> Arc<Self> {
        Arc::new(Self {
            config,
            inner: Mutex::new(StoreInner::default()),
            question_waiters: WaiterRegistry::new(),
            session_waiters: WaiterRegistry::new(),
            opener,
        })
    }

    // ── Session lifecycle ───────────────────────────────────────────────

    /// Create a session: bind a server, insert seed questions, launch the
    /// browser.
    ///
    /// If the browser launch fails the session is rolled back (questions
    /// unindexed, server stopped) and `BrowserOpenFailed` is raised.
    pub async fn start_session(
        self: &Arc<Self>,
        title: Option<String>,
        seeds: Vec<SeedQuestion>,
    ) -> Result<StartSessionOutput, SessionStoreError> {
        let port = self.config.port;
        self.start_session_on_port(title, seeds, port).await
    }

    /// `start_session` with an explicit port (`0` = ephemeral).
    #[instrument(skip_all, fields(port))]
    pub async fn start_session_on_port(
        self: &Arc<Self>,
        title: Option<String>,
        seeds: Vec<SeedQuestion>,
        port: u16,
    ) -> Result<StartSessionOutput, SessionStoreError> {
        let session_id = SessionId::generate();
        let listener =
            tokio::net::TcpListener::bind((self.config.host.as_str(), port)).await?;
        let port = listener.local_addr()?.port();
        let url = format!("http://localhost:{port}");
        let shutdown = CancellationToken::new();
        let router = transport::router(Arc::clone(self), session_id.clone(), shutdown.clone());
        let server = transport::serve(listener, router, shutdown.clone());

        let mut question_ids = Vec::with_capacity(seeds.len());
        {
            let mut inner = self.inner.lock();
            let mut questions = Vec::with_capacity(seeds.len());
            for seed in seeds {
                let qid = unique_question_id(&inner.question_index);
                let _ = inner
                    .question_index
                    .insert(qid.clone(), session_id.clone());
                questions.push(Question::pending(
                    qid.clone(),
                    session_id.clone(),
                    seed.question_type,
                    seed.config,
                ));
                question_ids.push(qid);
            }
            let _ = inner.sessions.insert(
                session_id.clone(),
                Session {
                    id: session_id.clone(),
                    title,
                    port,
                    url: url.clone(),
                    created_at: Utc::now(),
                    questions,
                    client: None,
                    client_epoch: 0,
                    shutdown: shutdown.clone(),
                    server,
                },
            );
        }

        if !self.config.skip_browser {
            if let Some(message) = self.open_browser(&url).await {
                // Roll back: undo insertions and stop the server.
                {
                    let mut inner = self.inner.lock();
                    if let Some(session) = inner.sessions.remove(&session_id) {
                        for q in &session.questions {
                            let _ = inner.question_index.remove(&q.id);
                        }
                    }
                }
                shutdown.cancel();
                return Err(SessionStoreError::BrowserOpenFailed { url, message });
            }
        }

        info!(session_id = %session_id, port, questions = question_ids.len(), "session started");
        Ok(StartSessionOutput {
            session_id,
            url,
            question_ids,
        })
    }

    /// End a session: notify the browser, stop the server, unindex its
    /// questions, tear down its waiters.
    ///
    /// Returns `false` if the session is unknown.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn end_session(&self, session_id: &SessionId) -> bool {
        let (client, shutdown, server) = {
            let mut inner = self.inner.lock();
            let Some(session) = inner.sessions.remove(session_id) else {
                return false;
            };
            for q in &session.questions {
                let _ = inner.question_index.remove(&q.id);
                self.question_waiters.clear(q.id.as_str());
            }
            self.session_waiters.clear(session_id.as_str());
            let Session {
                client,
                shutdown,
                server,
                ..
            } = session;
            (client, shutdown, server)
        };

        if let Some(tx) = client {
            send_frame(&tx, &ServerFrame::End);
        }
        shutdown.cancel();
        if tokio::time::timeout(SERVER_STOP_TIMEOUT, server).await.is_err() {
            warn!(session_id = %session_id, "session server did not stop in time");
        }
        info!(session_id = %session_id, "session ended");
        true
    }

    // ── Question operations ─────────────────────────────────────────────

    /// Push a new pending question to a session.
    ///
    /// If a WebSocket client is attached the question frame is emitted
    /// immediately; otherwise (and unless `skip_browser`) a best-effort
    /// browser reopen is attempted in the background.
    #[instrument(skip(self, config), fields(session_id = %session_id, question_type = %question_type))]
    pub fn push_question(
        &self,
        session_id: &SessionId,
        question_type: QuestionType,
        config: Value,
    ) -> Result<QuestionId, SessionStoreError> {
        let (question_id, frame_tx, reopen_url) = {
            let mut inner = self.inner.lock();
            if !inner.sessions.contains_key(session_id) {
                return Err(SessionStoreError::SessionNotFound(session_id.clone()));
            }
            let question_id = unique_question_id(&inner.question_index);
            let _ = inner
                .question_index
                .insert(question_id.clone(), session_id.clone());
            let Some(session) = inner.sessions.get_mut(session_id) else {
                // Presence was checked above under the same lock.
                let _ = inner.question_index.remove(&question_id);
                return Err(SessionStoreError::SessionNotFound(session_id.clone()));
            };
            let question = Question::pending(
                question_id.clone(),
                session_id.clone(),
                question_type,
                config,
            );
            let frame_tx = session.client.clone().map(|tx| {
                (
                    tx,
                    ServerFrame::Question {
                        id: question.id.clone(),
                        question_type,
                        config: question.config.clone(),
                    },
                )
            });
            let reopen_url =
                (frame_tx.is_none() && !self.config.skip_browser).then(|| session.url.clone());
            session.questions.push(question);
            (question_id, frame_tx, reopen_url)
        };

        if let Some((tx, frame)) = frame_tx {
            send_frame(&tx, &frame);
        } else if let Some(url) = reopen_url {
            // Best-effort, non-blocking; failures are ignored.
            let opener = Arc::clone(&self.opener);
            let _ = tokio::task::spawn_blocking(move || {
                if let Err(e) = opener.open(&url) {
                    debug!(url, error = %e, "browser reopen failed");
                }
            });
        }

        debug!(question_id = %question_id, "question pushed");
        Ok(question_id)
    }

    /// Cancel a pending question.
    ///
    /// Returns `false` if the question is unknown or not pending. Blocking
    /// `get_answer` waiters are resolved with a cancelled outcome and the
    /// browser is told to drop the card.
    #[instrument(skip(self), fields(question_id = %question_id))]
    pub fn cancel_question(&self, question_id: &QuestionId) -> bool {
        let frame_tx = {
            let mut inner = self.inner.lock();
            let Some(session_id) = inner.question_index.get(question_id).cloned() else {
                return false;
            };
            let Some(session) = inner.sessions.get_mut(&session_id) else {
                return false;
            };
            let Some(question) = session.find_mut(question_id) else {
                return false;
            };
            if question.status != QuestionStatus::Pending {
                return false;
            }
            question.status = QuestionStatus::Cancelled;
            session.client.clone()
        };

        if let Some(tx) = frame_tx {
            send_frame(
                &tx,
                &ServerFrame::Cancel {
                    id: question_id.clone(),
                },
            );
        }
        self.question_waiters
            .notify_all(question_id.as_str(), &AnswerEvent::Cancelled);
        debug!(question_id = %question_id, "question cancelled");
        true
    }

    /// Record a browser answer for a pending question.
    ///
    /// This is the single entry point used by the WebSocket transport (and
    /// tests). Repeated or misdirected deliveries are ignored. Question
    /// waiters are fanned out to; at most one session waiter receives the
    /// answer and claims it (`retrieved`).
    pub fn apply_response(
        &self,
        session_id: &SessionId,
        question_id: &QuestionId,
        answer: Value,
    ) -> bool {
        let mut inner = self.inner.lock();
        let Some(session) = inner.sessions.get_mut(session_id) else {
            return false;
        };
        let Some(question) = session.find_mut(question_id) else {
            return false;
        };
        if question.status != QuestionStatus::Pending {
            return false;
        }
        question.status = QuestionStatus::Answered;
        question.answered_at = Some(Utc::now());
        question.response = Some(answer.clone());
        let question_type = question.question_type;

        self.question_waiters
            .notify_all(question_id.as_str(), &AnswerEvent::Answered(answer.clone()));
        let claimed = self.session_waiters.notify_first(
            session_id.as_str(),
            NextAnswer {
                question_id: question_id.clone(),
                question_type,
                response: answer,
            },
        );
        if claimed {
            question.retrieved = true;
        }
        true
    }

    // ── Blocking consumers ──────────────────────────────────────────────

    /// Read (optionally waiting for) the answer to a specific question.
    #[instrument(skip(self), fields(question_id = %input.question_id, block = input.block))]
    pub async fn get_answer(&self, input: GetAnswerInput) -> GetAnswerOutput {
        let (mut rx, guard) = {
            let inner = self.inner.lock();
            let question = inner
                .question_index
                .get(&input.question_id)
                .and_then(|sid| inner.sessions.get(sid))
                .and_then(|s| s.find(&input.question_id));
            match question {
                // Unknown questions read as cancelled.
                None => return GetAnswerOutput::not_completed(QuestionStatus::Cancelled),
                Some(q) => match q.status {
                    QuestionStatus::Answered => {
                        return GetAnswerOutput::answered(
                            q.response.clone().unwrap_or(Value::Null),
                        );
                    }
                    QuestionStatus::Cancelled | QuestionStatus::Timeout => {
                        return GetAnswerOutput::not_completed(q.status);
                    }
                    QuestionStatus::Pending if !input.block => {
                        return GetAnswerOutput::not_completed(QuestionStatus::Pending);
                    }
                    QuestionStatus::Pending => {
                        self.question_waiters.register(input.question_id.as_str())
                    }
                },
            }
        };

        let budget = Duration::from_millis(input.timeout_ms.unwrap_or(DEFAULT_ANSWER_TIMEOUT_MS));
        match tokio::time::timeout(budget, &mut rx).await {
            Ok(Ok(AnswerEvent::Answered(response))) => {
                guard.release();
                GetAnswerOutput::answered(response)
            }
            // Explicit cancel, or the session was torn down under us.
            Ok(Ok(AnswerEvent::Cancelled)) | Ok(Err(_)) => {
                guard.release();
                GetAnswerOutput::not_completed(QuestionStatus::Cancelled)
            }
            Err(_elapsed) => {
                guard.release();
                // The answer may have landed between the last poll and the
                // deregistration; deliver it rather than dropping it.
                match rx.try_recv() {
                    Ok(AnswerEvent::Answered(response)) => GetAnswerOutput::answered(response),
                    Ok(AnswerEvent::Cancelled) => {
                        GetAnswerOutput::not_completed(QuestionStatus::Cancelled)
                    }
                    Err(_) => {
                        self.mark_timed_out(&input.question_id);
                        GetAnswerOutput::not_completed(QuestionStatus::Timeout)
                    }
                }
            }
        }
    }

    /// Take the next unretrieved answer from a session, optionally waiting.
    ///
    /// Concurrent blocking callers each receive a distinct answer, in the
    /// order answers arrive.
    #[instrument(skip(self), fields(session_id = %input.session_id, block = input.block))]
    pub async fn get_next_answer(&self, input: GetNextAnswerInput) -> GetNextAnswerOutput {
        let (mut rx, guard) = {
            let mut inner = self.inner.lock();
            let Some(session) = inner.sessions.get_mut(&input.session_id) else {
                return GetNextAnswerOutput::not_completed(NextAnswerStatus::NonePending);
            };
            if let Some(q) = session
                .questions
                .iter_mut()
                .find(|q| q.status == QuestionStatus::Answered && !q.retrieved)
            {
                q.retrieved = true;
                return GetNextAnswerOutput::answered(
                    q.id.clone(),
                    q.question_type,
                    q.response.clone().unwrap_or(Value::Null),
                );
            }
            let has_pending = session
                .questions
                .iter()
                .any(|q| q.status == QuestionStatus::Pending);
            if !has_pending {
                return GetNextAnswerOutput::not_completed(NextAnswerStatus::NonePending);
            }
            if !input.block {
                return GetNextAnswerOutput::not_completed(NextAnswerStatus::Pending);
            }
            self.session_waiters.register(input.session_id.as_str())
        };

        let budget = Duration::from_millis(input.timeout_ms.unwrap_or(DEFAULT_ANSWER_TIMEOUT_MS));
        match tokio::time::timeout(budget, &mut rx).await {
            Ok(Ok(next)) => {
                guard.release();
                GetNextAnswerOutput::answered(next.question_id, next.question_type, next.response)
            }
            // Session torn down while waiting.
            Ok(Err(_)) => {
                guard.release();
                GetNextAnswerOutput::not_completed(NextAnswerStatus::NonePending)
            }
            Err(_elapsed) => {
                guard.release();
                match rx.try_recv() {
                    Ok(next) => GetNextAnswerOutput::answered(
                        next.question_id,
                        next.question_type,
                        next.response,
                    ),
                    Err(_) => GetNextAnswerOutput::not_completed(NextAnswerStatus::Timeout),
                }
            }
        }
    }

    // ── Projections ─────────────────────────────────────────────────────

    /// List questions (all sessions, or one), newest first.
    #[must_use]
    pub fn list_questions(&self, session_id: Option<&SessionId>) -> Vec<QuestionSummary> {
        let inner = self.inner.lock();
        let mut summaries: Vec<QuestionSummary> = inner
            .sessions
            .values()
            .filter(|s| session_id.is_none_or(|sid| s.id == *sid))
            .flat_map(|s| s.questions.iter())
            .map(|q| QuestionSummary {
                id: q.id.clone(),
                question_type: q.question_type,
                status: q.status,
                created_at: q.created_at,
                answered_at: q.answered_at,
            })
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        summaries
    }

    /// URL of a live session, if it exists.
    #[must_use]
    pub fn session_url(&self, session_id: &SessionId) -> Option<String> {
        self.inner
            .lock()
            .sessions
            .get(session_id)
            .map(|s| s.url.clone())
    }

    /// Whether the session exists.
    #[must_use]
    pub fn session_exists(&self, session_id: &SessionId) -> bool {
        self.inner.lock().sessions.contains_key(session_id)
    }

    /// Whether a WebSocket client is attached.
    #[must_use]
    pub fn is_connected(&self, session_id: &SessionId) -> bool {
        self.inner
            .lock()
            .sessions
            .get(session_id)
            .is_some_and(|s| s.client.is_some())
    }

    /// Number of live sessions.
    #[must_use]
    pub fn live_session_count(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    /// IDs of all live sessions.
    #[must_use]
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.inner.lock().sessions.keys().cloned().collect()
    }

    /// Projections of all live sessions, newest first.
    #[must_use]
    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        let inner = self.inner.lock();
        let mut infos: Vec<SessionInfo> = inner
            .sessions
            .values()
            .map(|s| SessionInfo {
                id: s.id.clone(),
                title: s.title.clone(),
                port: s.port,
                url: s.url.clone(),
                created_at: s.created_at,
                connected: s.client.is_some(),
                question_count: s.questions.len(),
            })
            .collect();
        infos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        infos
    }

    /// End every live session (process shutdown).
    pub async fn end_all_sessions(&self) {
        for session_id in self.session_ids() {
            let _ = self.end_session(&session_id).await;
        }
    }

    // ── Transport integration ───────────────────────────────────────────

    /// Attach a WebSocket client and collect replay frames for every
    /// pending question, in insertion order.
    ///
    /// Returns `None` if the session no longer exists.
    pub(crate) fn attach_client(
        &self,
        session_id: &SessionId,
        tx: mpsc::Sender<Arc<String>>,
    ) -> Option<(u64, Vec<Arc<String>>)> {
        let mut inner = self.inner.lock();
        let session = inner.sessions.get_mut(session_id)?;
        session.client_epoch += 1;
        session.client = Some(tx);
        let frames = session
            .questions
            .iter()
            .filter(|q| q.status == QuestionStatus::Pending)
            .filter_map(|q| {
                encode_frame(&ServerFrame::Question {
                    id: q.id.clone(),
                    question_type: q.question_type,
                    config: q.config.clone(),
                })
            })
            .collect();
        Some((session.client_epoch, frames))
    }

    /// Detach a WebSocket client. Only clears the slot if no newer client
    /// has attached since. Pending questions are untouched.
    pub(crate) fn detach_client(&self, session_id: &SessionId, epoch: u64) {
        let mut inner = self.inner.lock();
        if let Some(session) = inner.sessions.get_mut(session_id) {
            if session.client_epoch == epoch {
                session.client = None;
            }
        }
    }

    /// The UI bundle served at `GET /`.
    pub(crate) fn ui_html(&self) -> Arc<str> {
        Arc::clone(&self.config.ui_html)
    }

    // ── Internals ───────────────────────────────────────────────────────

    /// Transition a question to `Timeout` if it is still pending.
    fn mark_timed_out(&self, question_id: &QuestionId) {
        let mut inner = self.inner.lock();
        let Some(session_id) = inner.question_index.get(question_id).cloned() else {
            return;
        };
        if let Some(question) = inner
            .sessions
            .get_mut(&session_id)
            .and_then(|s| s.find_mut(question_id))
        {
            if question.status == QuestionStatus::Pending {
                question.status = QuestionStatus::Timeout;
            }
        }
    }

    /// Launch the browser on a blocking thread; `Some(message)` on failure.
    async fn open_browser(&self, url: &str) -> Option<String> {
        let opener = Arc::clone(&self.opener);
        let url = url.to_owned();
        match tokio::task::spawn_blocking(move || opener.open(&url)).await {
            Ok(Ok(())) => None,
            Ok(Err(message)) => Some(message),
            Err(join_err) => Some(join_err.to_string()),
        }
    }
}

/// Generate a question ID that is not currently indexed.
fn unique_question_id(index: &HashMap<QuestionId, SessionId>) -> QuestionId {
    loop {
        let id = QuestionId::generate();
        if !index.contains_key(&id) {
            return id;
        }
    }
}

/// Serialize a frame, logging (not panicking) on the impossible failure.
fn encode_frame(frame: &ServerFrame) -> Option<Arc<String>> {
    match serde_json::to_string(frame) {
        Ok(json) => Some(Arc::new(json)),
        Err(e) => {
            warn!(error = %e, "failed to serialize server frame");
            None
        }
    }
}

/// Best-effort frame send; drops the frame if the client channel is full.
fn send_frame(tx: &mpsc::Sender<Arc<String>>, frame: &ServerFrame) {
    if let Some(json) = encode_frame(frame) {
        if tx.try_send(json).is_err() {
            warn!("browser client channel full or closed, dropping frame");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
