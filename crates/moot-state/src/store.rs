//! The brainstorm state store.
//!
//! One [`BrainstormState`] per session, cached in memory and persisted to
//! `{state_dir}/{session_id}.json` after every mutation. Mutations clone
//! the cached state, apply the change, persist, and only then replace the
//! cache, so readers never observe a state that is not on disk.
//!
//! Per-session ordering: each session has one async mutex held across the
//! whole read-modify-write-persist sequence. Operations on different
//! sessions run freely in parallel.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use moot_core::{BranchId, QuestionId, SessionId};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::errors::StateError;
use crate::model::{
    Branch, BranchQuestion, BranchSeed, BranchStatus, BrainstormState, NewBranchQuestion,
};

/// Cached per-session state behind the serialization mutex.
enum CellSlot {
    /// Not yet read from disk.
    Unloaded,
    /// Known to have no persisted state.
    Absent,
    /// Loaded state; always matches the file contents.
    Present(BrainstormState),
}

/// Per-session serialization cell.
struct SessionCell {
    slot: Mutex<CellSlot>,
}

/// Durable map from session ID to branch graph.
pub struct BrainstormStore {
    state_dir: PathBuf,
    cells: DashMap<String, Arc<SessionCell>>,
}

impl BrainstormStore {
    /// Create a store rooted at `state_dir` (created if missing).
    pub fn new(state_dir: impl Into<PathBuf>) -> Result<Self, StateError> {
        let state_dir = state_dir.into();
        std::fs::create_dir_all(&state_dir)?;
        Ok(Self {
            state_dir,
            cells: DashMap::new(),
        })
    }

    /// Directory holding the per-session files.
    #[must_use]
    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    // ── Operations ──────────────────────────────────────────────────────

    /// Initialize a brainstorm session with every branch `exploring`.
    ///
    /// Fails with `SessionAlreadyExists` if state for this session is
    /// already persisted.
    #[instrument(skip(self, seeds), fields(session_id, branches = seeds.len()))]
    pub async fn create_session(
        &self,
        session_id: &str,
        request: &str,
        seeds: Vec<BranchSeed>,
    ) -> Result<(), StateError> {
        let cell = self.cell(session_id);
        let mut slot = cell.slot.lock().await;
        self.ensure_loaded(&mut slot, session_id)?;
        if matches!(*slot, CellSlot::Present(_)) {
            return Err(StateError::SessionAlreadyExists(session_id.to_owned()));
        }
        let state = BrainstormState::new(session_id.to_owned(), request.to_owned(), seeds);
        self.persist(&state).await?;
        *slot = CellSlot::Present(state);
        debug!(session_id, "brainstorm state created");
        Ok(())
    }

    /// Load the current state of a session, or `None` if absent.
    pub async fn get_session(&self, session_id: &str) -> Result<Option<BrainstormState>, StateError> {
        let cell = self.cell(session_id);
        let mut slot = cell.slot.lock().await;
        self.ensure_loaded(&mut slot, session_id)?;
        Ok(match &*slot {
            CellSlot::Present(state) => Some(state.clone()),
            CellSlot::Absent | CellSlot::Unloaded => None,
        })
    }

    /// Bind the live browser session ID to this brainstorm.
    pub async fn set_browser_session_id(
        &self,
        session_id: &str,
        browser_session_id: SessionId,
    ) -> Result<(), StateError> {
        self.mutate(session_id, move |state| {
            state.browser_session_id = Some(browser_session_id);
            Ok(())
        })
        .await
    }

    /// Append a question to a branch's history.
    ///
    /// Fails with `BranchNotFound` or `BranchAlreadyDone`.
    #[instrument(skip(self, question), fields(session_id, branch_id = %branch_id, question_id = %question.id))]
    pub async fn add_question_to_branch(
        &self,
        session_id: &str,
        branch_id: &BranchId,
        question: NewBranchQuestion,
    ) -> Result<(), StateError> {
        let branch_id = branch_id.clone();
        self.mutate(session_id, move |state| {
            let Some(branch) = state.branches.get_mut(&branch_id) else {
                return Err(StateError::BranchNotFound(branch_id));
            };
            if branch.status == BranchStatus::Done {
                return Err(StateError::BranchAlreadyDone(branch_id));
            }
            branch.questions.push(BranchQuestion {
                id: question.id,
                question_type: question.question_type,
                text: question.text,
                config: question.config,
                answer: None,
                answered_at: None,
            });
            Ok(())
        })
        .await
    }

    /// Record an answer against the branch question that owns
    /// `question_id`.
    ///
    /// A no-op (returns `false`) if the question is unknown or already
    /// answered, making repeated delivery idempotent.
    #[instrument(skip(self, answer), fields(session_id, question_id = %question_id))]
    pub async fn record_answer(
        &self,
        session_id: &str,
        question_id: &QuestionId,
        answer: Value,
    ) -> Result<bool, StateError> {
        let cell = self.cell(session_id);
        let mut slot = cell.slot.lock().await;
        self.ensure_loaded(&mut slot, session_id)?;
        let CellSlot::Present(state) = &*slot else {
            return Ok(false);
        };
        let mut next = state.clone();
        let Some(question) = next
            .branches
            .values_mut()
            .flat_map(|b| b.questions.iter_mut())
            .find(|q| q.id == *question_id)
        else {
            return Ok(false);
        };
        if question.answer.is_some() {
            return Ok(false);
        }
        question.answer = Some(answer);
        question.answered_at = Some(Utc::now());
        next.updated_at = Utc::now();
        self.persist(&next).await?;
        *slot = CellSlot::Present(next);
        Ok(true)
    }

    /// Conclude a branch with its finding.
    ///
    /// Fails with `BranchNotFound` or `BranchAlreadyDone`.
    #[instrument(skip(self, finding), fields(session_id, branch_id = %branch_id))]
    pub async fn complete_branch(
        &self,
        session_id: &str,
        branch_id: &BranchId,
        finding: String,
    ) -> Result<(), StateError> {
        let branch_id = branch_id.clone();
        self.mutate(session_id, move |state| {
            let Some(branch) = state.branches.get_mut(&branch_id) else {
                return Err(StateError::BranchNotFound(branch_id));
            };
            if branch.status == BranchStatus::Done {
                return Err(StateError::BranchAlreadyDone(branch_id));
            }
            branch.status = BranchStatus::Done;
            branch.finding = Some(finding);
            Ok(())
        })
        .await
    }

    /// First branch in `branch_order` still exploring; `None` when every
    /// branch is done or the session is absent.
    pub async fn get_next_exploring_branch(
        &self,
        session_id: &str,
    ) -> Result<Option<Branch>, StateError> {
        Ok(self
            .get_session(session_id)
            .await?
            .and_then(|state| state.next_exploring_branch().cloned()))
    }

    /// Whether every branch of the session is done.
    pub async fn is_session_complete(&self, session_id: &str) -> Result<bool, StateError> {
        match self.get_session(session_id).await? {
            Some(state) => Ok(state.is_complete()),
            None => Err(StateError::SessionNotFound(session_id.to_owned())),
        }
    }

    /// Remove the in-memory entry and the persistence file. Idempotent.
    #[instrument(skip(self), fields(session_id))]
    pub async fn delete_session(&self, session_id: &str) -> Result<(), StateError> {
        let cell = self.cell(session_id);
        {
            let mut slot = cell.slot.lock().await;
            match std::fs::remove_file(self.session_path(session_id)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            *slot = CellSlot::Absent;
        }
        let _ = self.cells.remove(session_id);
        debug!(session_id, "brainstorm state deleted");
        Ok(())
    }

    /// Enumerate persisted session IDs, sorted.
    pub fn list(&self) -> Result<Vec<String>, StateError> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.state_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_owned());
                }
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn cell(&self, session_id: &str) -> Arc<SessionCell> {
        self.cells
            .entry(session_id.to_owned())
            .or_insert_with(|| {
                Arc::new(SessionCell {
                    slot: Mutex::new(CellSlot::Unloaded),
                })
            })
            .clone()
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.state_dir.join(format!("{session_id}.json"))
    }

    /// Populate an `Unloaded` slot from disk.
    fn ensure_loaded(&self, slot: &mut CellSlot, session_id: &str) -> Result<(), StateError> {
        if matches!(slot, CellSlot::Unloaded) {
            *slot = match std::fs::read_to_string(self.session_path(session_id)) {
                Ok(content) => CellSlot::Present(serde_json::from_str(&content)?),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => CellSlot::Absent,
                Err(e) => return Err(e.into()),
            };
        }
        Ok(())
    }

    /// Run a mutation under the session's serialization lock: clone, apply,
    /// refresh `updated_at`, persist, then replace the cache.
    async fn mutate<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut BrainstormState) -> Result<R, StateError>,
    ) -> Result<R, StateError> {
        let cell = self.cell(session_id);
        let mut slot = cell.slot.lock().await;
        self.ensure_loaded(&mut slot, session_id)?;
        let CellSlot::Present(state) = &*slot else {
            return Err(StateError::SessionNotFound(session_id.to_owned()));
        };
        let mut next = state.clone();
        let result = f(&mut next)?;
        next.updated_at = Utc::now();
        self.persist(&next).await?;
        *slot = CellSlot::Present(next);
        Ok(result)
    }

    /// Atomically replace the session file (write temp, then rename).
    async fn persist(&self, state: &BrainstormState) -> Result<(), StateError> {
        let json = serde_json::to_string_pretty(state)?;
        let path = self.session_path(&state.session_id);
        let dir = self.state_dir.clone();
        tokio::task::spawn_blocking(move || -> Result<(), StateError> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            std::io::Write::write_all(&mut tmp, json.as_bytes())?;
            let _ = tmp.persist(&path).map_err(|e| StateError::Io(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| StateError::Task(e.to_string()))?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
