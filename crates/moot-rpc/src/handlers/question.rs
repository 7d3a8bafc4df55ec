//! Question handlers: push, cancel, list.

use async_trait::async_trait;
use moot_core::{QuestionId, SessionId};
use serde_json::{Value, json};
use tracing::instrument;

use crate::context::RpcContext;
use crate::errors::RpcError;
use crate::handlers::{require_param, require_question_type, require_string_param};
use crate::registry::MethodHandler;
use crate::validation::validate_question_config;

/// Push a question to a live session.
pub struct PushQuestionHandler;

#[async_trait]
impl MethodHandler for PushQuestionHandler {
    #[instrument(skip(self, ctx, params), fields(method = "question.push"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = SessionId::from(require_string_param(params.as_ref(), "sessionId")?);
        let question_type = require_question_type(params.as_ref(), "type")?;
        let config = require_param(params.as_ref(), "config")?.clone();
        validate_question_config(question_type, &config)?;

        let question_id = ctx
            .sessions
            .push_question(&session_id, question_type, config)?;
        Ok(json!({ "questionId": question_id }))
    }
}

/// Cancel a pending question.
pub struct CancelQuestionHandler;

#[async_trait]
impl MethodHandler for CancelQuestionHandler {
    #[instrument(skip(self, ctx, params), fields(method = "question.cancel"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let question_id = QuestionId::from(require_string_param(params.as_ref(), "questionId")?);
        let ok = ctx.sessions.cancel_question(&question_id);
        Ok(json!({ "ok": ok }))
    }
}

/// List questions across all sessions or one.
pub struct ListQuestionsHandler;

#[async_trait]
impl MethodHandler for ListQuestionsHandler {
    #[instrument(skip(self, ctx, params), fields(method = "question.list"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = params
            .as_ref()
            .and_then(|p| p.get("sessionId"))
            .and_then(Value::as_str)
            .map(SessionId::from);
        let questions = ctx.sessions.list_questions(session_id.as_ref());
        Ok(json!({
            "questions": serde_json::to_value(questions).map_err(|e| RpcError::Internal {
                message: e.to_string(),
            })?,
        }))
    }
}
