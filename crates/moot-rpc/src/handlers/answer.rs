//! Answer handlers: the blocking per-question and per-session consumers.

use async_trait::async_trait;
use moot_core::{QuestionId, SessionId};
use serde_json::{Value, json};
use tracing::instrument;

use crate::context::RpcContext;
use crate::errors::RpcError;
use crate::handlers::{blocking_params, require_string_param};
use crate::registry::MethodHandler;

use moot_sessions::{GetAnswerInput, GetNextAnswerInput};

/// Read (optionally waiting for) the answer to one question.
pub struct GetAnswerHandler;

#[async_trait]
impl MethodHandler for GetAnswerHandler {
    #[instrument(skip(self, ctx, params), fields(method = "answer.get"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let question_id = QuestionId::from(require_string_param(params.as_ref(), "questionId")?);
        let (block, timeout_ms) = blocking_params(params.as_ref());

        let out = ctx
            .sessions
            .get_answer(GetAnswerInput {
                question_id,
                block,
                timeout_ms,
            })
            .await;

        let mut result = json!({
            "completed": out.completed,
            "status": out.status,
        });
        if !out.completed {
            result["reason"] = json!(out.status);
        }
        if let Some(response) = out.response {
            result["response"] = response;
        }
        Ok(result)
    }
}

/// Take the next unretrieved answer from a session.
pub struct GetNextAnswerHandler;

#[async_trait]
impl MethodHandler for GetNextAnswerHandler {
    #[instrument(skip(self, ctx, params), fields(method = "answer.next"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = SessionId::from(require_string_param(params.as_ref(), "sessionId")?);
        let (block, timeout_ms) = blocking_params(params.as_ref());

        let out = ctx
            .sessions
            .get_next_answer(GetNextAnswerInput {
                session_id,
                block,
                timeout_ms,
            })
            .await;

        let mut result = json!({
            "completed": out.completed,
            "status": out.status,
        });
        if let Some(question_id) = out.question_id {
            result["questionId"] = json!(question_id);
        }
        if let Some(question_type) = out.question_type {
            result["questionType"] = json!(question_type);
        }
        if let Some(response) = out.response {
            result["response"] = response;
        }
        Ok(result)
    }
}
