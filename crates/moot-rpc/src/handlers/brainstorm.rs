//! Brainstorm handlers: create, await, end, summary, list.

use async_trait::async_trait;
use moot_core::SessionId;
use moot_runtime::BranchSpec;
use serde_json::{Value, json};
use tracing::instrument;

use crate::context::RpcContext;
use crate::errors::RpcError;
use crate::handlers::{require_param, require_string_param};
use crate::registry::MethodHandler;
use crate::validation::validate_question_config;

/// Create a brainstorm with its exploration branches.
pub struct CreateBrainstormHandler;

#[async_trait]
impl MethodHandler for CreateBrainstormHandler {
    #[instrument(skip(self, ctx, params), fields(method = "brainstorm.create"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let request = require_string_param(params.as_ref(), "request")?;
        let branches: Vec<BranchSpec> =
            serde_json::from_value(require_param(params.as_ref(), "branches")?.clone()).map_err(
                |e| RpcError::InvalidParams {
                    message: format!("Invalid 'branches' array: {e}"),
                },
            )?;
        if branches.is_empty() {
            return Err(RpcError::invalid_params(
                "A brainstorm needs at least one branch",
            ));
        }
        for branch in &branches {
            validate_question_config(
                branch.initial_question.question_type,
                &branch.initial_question.config,
            )?;
        }

        let out = ctx.orchestrator.create_brainstorm(&request, branches).await?;
        Ok(json!({
            "sessionId": out.session_id,
            "browserSessionId": out.browser_session_id,
            "url": out.url,
            "summary": out.summary,
        }))
    }
}

/// Run the answer-consumption loop until the brainstorm completes.
pub struct AwaitBrainstormHandler;

#[async_trait]
impl MethodHandler for AwaitBrainstormHandler {
    #[instrument(skip(self, ctx, params), fields(method = "brainstorm.await"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = require_string_param(params.as_ref(), "sessionId")?;
        let browser_session_id =
            SessionId::from(require_string_param(params.as_ref(), "browserSessionId")?);
        let summary = ctx
            .orchestrator
            .await_brainstorm_complete(&session_id, &browser_session_id)
            .await?;
        Ok(json!({ "summary": summary }))
    }
}

/// End a brainstorm and emit its findings.
pub struct EndBrainstormHandler;

#[async_trait]
impl MethodHandler for EndBrainstormHandler {
    #[instrument(skip(self, ctx, params), fields(method = "brainstorm.end"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = require_string_param(params.as_ref(), "sessionId")?;
        let findings = ctx.orchestrator.end_brainstorm(&session_id).await?;
        Ok(json!({ "findings": findings }))
    }
}

/// Render the current status of a brainstorm.
pub struct SessionSummaryHandler;

#[async_trait]
impl MethodHandler for SessionSummaryHandler {
    #[instrument(skip(self, ctx, params), fields(method = "brainstorm.summary"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = require_string_param(params.as_ref(), "sessionId")?;
        let summary = ctx.orchestrator.get_session_summary(&session_id).await?;
        Ok(json!({ "summary": summary }))
    }
}

/// Enumerate persisted brainstorm sessions.
pub struct ListBrainstormsHandler;

#[async_trait]
impl MethodHandler for ListBrainstormsHandler {
    #[instrument(skip(self, ctx, _params), fields(method = "brainstorm.list"))]
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_ids = ctx.state.list()?;
        Ok(json!({ "sessionIds": session_ids }))
    }
}
