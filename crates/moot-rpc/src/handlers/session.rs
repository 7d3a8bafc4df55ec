//! Session handlers: start, end, list.

use async_trait::async_trait;
use moot_core::SessionId;
use serde_json::{Value, json};
use tracing::instrument;

use crate::context::RpcContext;
use crate::errors::RpcError;
use crate::handlers::require_string_param;
use crate::registry::MethodHandler;
use crate::validation::{validate_port, validate_question_config};

use moot_sessions::SeedQuestion;

/// Start a browser session, optionally with seed questions and a fixed
/// port.
pub struct StartSessionHandler;

#[async_trait]
impl MethodHandler for StartSessionHandler {
    #[instrument(skip(self, ctx, params), fields(method = "session.start"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let title = params
            .as_ref()
            .and_then(|p| p.get("title"))
            .and_then(Value::as_str)
            .map(str::to_owned);

        let seeds = parse_seed_questions(params.as_ref())?;

        let port = match params.as_ref().and_then(|p| p.get("port")) {
            Some(value) => Some(validate_port(value)?),
            None => None,
        };

        let started = match port {
            Some(port) => {
                ctx.sessions
                    .start_session_on_port(title, seeds, port)
                    .await?
            }
            None => ctx.sessions.start_session(title, seeds).await?,
        };
        Ok(serde_json::to_value(started).map_err(|e| RpcError::Internal {
            message: e.to_string(),
        })?)
    }
}

/// Parse and validate the optional `questions` seed array.
fn parse_seed_questions(params: Option<&Value>) -> Result<Vec<SeedQuestion>, RpcError> {
    let Some(list) = params.and_then(|p| p.get("questions")) else {
        return Ok(Vec::new());
    };
    let seeds: Vec<SeedQuestion> =
        serde_json::from_value(list.clone()).map_err(|e| RpcError::InvalidParams {
            message: format!("Invalid 'questions' array: {e}"),
        })?;
    for seed in &seeds {
        validate_question_config(seed.question_type, &seed.config)?;
    }
    Ok(seeds)
}

/// End a browser session.
pub struct EndSessionHandler;

#[async_trait]
impl MethodHandler for EndSessionHandler {
    #[instrument(skip(self, ctx, params), fields(method = "session.end"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = SessionId::from(require_string_param(params.as_ref(), "sessionId")?);
        let ok = ctx.sessions.end_session(&session_id).await;
        Ok(json!({ "ok": ok }))
    }
}

/// List live browser sessions.
pub struct ListSessionsHandler;

#[async_trait]
impl MethodHandler for ListSessionsHandler {
    #[instrument(skip(self, ctx, _params), fields(method = "session.list"))]
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let sessions = ctx.sessions.list_sessions();
        Ok(json!({
            "sessions": serde_json::to_value(sessions).map_err(|e| RpcError::Internal {
                message: e.to_string(),
            })?,
        }))
    }
}
