//! RPC handler modules and registration.

pub mod answer;
pub mod brainstorm;
pub mod question;
pub mod session;

use crate::registry::MethodRegistry;

/// Register all RPC handlers with the registry.
pub fn register_all(registry: &mut MethodRegistry) {
    // Session
    registry.register("session.start", session::StartSessionHandler);
    registry.register("session.end", session::EndSessionHandler);
    registry.register("session.list", session::ListSessionsHandler);

    // Question
    registry.register("question.push", question::PushQuestionHandler);
    registry.register("question.cancel", question::CancelQuestionHandler);
    registry.register("question.list", question::ListQuestionsHandler);

    // Answer
    registry.register("answer.get", answer::GetAnswerHandler);
    registry.register("answer.next", answer::GetNextAnswerHandler);

    // Brainstorm
    registry.register("brainstorm.create", brainstorm::CreateBrainstormHandler);
    registry.register("brainstorm.await", brainstorm::AwaitBrainstormHandler);
    registry.register("brainstorm.end", brainstorm::EndBrainstormHandler);
    registry.register("brainstorm.summary", brainstorm::SessionSummaryHandler);
    registry.register("brainstorm.list", brainstorm::ListBrainstormsHandler);
}

/// Extract a required parameter from the params object.
pub(crate) fn require_param<'a>(
    params: Option<&'a serde_json::Value>,
    key: &str,
) -> Result<&'a serde_json::Value, crate::errors::RpcError> {
    params
        .and_then(|p| p.get(key))
        .ok_or_else(|| crate::errors::RpcError::InvalidParams {
            message: format!("Missing required parameter: {key}"),
        })
}

/// Extract a required string parameter.
pub(crate) fn require_string_param(
    params: Option<&serde_json::Value>,
    key: &str,
) -> Result<String, crate::errors::RpcError> {
    require_param(params, key)?
        .as_str()
        .map(ToOwned::to_owned)
        .ok_or_else(|| crate::errors::RpcError::InvalidParams {
            message: format!("Parameter '{key}' must be a string"),
        })
}

/// Extract a required question type parameter.
pub(crate) fn require_question_type(
    params: Option<&serde_json::Value>,
    key: &str,
) -> Result<moot_core::QuestionType, crate::errors::RpcError> {
    let name = require_string_param(params, key)?;
    name.parse()
        .map_err(|e: moot_core::catalog::UnknownQuestionType| {
            crate::errors::RpcError::InvalidParams {
                message: e.to_string(),
            }
        })
}

/// Extract the common `block` / `timeoutMs` pair.
pub(crate) fn blocking_params(params: Option<&serde_json::Value>) -> (bool, Option<u64>) {
    let block = params
        .and_then(|p| p.get("block"))
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);
    let timeout_ms = params
        .and_then(|p| p.get("timeoutMs"))
        .and_then(serde_json::Value::as_u64);
    (block, timeout_ms)
}
