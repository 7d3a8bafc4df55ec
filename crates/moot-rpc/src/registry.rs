//! The method table behind the tool-call surface.
//!
//! Each operation the agent can invoke (`session.start`, `answer.next`,
//! `brainstorm.create`, ...) is a [`MethodHandler`] registered under its
//! wire name. Dispatch resolves the name, runs the handler, and wraps the
//! outcome in an [`RpcResponse`], recording per-method call metrics along
//! the way.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde_json::Value;
use tracing::warn;

use crate::context::RpcContext;
use crate::errors::{self, RpcError};
use crate::types::{RpcRequest, RpcResponse};

/// Calls slower than this are logged; blocking reads legitimately take
/// long, so the log is a breadcrumb rather than an alarm.
const SLOW_CALL_THRESHOLD: Duration = Duration::from_secs(10);

/// One callable operation of the tool surface.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Run the operation against the shared stores.
    ///
    /// A returned [`RpcError`] becomes the error body of the response;
    /// non-error outcomes (timeouts, pending reads) are encoded in the
    /// result payload instead.
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError>;
}

/// The dispatch table from method names to handlers.
///
/// Names are kept in a sorted map so listings come out in a stable order.
/// Registering the same name twice replaces the earlier handler.
pub struct MethodRegistry {
    table: BTreeMap<String, Arc<dyn MethodHandler>>,
}

impl MethodRegistry {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: BTreeMap::new(),
        }
    }

    /// Install `handler` under `method`, replacing any earlier entry.
    pub fn register(&mut self, method: &str, handler: impl MethodHandler + 'static) {
        let _ = self.table.insert(method.to_owned(), Arc::new(handler));
    }

    /// Resolve and run the request, producing the wire response.
    pub async fn dispatch(&self, request: RpcRequest, ctx: &RpcContext) -> RpcResponse {
        let RpcRequest { id, method, params } = request;

        let Some(handler) = self.table.get(&method) else {
            record_call(&method, Some(errors::METHOD_NOT_FOUND), Duration::ZERO);
            return RpcResponse::error(
                id,
                errors::METHOD_NOT_FOUND,
                format!("Method '{method}' not found"),
            );
        };

        let started = Instant::now();
        let outcome = handler.handle(params, ctx).await;
        let elapsed = started.elapsed();

        if elapsed >= SLOW_CALL_THRESHOLD {
            warn!(method, elapsed_secs = elapsed.as_secs_f64(), "slow tool call");
        }

        match outcome {
            Ok(result) => {
                record_call(&method, None, elapsed);
                RpcResponse::success(id, result)
            }
            Err(err) => {
                record_call(&method, Some(err.code()), elapsed);
                RpcResponse {
                    id,
                    success: false,
                    result: None,
                    error: Some(err.to_error_body()),
                }
            }
        }
    }

    /// Registered method names, sorted.
    #[must_use]
    pub fn methods(&self) -> Vec<String> {
        self.table.keys().cloned().collect()
    }

    /// Whether `method` has a handler.
    #[must_use]
    pub fn has_method(&self, method: &str) -> bool {
        self.table.contains_key(method)
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Record one call's metrics: a call counter, a failure counter when an
/// error code is present, and the latency histogram.
fn record_call(method: &str, error_code: Option<&str>, elapsed: Duration) {
    counter!("moot_tool_calls_total", "method" => method.to_owned()).increment(1);
    if let Some(code) = error_code {
        counter!(
            "moot_tool_call_failures_total",
            "method" => method.to_owned(),
            "code" => code.to_owned()
        )
        .increment(1);
    }
    histogram!("moot_tool_call_seconds", "method" => method.to_owned())
        .record(elapsed.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_helpers::make_test_context;
    use serde_json::json;

    struct EchoHandler;

    #[async_trait]
    impl MethodHandler for EchoHandler {
        async fn handle(
            &self,
            params: Option<Value>,
            _ctx: &RpcContext,
        ) -> Result<Value, RpcError> {
            Ok(params.unwrap_or(json!(null)))
        }
    }

    struct FailHandler;

    #[async_trait]
    impl MethodHandler for FailHandler {
        async fn handle(
            &self,
            _params: Option<Value>,
            _ctx: &RpcContext,
        ) -> Result<Value, RpcError> {
            Err(RpcError::Internal {
                message: "boom".into(),
            })
        }
    }

    struct TaggedHandler(&'static str);

    #[async_trait]
    impl MethodHandler for TaggedHandler {
        async fn handle(
            &self,
            _params: Option<Value>,
            _ctx: &RpcContext,
        ) -> Result<Value, RpcError> {
            Ok(json!({"tag": self.0}))
        }
    }

    fn request(id: &str, method: &str, params: Option<Value>) -> RpcRequest {
        RpcRequest {
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    #[tokio::test]
    async fn dispatch_reaches_registered_handler() {
        let mut registry = MethodRegistry::new();
        registry.register("test.echo", EchoHandler);
        let (ctx, _dir) = make_test_context();

        let resp = registry
            .dispatch(request("r1", "test.echo", Some(json!({"x": 1}))), &ctx)
            .await;
        assert!(resp.success);
        assert_eq!(resp.id, "r1");
        assert_eq!(resp.result.unwrap()["x"], 1);
    }

    #[tokio::test]
    async fn unknown_method_returns_method_not_found() {
        let registry = MethodRegistry::new();
        let (ctx, _dir) = make_test_context();

        let resp = registry.dispatch(request("r2", "no.such", None), &ctx).await;
        assert!(!resp.success);
        assert_eq!(resp.error.unwrap().code, "METHOD_NOT_FOUND");
    }

    #[tokio::test]
    async fn handler_error_becomes_error_response() {
        let mut registry = MethodRegistry::new();
        registry.register("test.fail", FailHandler);
        let (ctx, _dir) = make_test_context();

        let resp = registry.dispatch(request("r3", "test.fail", None), &ctx).await;
        assert!(!resp.success);
        let err = resp.error.unwrap();
        assert_eq!(err.code, "INTERNAL_ERROR");
        assert_eq!(err.message, "boom");
    }

    #[tokio::test]
    async fn response_preserves_request_id() {
        let mut registry = MethodRegistry::new();
        registry.register("test.echo", EchoHandler);
        let (ctx, _dir) = make_test_context();

        let resp = registry
            .dispatch(request("unique_42", "test.echo", None), &ctx)
            .await;
        assert_eq!(resp.id, "unique_42");
    }

    #[tokio::test]
    async fn re_registering_replaces_the_handler() {
        let mut registry = MethodRegistry::new();
        registry.register("test.tagged", TaggedHandler("old"));
        registry.register("test.tagged", TaggedHandler("new"));
        let (ctx, _dir) = make_test_context();

        let resp = registry
            .dispatch(request("r4", "test.tagged", None), &ctx)
            .await;
        assert_eq!(resp.result.unwrap()["tag"], "new");
        assert_eq!(registry.methods().len(), 1);
    }

    #[test]
    fn methods_come_out_sorted() {
        let mut registry = MethodRegistry::new();
        registry.register("b.two", EchoHandler);
        registry.register("a.one", EchoHandler);
        registry.register("c.three", EchoHandler);
        assert_eq!(registry.methods(), vec!["a.one", "b.two", "c.three"]);
        assert!(registry.has_method("a.one"));
        assert!(!registry.has_method("d.four"));
    }
}
