//! Dispatches normalized function calls to host-registered handlers.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::error::GatewayError;
use crate::functions::schema::{FunctionCall, FunctionSchema};

type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, GatewayError>> + Send>>;

/// A host-side implementation of a function the model can call.
pub trait FunctionHandler: Send + Sync {
    fn descriptor(&self) -> FunctionSchema;
    fn call(&self, arguments: Value) -> HandlerFuture;
}

/// Adapts a plain async closure into a [`FunctionHandler`], the common case.
pub struct ClosureHandler<F> {
    descriptor: FunctionSchema,
    handler: Arc<F>,
}

impl<F, Fut> ClosureHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, GatewayError>> + Send + 'static,
{
    pub fn new(descriptor: FunctionSchema, handler: F) -> Self {
        Self {
            descriptor,
            handler: Arc::new(handler),
        }
    }
}

impl<F, Fut> FunctionHandler for ClosureHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, GatewayError>> + Send + 'static,
{
    fn descriptor(&self) -> FunctionSchema {
        self.descriptor.clone()
    }

    fn call(&self, arguments: Value) -> HandlerFuture {
        let handler = Arc::clone(&self.handler);
        Box::pin(async move { handler(arguments).await })
    }
}

/// The result of dispatching a [`FunctionCall`] to its handler.
#[derive(Debug, Clone)]
pub struct FunctionResult {
    pub name: String,
    pub result: Result<Value, String>,
}

/// Name-keyed registry of callable functions, consulted by the facade when a
/// response or stream carries tool calls the caller asked the gateway to
/// execute on its behalf rather than just report.
#[derive(Default)]
pub struct FunctionRegistry {
    handlers: HashMap<String, Arc<dyn FunctionHandler>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn FunctionHandler>) {
        self.handlers.insert(handler.descriptor().name, handler);
    }

    pub fn schemas(&self) -> Vec<FunctionSchema> {
        self.handlers.values().map(|h| h.descriptor()).collect()
    }

    /// Dispatches a normalized call by name. Unknown names report a result
    /// rather than halting the pipeline — the caller decides what to do with
    /// a failed tool call.
    pub async fn execute_function(&self, call: &FunctionCall) -> FunctionResult {
        match self.handlers.get(&call.name) {
            Some(handler) => match handler.call(call.arguments.clone()).await {
                Ok(value) => FunctionResult {
                    name: call.name.clone(),
                    result: Ok(value),
                },
                Err(e) => FunctionResult {
                    name: call.name.clone(),
                    result: Err(e.to_string()),
                },
            },
            None => FunctionResult {
                name: call.name.clone(),
                result: Err(format!("unknown function `{}`", call.name)),
            },
        }
    }
}

/// Which provider dialect a follow-up tool-result message should be shaped
/// for. `format_result` uses this to pick the right message role/content
/// convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultDialect {
    OpenAi,
    Anthropic,
}

/// Shapes a [`FunctionResult`] into the follow-up message content a provider
/// expects for a tool-call continuation.
pub fn format_result(result: &FunctionResult, dialect: ResultDialect) -> Value {
    let body = match &result.result {
        Ok(value) => value.clone(),
        Err(message) => serde_json::json!({ "error": message }),
    };
    match dialect {
        ResultDialect::OpenAi => serde_json::json!({
            "role": "tool",
            "name": result.name,
            "content": body.to_string(),
        }),
        ResultDialect::Anthropic => serde_json::json!({
            "type": "tool_result",
            "content": body.to_string(),
        }),
    }
}
