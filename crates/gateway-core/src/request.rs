//! The mutable value threaded left-to-right through the pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::GatewayError;
use crate::message::Message;
use crate::options::RequestOptions;
use crate::registries::GatewayRegistries;
use crate::response::LLMResponse;

/// Where a [`Request`] currently sits in its own lifecycle. Plugs may only
/// move this forward; nothing resets a request to an earlier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Pending,
    Executing,
    Streaming,
    Completed,
    Error,
}

/// The pipeline's unit of work: a provider-agnostic call in progress.
///
/// Plugs fold over this value (see [`crate::pipeline`]); none of them own
/// it outright. `halted` short-circuits the remaining chain except for
/// plugs marked `always_run`; `errors` accumulates rather than replaces, so
/// a halting plug's error is never silently lost even if a later
/// `always_run` plug also appends one.
#[derive(Clone)]
pub struct Request {
    pub provider: String,
    pub messages: Vec<Message>,
    pub options: RequestOptions,
    pub config: Arc<GatewayRegistries>,
    pub state: RequestState,
    pub halted: bool,
    pub assigns: HashMap<String, Value>,
    pub response: Option<LLMResponse>,
    pub errors: Vec<GatewayError>,
}

impl Request {
    pub fn new(
        provider: impl Into<String>,
        messages: Vec<Message>,
        options: RequestOptions,
        config: Arc<GatewayRegistries>,
    ) -> Self {
        Self {
            provider: provider.into(),
            messages,
            options,
            config,
            state: RequestState::Pending,
            halted: false,
            assigns: HashMap::new(),
            response: None,
            errors: Vec::new(),
        }
    }

    /// Halts the pipeline and records `error`, matching the "attach error,
    /// halt, never raise" contract plugs must follow.
    pub fn halt_with_error(mut self, error: GatewayError) -> Self {
        self.errors.push(error);
        self.halted = true;
        self.state = RequestState::Error;
        self
    }

    pub fn assign(mut self, key: impl Into<String>, value: Value) -> Self {
        self.assigns.insert(key.into(), value);
        self
    }

    pub fn get_assign(&self, key: &str) -> Option<&Value> {
        self.assigns.get(key)
    }

    pub fn last_error(&self) -> Option<&GatewayError> {
        self.errors.last()
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("provider", &self.provider)
            .field("message_count", &self.messages.len())
            .field("state", &self.state)
            .field("halted", &self.halted)
            .field("error_count", &self.errors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registries::GatewayRegistries;

    fn sample_request() -> Request {
        Request::new(
            "mock",
            vec![Message::user("hi")],
            RequestOptions::default(),
            Arc::new(GatewayRegistries::default()),
        )
    }

    #[test]
    fn halt_with_error_sets_halted_and_error_state() {
        let req = sample_request().halt_with_error(GatewayError::InvalidRequest("bad".into()));
        assert!(req.halted);
        assert_eq!(req.state, RequestState::Error);
        assert_eq!(req.errors.len(), 1);
    }
}
