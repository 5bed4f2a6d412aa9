//! The mock provider adapter (C6) — a deterministic, in-process stand-in
//! for a real LLM backend, used to exercise the pipeline, retry engine,
//! circuit breaker, and stream coordinator without a network call.
//!
//! Canned behavior is queued up front: [`MockProvider::queue_response`] and
//! [`MockProvider::queue_error`] push onto a FIFO that `chat` drains one
//! entry per call, falling back to a default `"Hello from mock!"` reply
//! once the queue runs dry — exactly the reply the seed scenario in the
//! gateway's design notes expects. [`MockProvider::queue_stream`] does the
//! same for `stream_chat`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};

use gateway_core::adapter::ProviderAdapter;
use gateway_core::error::GatewayError;
use gateway_core::message::Message;
use gateway_core::options::RequestOptions;
use gateway_core::response::{LLMResponse, StreamChunk, Usage};

enum Outcome {
    Response(LLMResponse),
    Error(GatewayError),
}

/// A queued chat call outcome, or the default reply once the queue is empty.
pub struct MockProvider {
    default_model: Option<String>,
    configured: bool,
    responses: Mutex<VecDeque<Outcome>>,
    streams: Mutex<VecDeque<Vec<Result<StreamChunk, GatewayError>>>>,
    calls: AtomicU32,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            default_model: Some("mock-model".to_string()),
            configured: true,
            responses: Mutex::new(VecDeque::new()),
            streams: Mutex::new(VecDeque::new()),
            calls: AtomicU32::new(0),
        }
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unconfigured() -> Self {
        Self { configured: false, ..Self::default() }
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// Queues a response `chat` returns on its next call, consumed FIFO.
    pub fn queue_response(&self, response: LLMResponse) -> &Self {
        self.responses.lock().unwrap().push_back(Outcome::Response(response));
        self
    }

    /// Queues an error `chat` returns on its next call, consumed FIFO.
    pub fn queue_error(&self, error: GatewayError) -> &Self {
        self.responses.lock().unwrap().push_back(Outcome::Error(error));
        self
    }

    /// Queues a canned chunk sequence `stream_chat` yields on its next call.
    pub fn queue_stream(&self, chunks: Vec<Result<StreamChunk, GatewayError>>) -> &Self {
        self.streams.lock().unwrap().push_back(chunks);
        self
    }

    /// Number of times `chat` or `stream_chat` has been invoked.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn default_reply(&self) -> LLMResponse {
        LLMResponse::new(
            "Hello from mock!",
            self.default_model.as_deref().unwrap_or("mock-model"),
            Usage::new(5, 10),
        )
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    fn id(&self) -> &str {
        "mock"
    }

    async fn chat(&self, _messages: &[Message], _options: &RequestOptions) -> Result<LLMResponse, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.responses.lock().unwrap().pop_front() {
            Some(Outcome::Response(response)) => Ok(response),
            Some(Outcome::Error(error)) => Err(error),
            None => Ok(self.default_reply()),
        }
    }

    async fn stream_chat(
        &self,
        _messages: &[Message],
        _options: &RequestOptions,
    ) -> Result<BoxStream<'static, Result<StreamChunk, GatewayError>>, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let chunks = self.streams.lock().unwrap().pop_front().unwrap_or_else(|| {
            let mut chunk = StreamChunk::text("Hello from mock!");
            chunk.finish_reason = Some(gateway_core::response::FinishReason::Stop);
            vec![Ok(chunk)]
        });
        Ok(Box::pin(stream::iter(chunks)))
    }

    fn default_model(&self) -> Option<&str> {
        self.default_model.as_deref()
    }

    fn configured(&self) -> bool {
        self.configured
    }
}
