//! The Provider Adapter Contract (C6): the seam between the pipeline and a
//! specific provider's wire dialect.
//!
//! An adapter owns exactly one thing — turning a [`Message`] list and
//! [`RequestOptions`] into a provider HTTP call and turning that call's
//! response back into an [`LLMResponse`]/[`StreamChunk`] sequence. It does
//! not retry, cache, track cost, or manage context; the pipeline plugs
//! around it do that. This mirrors the teacher's `HTTPLLMProvider` split
//! between a sync request/parse pair and an async outbound call, just
//! retyped onto the gateway's own message/response/error types instead of
//! hand-rolled per-provider ones.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::GatewayError;
use crate::message::Message;
use crate::options::RequestOptions;
use crate::response::{LLMResponse, StreamChunk};

/// A single chat completion against one provider's API.
///
/// Implementors are expected to be cheap to clone (an `Arc`-wrapped client
/// and config) and safe to share across concurrent calls; the registry
/// holds one instance per configured provider for the life of the process.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Canonical provider id this adapter answers to (`"openai"`,
    /// `"anthropic"`, `"ollama"`, ...). Must match the capability
    /// registry's provider id and `Request::provider`.
    fn id(&self) -> &str;

    /// Non-streaming chat completion.
    async fn chat(&self, messages: &[Message], options: &RequestOptions) -> Result<LLMResponse, GatewayError>;

    /// Streaming chat completion. Returns a stream of [`StreamChunk`]s as
    /// they arrive off the wire; the stream coordinator (C8) is the only
    /// consumer expected to drive this directly — the facade always goes
    /// through it so back-pressure, timeouts, and recovery apply uniformly.
    async fn stream_chat(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<BoxStream<'static, Result<StreamChunk, GatewayError>>, GatewayError>;

    /// Lists models this adapter's account can see, if the provider
    /// exposes a models endpoint. Returns `NotSupported` by default.
    async fn list_models(&self) -> Result<Vec<String>, GatewayError> {
        Err(GatewayError::NotSupported(format!("{} does not expose a list_models endpoint", self.id())))
    }

    /// Embeds a batch of inputs, one vector per input, if the provider
    /// supports embeddings. Returns `NotSupported` by default.
    async fn embeddings(&self, _inputs: &[String], _options: &RequestOptions) -> Result<Vec<Vec<f32>>, GatewayError> {
        Err(GatewayError::NotSupported(format!("{} does not support embeddings", self.id())))
    }

    /// The model to use when a call omits `options.model`.
    fn default_model(&self) -> Option<&str> {
        None
    }

    /// Whether this adapter has what it needs to make calls (an API key,
    /// typically) without making a network call to find out.
    fn configured(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    struct EchoAdapter;

    #[async_trait]
    impl ProviderAdapter for EchoAdapter {
        fn id(&self) -> &str {
            "echo"
        }

        async fn chat(&self, messages: &[Message], _options: &RequestOptions) -> Result<LLMResponse, GatewayError> {
            let text = messages.last().map(|m| m.text_content()).unwrap_or_default();
            Ok(LLMResponse::new(text, "echo-model", crate::response::Usage::new(1, 1)))
        }

        async fn stream_chat(
            &self,
            messages: &[Message],
            _options: &RequestOptions,
        ) -> Result<BoxStream<'static, Result<StreamChunk, GatewayError>>, GatewayError> {
            let text = messages.last().map(|m| m.text_content()).unwrap_or_default();
            Ok(Box::pin(stream::iter(vec![Ok(StreamChunk::text(text))])))
        }
    }

    #[tokio::test]
    async fn default_list_models_is_not_supported() {
        let adapter = EchoAdapter;
        assert!(matches!(adapter.list_models().await, Err(GatewayError::NotSupported(_))));
    }

    #[tokio::test]
    async fn chat_echoes_last_message() {
        let adapter = EchoAdapter;
        let resp = adapter
            .chat(&[Message::user("hi there")], &RequestOptions::default())
            .await
            .unwrap();
        assert_eq!(resp.content, "hi there");
    }
}
