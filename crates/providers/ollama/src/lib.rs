//! Ollama provider adapter (C6) — chat, streaming chat, and embeddings
//! against a local (or remote) Ollama server's newline-delimited-JSON API.
//!
//! Unlike OpenAI/Anthropic, Ollama has no API key by default; `configured()`
//! only checks that a base URL was set, and `with_key_resolver` exists for
//! deployments that put Ollama behind an authenticating proxy.

mod api;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use url::Url;

use gateway_core::adapter::ProviderAdapter;
use gateway_core::auth::{static_key, ApiKeyResolver};
use gateway_core::error::GatewayError;
use gateway_core::message::Message;
use gateway_core::options::RequestOptions;
use gateway_core::outbound::{call_outbound, call_outbound_streaming};
use gateway_core::response::{LLMResponse, StreamChunk};
use gateway_core::stream::dialect::{drive_ndjson_stream, ndjson_chunk};

/// Client for Ollama's `/api/chat`, `/api/embed`, and `/api/tags` endpoints.
pub struct Ollama {
    api_key: Arc<dyn ApiKeyResolver>,
    base_url: Url,
    default_model: Option<String>,
}

impl Ollama {
    pub fn new(base_url: Url) -> Self {
        Self {
            api_key: static_key(""),
            base_url,
            default_model: None,
        }
    }

    pub fn localhost() -> Self {
        Self::new(Url::parse("http://localhost:11434/").unwrap())
    }

    pub fn with_key_resolver(mut self, resolver: Arc<dyn ApiKeyResolver>) -> Self {
        self.api_key = resolver;
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    fn model_for(&self, options: &RequestOptions) -> Result<String, GatewayError> {
        options
            .model
            .clone()
            .or_else(|| self.default_model.clone())
            .ok_or_else(|| GatewayError::InvalidRequest("no model specified and adapter has no default".into()))
    }
}

#[async_trait]
impl ProviderAdapter for Ollama {
    fn id(&self) -> &str {
        "ollama"
    }

    #[tracing::instrument(name = "ollama_provider.chat", skip_all)]
    async fn chat(&self, messages: &[Message], options: &RequestOptions) -> Result<LLMResponse, GatewayError> {
        self.api_key.resolve().await?;
        let model = self.model_for(options)?;
        let request = api::ollama_chat_request(&self.base_url, messages, options, &model, false)?;
        let response = call_outbound(request).await.map_err(|e| GatewayError::NetworkError(e.to_string()))?;
        api::ollama_parse_chat(response, &model)
    }

    #[tracing::instrument(name = "ollama_provider.stream_chat", skip_all)]
    async fn stream_chat(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<BoxStream<'static, Result<StreamChunk, GatewayError>>, GatewayError> {
        self.api_key.resolve().await?;
        let model = self.model_for(options)?;
        let request = api::ollama_chat_request(&self.base_url, messages, options, &model, true)?;
        let bytes = call_outbound_streaming(request).await?;
        Ok(drive_ndjson_stream(bytes, ndjson_chunk))
    }

    #[tracing::instrument(name = "ollama_provider.list_models", skip_all)]
    async fn list_models(&self) -> Result<Vec<String>, GatewayError> {
        let request = api::ollama_list_models_request(&self.base_url)?;
        let response = call_outbound(request).await.map_err(|e| GatewayError::NetworkError(e.to_string()))?;
        api::ollama_parse_list_models(response)
    }

    #[tracing::instrument(name = "ollama_provider.embeddings", skip_all)]
    async fn embeddings(&self, inputs: &[String], options: &RequestOptions) -> Result<Vec<Vec<f32>>, GatewayError> {
        let model = self.model_for(options)?;
        let request = api::ollama_embed_request(&self.base_url, inputs, &model)?;
        let response = call_outbound(request).await.map_err(|e| GatewayError::NetworkError(e.to_string()))?;
        api::ollama_parse_embed(response)
    }

    fn default_model(&self) -> Option<&str> {
        self.default_model.as_deref()
    }

    fn configured(&self) -> bool {
        !self.base_url.as_str().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localhost_points_at_default_port() {
        assert_eq!(Ollama::localhost().base_url.as_str(), "http://localhost:11434/");
    }

    #[tokio::test]
    async fn chat_without_model_or_default_is_invalid_request() {
        let adapter = Ollama::localhost();
        let err = adapter.chat(&[Message::user("hi")], &RequestOptions::default()).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn embeddings_require_a_model() {
        let adapter = Ollama::localhost();
        let err = adapter.embeddings(&["hi".to_string()], &RequestOptions::default()).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidRequest(_)));
    }
}
