//! OpenAI provider adapter (C6) — chat, streaming chat, embeddings, and
//! model listing against OpenAI's `/v1` API, and anything that speaks the
//! same dialect (OpenAI-compatible endpoints: OpenRouter, Groq, LM Studio,
//! local vLLM servers, ...) via a custom `base_url`.

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
use gateway_core::stream::dialect::openai_chunk;
use gateway_core::stream::drive_sse_stream;

fn normalize_base_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let p = url.path().to_string();
        url.set_path(&(p + "/"));
    }
    url
}

/// Client for OpenAI's (or an OpenAI-compatible) chat/embeddings/models API.
pub struct OpenAI {
    provider_id: String,
    api_key: Arc<dyn ApiKeyResolver>,
    base_url: Url,
    default_model: Option<String>,
}

impl OpenAI {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, Url::parse("https://api.openai.com/v1/").unwrap())
    }

    /// Builds an adapter for an OpenAI-compatible endpoint under a different
    /// provider id — OpenRouter, Groq, a local vLLM/LM Studio server.
    pub fn compatible(provider_id: impl Into<String>, api_key: impl Into<String>, base_url: Url) -> Self {
        Self {
            provider_id: provider_id.into(),
            ..Self::with_base_url(api_key, base_url)
        }
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: Url) -> Self {
        Self {
            provider_id: "openai".to_string(),
            api_key: static_key(api_key),
            base_url: normalize_base_url(base_url),
            default_model: None,
        }
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
impl ProviderAdapter for OpenAI {
    fn id(&self) -> &str {
        &self.provider_id
    }

    #[tracing::instrument(name = "openai_provider.chat", skip_all, fields(provider = %self.provider_id))]
    async fn chat(&self, messages: &[Message], options: &RequestOptions) -> Result<LLMResponse, GatewayError> {
        self.api_key.resolve().await?;
        let model = self.model_for(options)?;
        let key = self.api_key.current();
        let request = api::openai_chat_request(&self.base_url, &key, messages, options, &model, false)?;
        let response = call_outbound(request).await.map_err(|e| GatewayError::NetworkError(e.to_string()))?;
        api::openai_parse_chat(response, &model)
    }

    #[tracing::instrument(name = "openai_provider.stream_chat", skip_all, fields(provider = %self.provider_id))]
    async fn stream_chat(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<BoxStream<'static, Result<StreamChunk, GatewayError>>, GatewayError> {
        self.api_key.resolve().await?;
        let model = self.model_for(options)?;
        let key = self.api_key.current();
        let request = api::openai_chat_request(&self.base_url, &key, messages, options, &model, true)?;
        let bytes = call_outbound_streaming(request).await?;
        Ok(drive_sse_stream(bytes, |_event, data| openai_chunk(data)))
    }

    #[tracing::instrument(name = "openai_provider.list_models", skip_all, fields(provider = %self.provider_id))]
    async fn list_models(&self) -> Result<Vec<String>, GatewayError> {
        self.api_key.resolve().await?;
        let key = self.api_key.current();
        let request = api::openai_list_models_request(&self.base_url, &key)?;
        let response = call_outbound(request).await.map_err(|e| GatewayError::NetworkError(e.to_string()))?;
        api::openai_parse_list_models(response)
    }

    #[tracing::instrument(name = "openai_provider.embeddings", skip_all, fields(provider = %self.provider_id))]
    async fn embeddings(&self, inputs: &[String], options: &RequestOptions) -> Result<Vec<Vec<f32>>, GatewayError> {
        self.api_key.resolve().await?;
        let model = self.model_for(options)?;
        let key = self.api_key.current();
        let request = api::openai_embed_request(&self.base_url, &key, inputs, options, &model)?;
        let response = call_outbound(request).await.map_err(|e| GatewayError::NetworkError(e.to_string()))?;
        api::openai_parse_embed(response)
    }

    fn default_model(&self) -> Option<&str> {
        self.default_model.as_deref()
    }

    fn configured(&self) -> bool {
        !self.api_key.current().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash_so_join_appends() {
        let adapter = OpenAI::new("sk-test");
        assert_eq!(adapter.base_url.as_str(), "https://api.openai.com/v1/");
    }

    #[test]
    fn compatible_overrides_provider_id_and_host() {
        let adapter = OpenAI::compatible("groq", "gsk-test", Url::parse("https://api.groq.com/openai/v1").unwrap());
        assert_eq!(adapter.id(), "groq");
        assert_eq!(adapter.base_url.as_str(), "https://api.groq.com/openai/v1/");
    }

    #[test]
    fn configured_reflects_whether_a_key_is_present() {
        assert!(OpenAI::new("sk-test").configured());
        assert!(!OpenAI::new("").configured());
    }

    #[tokio::test]
    async fn chat_without_model_or_default_is_invalid_request() {
        let adapter = OpenAI::new("sk-test");
        let err = adapter.chat(&[Message::user("hi")], &RequestOptions::default()).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidRequest(_)));
    }
}
