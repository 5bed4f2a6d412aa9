//! Anthropic provider adapter (C6) — chat, streaming chat, and model listing
//! against Anthropic's `/v1/messages` API.
//!
//! Anthropic has no embeddings endpoint, so [`embeddings`](ProviderAdapter::embeddings)
//! falls back to the trait's default `NotSupported`.

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
use gateway_core::stream::dialect::anthropic_chunk;
use gateway_core::stream::drive_sse_stream;

/// Client for Anthropic's Messages API.
pub struct Anthropic {
    api_key: Arc<dyn ApiKeyResolver>,
    base_url: Url,
    default_model: Option<String>,
}

impl Anthropic {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: static_key(api_key),
            base_url: Url::parse("https://api.anthropic.com/v1/").unwrap(),
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
impl ProviderAdapter for Anthropic {
    fn id(&self) -> &str {
        "anthropic"
    }

    #[tracing::instrument(name = "anthropic_provider.chat", skip_all)]
    async fn chat(&self, messages: &[Message], options: &RequestOptions) -> Result<LLMResponse, GatewayError> {
        self.api_key.resolve().await?;
        let model = self.model_for(options)?;
        let key = self.api_key.current();
        let request = api::anthropic_chat_request(&self.base_url, &key, messages, options, &model, false)?;
        let response = call_outbound(request).await.map_err(|e| GatewayError::NetworkError(e.to_string()))?;
        api::anthropic_parse_chat(response, &model)
    }

    #[tracing::instrument(name = "anthropic_provider.stream_chat", skip_all)]
    async fn stream_chat(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<BoxStream<'static, Result<StreamChunk, GatewayError>>, GatewayError> {
        self.api_key.resolve().await?;
        let model = self.model_for(options)?;
        let key = self.api_key.current();
        let request = api::anthropic_chat_request(&self.base_url, &key, messages, options, &model, true)?;
        let bytes = call_outbound_streaming(request).await?;
        Ok(drive_sse_stream(bytes, anthropic_chunk))
    }

    #[tracing::instrument(name = "anthropic_provider.list_models", skip_all)]
    async fn list_models(&self) -> Result<Vec<String>, GatewayError> {
        self.api_key.resolve().await?;
        let key = self.api_key.current();
        let request = api::anthropic_list_models_request(&self.base_url, &key)?;
        let response = call_outbound(request).await.map_err(|e| GatewayError::NetworkError(e.to_string()))?;
        api::anthropic_parse_list_models(response)
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
    fn configured_reflects_whether_a_key_is_present() {
        assert!(Anthropic::new("sk-ant-test").configured());
        assert!(!Anthropic::new("").configured());
    }

    #[tokio::test]
    async fn chat_without_model_or_default_is_invalid_request() {
        let adapter = Anthropic::new("sk-ant-test");
        let err = adapter.chat(&[Message::user("hi")], &RequestOptions::default()).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn embeddings_are_not_supported() {
        let adapter = Anthropic::new("sk-ant-test").with_default_model("claude-3-5-sonnet");
        let err = adapter.embeddings(&["hi".to_string()], &RequestOptions::default()).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotSupported(_)));
    }
}
