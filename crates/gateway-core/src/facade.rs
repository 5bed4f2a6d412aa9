//! The Public API Facade (C11): the only surface applications are meant to
//! call directly. Everything else in this crate — the pipeline, the
//! registries, the adapters — is an internal collaborator `Gateway` wires
//! together.

use std::sync::Arc;

use crate::adapter::ProviderAdapter;
use crate::capability::{self, Feature, ModelInfo, ProvidersRegistry};
use crate::circuit::CircuitConfig;
use crate::error::GatewayError;
use crate::functions::FunctionHandler;
use crate::message::Message;
use crate::model_ref::parse_provider_model;
use crate::options::{RecoveryStrategy, RequestOptions};
use crate::pipeline::chat_pipeline;
use crate::registries::GatewayRegistries;
use crate::request::Request;
use crate::response::LLMResponse;
use crate::session::{Session, SessionEntry, SessionId, SessionStore};
use crate::stream::coordinator::{run_callback, run_pull, CancellationHandle, StreamConfig, StreamOutcome};
use crate::stream::recovery::{resume_stream, RecoveryRecord};

use futures::stream::BoxStream;
use tokio::sync::mpsc;
use tracing::instrument;

/// The entry point applications hold onto: an `Arc<GatewayRegistries>` plus
/// the convenience methods that wire it into the pipeline, the capability
/// registry, and session storage. Cheap to clone — it's just an `Arc`.
#[derive(Clone)]
pub struct Gateway {
    registries: Arc<GatewayRegistries>,
}

impl Gateway {
    pub fn new(registries: Arc<GatewayRegistries>) -> Self {
        Self { registries }
    }

    pub fn registries(&self) -> &Arc<GatewayRegistries> {
        &self.registries
    }

    fn request_for(&self, provider_spec: &str, messages: Vec<Message>, mut options: RequestOptions) -> Request {
        let parsed = parse_provider_model(provider_spec);
        if let Some(model) = parsed.model {
            options.model = Some(model.to_string());
        }
        Request::new(parsed.provider, messages, options, Arc::clone(&self.registries))
    }

    /// Non-streaming chat completion. `provider` accepts either a bare
    /// provider id (`"openai"`) or the `"provider/model"` syntax, which
    /// overrides `options.model`.
    #[instrument(name = "gateway.chat", skip(self, messages, options), fields(provider = %provider))]
    pub async fn chat(
        &self,
        provider: &str,
        messages: Vec<Message>,
        options: RequestOptions,
    ) -> Result<LLMResponse, GatewayError> {
        let request = self.request_for(provider, messages, options);
        let finished = chat_pipeline().run(request).await;
        match finished.response {
            Some(response) => Ok(response),
            None => {
                let err = finished
                    .last_error()
                    .cloned()
                    .unwrap_or(GatewayError::InvalidRequest("pipeline produced neither a response nor an error".into()));
                tracing::warn!(provider, error = %err, "chat pipeline finished without a response");
                Err(err)
            }
        }
    }

    /// Callback-mode streaming: `on_chunk` is invoked once per chunk, in
    /// arrival order. Applies the same provider validation as `chat`
    /// before handing off to the stream coordinator (C8).
    #[instrument(name = "gateway.stream", skip(self, messages, options, on_chunk), fields(provider = %provider))]
    pub async fn stream<F>(
        &self,
        provider: &str,
        messages: Vec<Message>,
        options: RequestOptions,
        on_chunk: F,
    ) -> Result<StreamOutcome, GatewayError>
    where
        F: FnMut(&crate::response::StreamChunk),
    {
        let (adapter, messages, options, provider) = self.prepare_stream(provider, messages, options)?;
        let source = adapter.stream_chat(&messages, &options).await?;
        let config = stream_config_from(&options);
        let handle = CancellationHandle::new();
        let mut outcome = run_callback(source, config, handle, on_chunk).await?;

        let result = match outcome.error.take() {
            Some(err) if options.stream_recovery.unwrap_or(false) && err.is_retryable_by_default() => {
                let recovery_id = uuid::Uuid::new_v4().to_string();
                let mut record = RecoveryRecord::new(recovery_id.clone(), provider.clone(), messages.clone());
                record.append(&outcome.content);
                tracing::debug!(provider = %provider, recovery_id, error = %err, "stream interrupted, recorded for resumption");
                self.registries.record_recovery(record);
                Err(GatewayError::RecoverableStreamError { reason: err.to_string(), recovery_id })
            }
            Some(err) => {
                tracing::debug!(provider = %provider, error = %err, "stream ended with a non-recoverable error");
                Err(err)
            }
            None => Ok(outcome),
        };
        self.clear_recovery_on_success(&result, &options);
        result
    }

    /// Pull-mode streaming: returns a bounded receiver the caller drains at
    /// its own pace, plus a handle to cancel the stream early.
    #[instrument(name = "gateway.stream_chat", skip(self, messages, options), fields(provider = %provider))]
    pub async fn stream_chat(
        &self,
        provider: &str,
        messages: Vec<Message>,
        options: RequestOptions,
    ) -> Result<(mpsc::Receiver<Result<crate::response::StreamChunk, GatewayError>>, CancellationHandle), GatewayError>
    {
        let (adapter, messages, options, _provider) = self.prepare_stream(provider, messages, options)?;
        let source = adapter.stream_chat(&messages, &options).await?;
        let config = stream_config_from(&options);
        Ok(run_pull(source, config))
    }

    fn prepare_stream(
        &self,
        provider: &str,
        messages: Vec<Message>,
        mut options: RequestOptions,
    ) -> Result<(Arc<dyn ProviderAdapter>, Vec<Message>, RequestOptions, String), GatewayError> {
        let parsed = parse_provider_model(provider);
        let provider = parsed.provider;
        if let Some(model) = parsed.model {
            options.model = Some(model.to_string());
        }
        let adapter = self
            .registries
            .adapter(provider)
            .ok_or_else(|| GatewayError::UnsupportedProvider(provider.to_string()))?;
        if !adapter.configured() {
            return Err(GatewayError::MissingApiKey { provider: provider.to_string() });
        }
        Ok((adapter, messages, options, provider.to_string()))
    }

    /// Drops any stale recovery record tied to this call once it succeeds —
    /// a resumed stream that completes cleanly has nothing left to resume.
    fn clear_recovery_on_success(&self, result: &Result<StreamOutcome, GatewayError>, options: &RequestOptions) {
        if result.is_ok() {
            if let Some(id) = &options.recovery_id {
                self.registries.take_recovery(id);
            }
        }
    }

    /// Reopens a stream that ended with a recoverable error, extending the
    /// original messages per `strategy` and resuming as a fresh stream.
    #[instrument(name = "gateway.resume_stream", skip(self, options, on_chunk), fields(recovery_id = %recovery_id))]
    pub async fn resume_stream<F>(
        &self,
        recovery_id: &str,
        strategy: RecoveryStrategy,
        options: RequestOptions,
        on_chunk: F,
    ) -> Result<StreamOutcome, GatewayError>
    where
        F: FnMut(&crate::response::StreamChunk),
    {
        let record = self
            .registries
            .take_recovery(recovery_id)
            .ok_or_else(|| GatewayError::InvalidRequest(format!("no recovery record for `{recovery_id}`")))?;
        tracing::debug!(recovery_id, provider = %record.provider, "resuming recoverable stream");
        let messages = resume_stream(&record, strategy);
        self.stream(&record.provider, messages, options, on_chunk).await
    }

    /// Recovery ids currently held for resumption (diagnostic/listing use).
    pub fn list_recoverable_streams(&self) -> Vec<String> {
        self.registries.recoverable_ids()
    }

    /// Embeds a batch of inputs through the named provider's adapter,
    /// through the same retry/circuit machinery as `chat`.
    #[instrument(name = "gateway.embeddings", skip(self, inputs, options), fields(provider = %provider))]
    pub async fn embeddings(
        &self,
        provider: &str,
        inputs: Vec<String>,
        options: RequestOptions,
    ) -> Result<Vec<Vec<f32>>, GatewayError> {
        let parsed = parse_provider_model(provider);
        let provider = parsed.provider;
        let mut options = options;
        if let Some(model) = parsed.model {
            options.model = Some(model.to_string());
        }
        let adapter = self
            .registries
            .adapter(provider)
            .ok_or_else(|| GatewayError::UnsupportedProvider(provider.to_string()))?;
        if !adapter.configured() {
            return Err(GatewayError::MissingApiKey { provider: provider.to_string() });
        }
        let circuit = self.registries.circuit_for(provider);
        let permit = circuit.acquire_async().await?;
        let policy = crate::retry::policy_for_request(provider, &options);
        let result = crate::retry::with_retry(&policy, |_attempt| {
            let adapter = Arc::clone(&adapter);
            let inputs = inputs.clone();
            let options = options.clone();
            async move { adapter.embeddings(&inputs, &options).await }
        })
        .await;
        drop(permit);
        match &result {
            Ok(batch) => {
                tracing::debug!(provider, count = batch.len(), "embeddings call succeeded");
                circuit.record_success();
            }
            Err(err) => {
                tracing::warn!(provider, error = %err, "embeddings call failed");
                circuit.record_failure();
            }
        }
        result
    }

    pub async fn list_models(&self, provider: &str) -> Result<Vec<String>, GatewayError> {
        let adapter = self
            .registries
            .adapter(provider)
            .ok_or_else(|| GatewayError::UnsupportedProvider(provider.to_string()))?;
        adapter.list_models().await
    }

    pub fn configured(&self, provider: &str) -> bool {
        self.registries.adapter(provider).map(|a| a.configured()).unwrap_or(false)
    }

    pub fn default_model(&self, provider: &str) -> Option<String> {
        self.registries.adapter(provider).and_then(|a| a.default_model().map(str::to_string))
    }

    pub fn get_model_info(&self, provider: &str, model: &str) -> Option<ModelInfo> {
        self.registries.capabilities.get_model(provider, model)
    }

    pub fn model_supports(&self, provider: &str, model: &str, feature: &str) -> bool {
        self.registries.capabilities.supports(provider, model, feature)
    }

    pub fn find_models_with_features(&self, features: &[Feature]) -> Vec<(String, String)> {
        self.registries.capabilities.find_models_with_features(features)
    }

    /// Ranks (provider, model) pairs that support every feature in
    /// `features` by ascending blended per-1k-token price (input+output),
    /// cheapest first. Pairs with no pricing data sort last.
    pub fn recommend_models(&self, features: &[Feature]) -> Vec<(String, String)> {
        let mut candidates = self.find_models_with_features(features);
        candidates.sort_by(|(pa, ma), (pb, mb)| {
            let price_of = |p: &str, m: &str| -> f64 {
                self.registries
                    .capabilities
                    .get_pricing(p, m)
                    .and_then(|pricing| Some(pricing.input? + pricing.output?))
                    .unwrap_or(f64::MAX)
            };
            price_of(pa, ma).partial_cmp(&price_of(pb, mb)).unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates
    }

    pub fn compare_models(&self, refs: &[(&str, &str)]) -> Vec<(String, String, ModelInfo)> {
        self.registries.capabilities.compare(refs)
    }

    // --- Session helpers -------------------------------------------------

    pub fn new_session(&self) -> Session {
        Session::new()
    }

    pub async fn chat_with_session<S: SessionStore>(
        &self,
        store: &S,
        session_id: &SessionId,
        provider: &str,
        message: Message,
        options: RequestOptions,
    ) -> Result<LLMResponse, GatewayError> {
        store
            .add_session_entry(session_id, SessionEntry::Message(message.clone()))
            .await
            .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;

        let session = store
            .get_session(session_id)
            .await
            .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?
            .ok_or_else(|| GatewayError::InvalidRequest(format!("unknown session `{session_id}`")))?;

        let messages: Vec<Message> = session
            .entries
            .iter()
            .filter_map(|(_, entry)| match entry {
                SessionEntry::Message(m) => Some(m.clone()),
                _ => None,
            })
            .collect();

        match self.chat(provider, messages, options).await {
            Ok(response) => {
                let _ = store
                    .add_session_entry(session_id, SessionEntry::Message(Message::assistant(response.content.clone())))
                    .await;
                Ok(response)
            }
            Err(err) => {
                let _ = store
                    .add_session_entry(session_id, SessionEntry::LLMFailure("chat".into(), err.to_string()))
                    .await;
                Err(err)
            }
        }
    }

    pub async fn add_session_message<S: SessionStore>(
        &self,
        store: &S,
        session_id: &SessionId,
        message: Message,
    ) -> Result<(), GatewayError> {
        store
            .add_session_entry(session_id, SessionEntry::Message(message))
            .await
            .map_err(|e| GatewayError::InvalidRequest(e.to_string()))
    }

    pub async fn get_session_messages<S: SessionStore>(
        &self,
        store: &S,
        session_id: &SessionId,
    ) -> Result<Vec<Message>, GatewayError> {
        let session = store
            .get_session(session_id)
            .await
            .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?
            .ok_or_else(|| GatewayError::InvalidRequest(format!("unknown session `{session_id}`")))?;
        Ok(session
            .entries
            .into_iter()
            .filter_map(|(_, entry)| match entry {
                SessionEntry::Message(m) => Some(m),
                _ => None,
            })
            .collect())
    }

    pub async fn save_session<S: SessionStore>(&self, store: &S, session: &Session) -> Result<(), GatewayError> {
        match store.get_session(&session.id).await {
            Ok(Some(_)) => store.update_session(session).await,
            Ok(None) => store.create_session(session.clone()).await,
            Err(e) => return Err(GatewayError::InvalidRequest(e.to_string())),
        }
        .map_err(|e| GatewayError::InvalidRequest(e.to_string()))
    }

    pub async fn load_session<S: SessionStore>(&self, store: &S, session_id: &SessionId) -> Result<Session, GatewayError> {
        store
            .get_session(session_id)
            .await
            .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?
            .ok_or_else(|| GatewayError::InvalidRequest(format!("unknown session `{session_id}`")))
    }
}

/// Fluent assembly of a [`Gateway`]: set the capability registry and
/// per-provider circuit defaults, register adapters and function handlers,
/// then `build()`. Mirrors `LLMBuilder`'s "collect settings, then produce
/// the real thing in one shot" shape, except `build()` here can never fail
/// — there's no required field, unlike a single-provider builder that must
/// know which provider it's building.
#[derive(Default)]
pub struct GatewayBuilder {
    capabilities: Option<ProvidersRegistry>,
    default_circuit_config: Option<CircuitConfig>,
    adapters: Vec<(String, Arc<dyn ProviderAdapter>)>,
    functions: Vec<Arc<dyn FunctionHandler>>,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the capability registry. Without this, `build()` seeds
    /// [`capability::static_tables`] so a gateway built with no further
    /// setup still answers `model_supports`/`get_model_info` for the
    /// providers this crate ships adapters for.
    pub fn with_capabilities(mut self, capabilities: ProvidersRegistry) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// Overrides the circuit-breaker/bulkhead config newly-seen providers
    /// get by default.
    pub fn with_default_circuit_config(mut self, config: CircuitConfig) -> Self {
        self.default_circuit_config = Some(config);
        self
    }

    /// Registers the adapter answering for `provider`.
    pub fn register_adapter(mut self, provider: impl Into<String>, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.push((provider.into(), adapter));
        self
    }

    /// Registers a host-side function the model may call.
    pub fn register_function(mut self, handler: Arc<dyn FunctionHandler>) -> Self {
        self.functions.push(handler);
        self
    }

    pub fn build(self) -> Gateway {
        let capabilities = self.capabilities.unwrap_or_else(capability::static_tables);
        let mut registries = GatewayRegistries::with_capabilities(capabilities);
        if let Some(config) = self.default_circuit_config {
            registries = registries.with_default_circuit_config(config);
        }
        for handler in self.functions {
            registries.functions.register(handler);
        }
        for (provider, adapter) in self.adapters {
            registries.register_adapter(provider, adapter);
        }
        Gateway::new(Arc::new(registries))
    }
}

fn stream_config_from(options: &RequestOptions) -> StreamConfig {
    StreamConfig {
        initial_timeout: options.timeout.map(std::time::Duration::from_millis),
        idle_timeout: options.timeout.map(std::time::Duration::from_millis),
        ..StreamConfig::default()
    }
}
