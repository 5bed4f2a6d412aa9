//! The Pipeline Runtime (C7): an ordered list of **plugs** folded
//! left-to-right over a [`Request`]. A plug may set state, add assigns, set
//! a response, or halt the request; once halted, remaining plugs are
//! skipped except those marked `always_run`. A plug that fails attaches a
//! [`GatewayError`] and halts — it never panics or returns a `Result`
//! itself, matching the "attach error, halt, never raise" contract already
//! encoded on [`Request::halt_with_error`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::{fingerprint, DEFAULT_TTL};
use crate::context::{ContextManager, ContextStrategy, DEFAULT_PRESERVE_RECENT};
use crate::cost;
use crate::error::GatewayError;
use crate::request::{Request, RequestState};
use crate::retry;

/// A single step in a pipeline, folded over the [`Request`] it's handed.
/// Implementors are expected to be cheap, stateless, and side-effect-free
/// beyond what they record on the request itself — the same inputs always
/// produce the same assigns/response/halt decision.
#[async_trait]
pub trait Plug: Send + Sync {
    /// A short, stable name for logging/telemetry; not used for dispatch.
    fn name(&self) -> &str;

    /// Whether this plug still runs after the request has halted — used by
    /// telemetry/cleanup plugs like `TrackCost`.
    fn always_run(&self) -> bool {
        false
    }

    async fn call(&self, request: Request) -> Request;
}

/// Folds a fixed list of plugs over a [`Request`] left-to-right, skipping
/// halted requests except for `always_run` plugs.
pub struct Pipeline {
    plugs: Vec<Arc<dyn Plug>>,
}

impl Pipeline {
    pub fn new(plugs: Vec<Arc<dyn Plug>>) -> Self {
        Self { plugs }
    }

    #[tracing::instrument(name = "pipeline.run", skip_all, fields(provider = %request.provider))]
    pub async fn run(&self, mut request: Request) -> Request {
        for plug in &self.plugs {
            if request.halted && !plug.always_run() {
                continue;
            }
            tracing::trace!(plug = plug.name(), "running plug");
            request = plug.call(request).await;
        }
        if let Some(err) = request.last_error() {
            tracing::debug!(provider = %request.provider, error = %err, "pipeline halted");
        }
        request
    }
}

/// Default budget used when a model's context window isn't in the
/// capability registry's static tables — generous enough not to truncate
/// ordinary conversations while still bounding pathological ones.
const DEFAULT_CONTEXT_BUDGET: u64 = 32_000;

/// Confirms the provider has a registered, configured adapter before any
/// other plug runs. Unknown providers and providers missing credentials
/// both halt here rather than surfacing as a network failure later.
pub struct ValidateProvider;

#[async_trait]
impl Plug for ValidateProvider {
    fn name(&self) -> &str {
        "validate_provider"
    }

    async fn call(&self, request: Request) -> Request {
        let adapter = request.config.adapter(&request.provider);
        match adapter {
            Some(adapter) if adapter.configured() => request,
            Some(_) => {
                let provider = request.provider.clone();
                request.halt_with_error(GatewayError::MissingApiKey { provider })
            }
            None => {
                let provider = request.provider.clone();
                request.halt_with_error(GatewayError::UnsupportedProvider(provider))
            }
        }
    }
}

/// Fills in `options.model` from the adapter's default when the caller
/// didn't name one explicitly.
pub struct FetchConfig;

#[async_trait]
impl Plug for FetchConfig {
    fn name(&self) -> &str {
        "fetch_config"
    }

    async fn call(&self, mut request: Request) -> Request {
        if request.options.model.is_none() {
            if let Some(model) = request
                .config
                .adapter(&request.provider)
                .and_then(|a| a.default_model().map(str::to_string))
            {
                request.options.model = Some(model);
            }
        }
        request
    }
}

/// Truncates `request.messages` to fit the model's context window (C2),
/// per the caller's chosen [`ContextStrategy`] and `preserve_messages`.
pub struct ManageContext;

#[async_trait]
impl Plug for ManageContext {
    fn name(&self) -> &str {
        "manage_context"
    }

    async fn call(&self, mut request: Request) -> Request {
        let strategy = request.options.strategy.unwrap_or(ContextStrategy::SlidingWindow);
        let preserve = request.options.preserve_messages.unwrap_or(DEFAULT_PRESERVE_RECENT);
        let max_tokens = request
            .options
            .model
            .as_deref()
            .and_then(|model| request.config.capabilities.context_window(&request.provider, model))
            .unwrap_or(DEFAULT_CONTEXT_BUDGET) as usize;

        let manager = ContextManager::default();
        request.messages = manager.fit(&request.messages, strategy, preserve, max_tokens);
        request
    }
}

/// Single-flight response caching (C3). When `options.cache` is set, runs
/// the rest of the chat chain (`BuildClient` + `ExecuteRequest`) as the
/// cache's producer so concurrent identical requests collapse onto one
/// adapter call; a fresh hit skips the call entirely. Disabled requests
/// pass through untouched and let the outer pipeline's own
/// `BuildClient`/`ExecuteRequest` plugs run normally.
pub struct CachePlug;

#[async_trait]
impl Plug for CachePlug {
    fn name(&self) -> &str {
        "cache"
    }

    async fn call(&self, request: Request) -> Request {
        if !request.options.cache.unwrap_or(false) {
            return request;
        }

        let key = fingerprint(&request.provider, &request.messages, &request.options);
        let ttl = request
            .options
            .cache_ttl
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TTL);

        let provider = request.provider.clone();
        let messages = request.messages.clone();
        let options = request.options.clone();
        let config = Arc::clone(&request.config);
        let cache = &request.config.cache;

        let producer = async move {
            let sub_request = Request::new(provider, messages, options, config);
            let inner = Pipeline::new(vec![Arc::new(BuildClient), Arc::new(ExecuteRequest)]);
            let executed = inner.run(sub_request).await;
            match executed.response {
                Some(response) => Ok(response),
                None => Err(executed
                    .last_error()
                    .cloned()
                    .unwrap_or_else(|| GatewayError::InvalidRequest("producer yielded no response".into()))),
            }
        };

        match cache.with_cache(key, ttl, producer).await {
            Ok(response) => {
                let mut request = request;
                request.response = Some(response);
                request.state = RequestState::Completed;
                request
            }
            Err(err) => request.halt_with_error(err),
        }
    }
}

/// A no-op placeholder matching §4.7's named plug list. Provider adapters
/// own and pool their own transport (mirroring the teacher's lazy global
/// `reqwest::Client`), so there's no client-construction work left to do
/// here; it exists so the standard plug chain reads the way the design
/// names it.
pub struct BuildClient;

#[async_trait]
impl Plug for BuildClient {
    fn name(&self) -> &str {
        "build_client"
    }

    async fn call(&self, request: Request) -> Request {
        request
    }
}

/// Calls the resolved adapter's `chat()` through the provider's retry
/// policy (C4) and circuit breaker (C5). A no-op if a prior plug (the
/// cache) already produced a response.
pub struct ExecuteRequest;

#[async_trait]
impl Plug for ExecuteRequest {
    fn name(&self) -> &str {
        "execute_request"
    }

    async fn call(&self, mut request: Request) -> Request {
        if request.response.is_some() {
            return request;
        }

        let Some(adapter) = request.config.adapter(&request.provider) else {
            let provider = request.provider.clone();
            return request.halt_with_error(GatewayError::UnsupportedProvider(provider));
        };

        let circuit = request.config.circuit_for(&request.provider);
        let permit = match circuit.acquire_async().await {
            Ok(permit) => permit,
            Err(err) => return request.halt_with_error(err),
        };

        let provider = request.provider.clone();
        let messages = request.messages.clone();
        let options = request.options.clone();
        let policy = retry::policy_for_request(&provider, &options);
        let result = retry::with_retry(&policy, |_attempt| {
            let adapter = Arc::clone(&adapter);
            let messages = messages.clone();
            let options = options.clone();
            async move { adapter.chat(&messages, &options).await }
        })
        .await;
        drop(permit);

        match result {
            Ok(response) => {
                circuit.record_success();
                request.response = Some(response);
                request.state = RequestState::Completed;
                request
            }
            Err(err) => {
                circuit.record_failure();
                request.halt_with_error(err)
            }
        }
    }
}

/// Attaches per-model cost to a successful response (C10). Runs even on a
/// halted request (it's `always_run`) but has nothing to do unless a
/// response is present, matching telemetry/cleanup plugs' usual shape.
pub struct TrackCost;

#[async_trait]
impl Plug for TrackCost {
    fn name(&self) -> &str {
        "track_cost"
    }

    fn always_run(&self) -> bool {
        true
    }

    async fn call(&self, mut request: Request) -> Request {
        if !request.options.track_cost_enabled() {
            return request;
        }
        if let Some(mut response) = request.response.take() {
            if response.cost.is_none() {
                if let Some(pricing) = request.config.capabilities.get_pricing(&request.provider, &response.model) {
                    response.cost = cost::apply_pricing(&pricing, &response.usage);
                }
            }
            request.response = Some(response);
        }
        request
    }
}

/// The standard non-streaming chat pipeline: validate, resolve config,
/// manage context, check cache, execute, track cost.
pub fn chat_pipeline() -> Pipeline {
    Pipeline::new(vec![
        Arc::new(ValidateProvider),
        Arc::new(FetchConfig),
        Arc::new(ManageContext),
        Arc::new(CachePlug),
        Arc::new(BuildClient),
        Arc::new(ExecuteRequest),
        Arc::new(TrackCost),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::options::RequestOptions;
    use crate::registries::GatewayRegistries;
    use crate::response::{LLMResponse, Usage};
    use async_trait::async_trait;
    use futures::stream::BoxStream;

    struct StubAdapter {
        configured: bool,
        calls: std::sync::atomic::AtomicU32,
    }

    #[async_trait]
    impl crate::adapter::ProviderAdapter for StubAdapter {
        fn id(&self) -> &str {
            "stub"
        }

        async fn chat(
            &self,
            messages: &[Message],
            _options: &RequestOptions,
        ) -> Result<LLMResponse, GatewayError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let text = messages.last().map(|m| m.text_content()).unwrap_or_default();
            Ok(LLMResponse::new(text, "stub-model", Usage::new(1, 1)))
        }

        async fn stream_chat(
            &self,
            _messages: &[Message],
            _options: &RequestOptions,
        ) -> Result<BoxStream<'static, Result<crate::response::StreamChunk, GatewayError>>, GatewayError> {
            unimplemented!("not exercised by these tests")
        }

        fn configured(&self) -> bool {
            self.configured
        }
    }

    fn registries_with(adapter: StubAdapter) -> Arc<GatewayRegistries> {
        let registries = GatewayRegistries::new();
        registries.register_adapter("stub", Arc::new(adapter));
        Arc::new(registries)
    }

    #[tokio::test]
    async fn unconfigured_provider_halts_before_execution() {
        let registries = registries_with(StubAdapter {
            configured: false,
            calls: Default::default(),
        });
        let request = Request::new("stub", vec![Message::user("hi")], RequestOptions::default(), registries);
        let result = chat_pipeline().run(request).await;
        assert!(result.halted);
        assert!(matches!(result.last_error(), Some(GatewayError::MissingApiKey { .. })));
    }

    #[tokio::test]
    async fn unknown_provider_halts_with_unsupported() {
        let registries = Arc::new(GatewayRegistries::new());
        let request = Request::new("nope", vec![Message::user("hi")], RequestOptions::default(), registries);
        let result = chat_pipeline().run(request).await;
        assert!(result.halted);
        assert!(matches!(result.last_error(), Some(GatewayError::UnsupportedProvider(_))));
    }

    #[tokio::test]
    async fn successful_call_produces_response_and_cost_plug_runs() {
        let registries = registries_with(StubAdapter {
            configured: true,
            calls: Default::default(),
        });
        let request = Request::new("stub", vec![Message::user("hi")], RequestOptions::default(), registries);
        let result = chat_pipeline().run(request).await;
        assert!(!result.halted);
        assert_eq!(result.response.unwrap().content, "hi");
    }

    #[tokio::test]
    async fn caching_collapses_concurrent_identical_calls() {
        let registries = registries_with(StubAdapter {
            configured: true,
            calls: Default::default(),
        });
        let options = RequestOptions::default().cache(true);
        let request = Request::new("stub", vec![Message::user("hi")], options.clone(), Arc::clone(&registries));
        let first = chat_pipeline().run(request).await;
        assert!(!first.halted);

        let request = Request::new("stub", vec![Message::user("hi")], options, registries);
        let second = chat_pipeline().run(request).await;
        assert_eq!(second.response.unwrap().content, "hi");
    }
}
