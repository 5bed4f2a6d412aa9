use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// The closed vocabulary of capability tags a (provider, model) pair can
/// declare support for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Streaming,
    Vision,
    AudioInput,
    AudioOutput,
    FunctionCalling,
    Embeddings,
    JsonMode,
    Logprobs,
    Reasoning,
    WebSearch,
    CachedInput,
    Batch,
}

impl Feature {
    /// Maps a loosely-spelled alias to its canonical tag. Unknown strings
    /// return `None` rather than guessing.
    pub fn from_alias(alias: &str) -> Option<Feature> {
        match alias.to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "streaming" | "stream" => Some(Feature::Streaming),
            "vision" | "image_input" | "images" => Some(Feature::Vision),
            "audio_input" | "audio" | "stt" => Some(Feature::AudioInput),
            "audio_output" | "tts" => Some(Feature::AudioOutput),
            "function_calling" | "tools" | "tool_call" | "functions" => {
                Some(Feature::FunctionCalling)
            }
            "embeddings" | "embedding" => Some(Feature::Embeddings),
            "json_mode" | "json" | "structured_output" => Some(Feature::JsonMode),
            "logprobs" | "log_probs" => Some(Feature::Logprobs),
            "reasoning" | "thinking" => Some(Feature::Reasoning),
            "web_search" | "websearch" | "search" => Some(Feature::WebSearch),
            "cached_input" | "prompt_caching" | "cache" => Some(Feature::CachedInput),
            "batch" | "batching" => Some(Feature::Batch),
            _ => None,
        }
    }
}

/// Pricing rates attached to a model entry. `None` means "no pricing data",
/// which is a normal, expected state — see `cost::apply_pricing`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelPricing {
    pub input: Option<f64>,
    pub output: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_read: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_write: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// A single model's declared capabilities, keyed under its provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub features: HashSet<Feature>,
    pub context_window: Option<u64>,
    pub max_output_tokens: Option<u64>,
    #[serde(default)]
    pub pricing: ModelPricing,
    #[serde(default)]
    pub endpoints: HashSet<String>,
}

impl ModelInfo {
    pub fn supports(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    /// Fills in whatever this entry left unset from the provider's
    /// defaults: `features` are unioned (a model always keeps its own
    /// declared tags, plus whatever the provider declares for all of its
    /// models), scalar fields only fall back when the model didn't set one.
    fn inherit(mut self, defaults: &ModelDefaults) -> Self {
        self.features.extend(defaults.features.iter().copied());
        self.context_window = self.context_window.or(defaults.context_window);
        self.max_output_tokens = self.max_output_tokens.or(defaults.max_output_tokens);
        self.pricing.input = self.pricing.input.or(defaults.pricing.input);
        self.pricing.output = self.pricing.output.or(defaults.pricing.output);
        self.pricing.cache_read = self.pricing.cache_read.or(defaults.pricing.cache_read);
        self.pricing.cache_write = self.pricing.cache_write.or(defaults.pricing.cache_write);
        self
    }
}

/// Provider-level fallbacks a model entry inherits from when it leaves a
/// field unset. Most seeded models set everything explicitly today, but an
/// adapter that only knows a handful of per-model overrides (say, context
/// window) can otherwise lean on what's common to the whole provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelDefaults {
    #[serde(default)]
    pub features: HashSet<Feature>,
    pub context_window: Option<u64>,
    pub max_output_tokens: Option<u64>,
    #[serde(default)]
    pub pricing: ModelPricing,
}

/// A provider entry: identifying metadata, its defaults, and its model table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub env: Vec<String>,
    #[serde(default)]
    pub defaults: ModelDefaults,
    #[serde(default)]
    pub models: HashMap<String, ModelInfo>,
}

impl ProviderInfo {
    /// Looks up `model` under this provider and merges in the provider's
    /// defaults — the two-level lookup the capability registry is built on.
    pub fn resolve_model(&self, model: &str) -> Option<ModelInfo> {
        self.models.get(model).cloned().map(|m| m.inherit(&self.defaults))
    }
}

/// The top-level capability table: provider id -> provider entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersRegistry {
    pub providers: HashMap<String, ProviderInfo>,
}

impl From<HashMap<String, ProviderInfo>> for ProvidersRegistry {
    fn from(map: HashMap<String, ProviderInfo>) -> Self {
        ProvidersRegistry { providers: map }
    }
}
