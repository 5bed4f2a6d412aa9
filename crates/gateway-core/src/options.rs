//! The per-call option bag recognized by the facade and pipeline plugs.

use crate::context::ContextStrategy;
use crate::functions::{Tool, ToolChoice};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How backoff delay grows between retry attempts; `Linear` and
/// `Exponential` name the curve, the multiplier/base live in
/// [`crate::retry::RetryPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetryBackoff {
    #[default]
    Exponential,
    Linear,
}

/// Which stream-recovery strategy `resume_stream` should apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    Exact,
    Paragraph,
    Summarize,
}

/// Every option the facade and pipeline recognize for a single call, per
/// the external-interfaces option list. Everything is optional; a `None`
/// defers to the provider/adapter/pipeline default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub max_tokens: Option<u32>,
    pub max_completion_tokens: Option<u32>,
    pub stop: Option<Vec<String>>,
    pub seed: Option<i64>,
    pub n: Option<u32>,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub response_format: Option<Value>,
    pub tools: Option<Vec<Tool>>,
    pub tool_choice: Option<ToolChoice>,
    pub parallel_tool_calls: Option<bool>,
    pub functions: Option<Vec<Tool>>,
    pub function_call: Option<ToolChoice>,

    pub stream_recovery: Option<bool>,
    pub recovery_strategy: Option<RecoveryStrategy>,
    pub recovery_id: Option<String>,

    pub cache: Option<bool>,
    pub cache_ttl: Option<u64>,

    pub retry: Option<bool>,
    pub retry_count: Option<u32>,
    pub retry_delay: Option<u64>,
    pub retry_backoff: Option<RetryBackoff>,
    pub retry_jitter: Option<bool>,

    pub timeout: Option<u64>,
    pub track_cost: Option<bool>,

    pub strategy: Option<ContextStrategy>,
    pub preserve_messages: Option<usize>,

    pub reasoning_effort: Option<String>,
    pub audio: Option<Value>,
    pub web_search_options: Option<Value>,
    pub prediction: Option<Value>,
    pub stream_options: Option<Value>,

    /// Output vector size for `embeddings` calls; affects the response so it
    /// belongs in the cache fingerprint alongside `model`.
    pub dimensions: Option<u32>,
}

impl RequestOptions {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = Some(enabled);
        self
    }

    pub fn track_cost_enabled(&self) -> bool {
        self.track_cost.unwrap_or(true)
    }
}
