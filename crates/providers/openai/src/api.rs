//! Request/response shaping for OpenAI's `/v1/chat/completions`,
//! `/v1/embeddings`, and `/v1/models` endpoints.
//!
//! Kept separate from `lib.rs` the same way the teacher splits a provider's
//! wire format from its adapter plumbing: these are pure functions over
//! `http::Request`/`http::Response`, easy to unit test without a network.

use http::{Request, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use gateway_core::error::GatewayError;
use gateway_core::functions::{to_openai_tools, ToolCall};
use gateway_core::message::{Message, Role};
use gateway_core::options::RequestOptions;
use gateway_core::response::{FinishReason, LLMResponse, Usage};

#[derive(Serialize, Debug)]
struct OpenAIToolCallOut<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    call_type: &'a str,
    function: OpenAIFunctionPayload<'a>,
}

#[derive(Serialize, Debug)]
struct OpenAIFunctionPayload<'a> {
    name: &'a str,
    arguments: &'a str,
}

#[derive(Serialize, Debug)]
struct OpenAIChatMessage<'a> {
    role: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCallOut<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
        Role::Developer => "developer",
    }
}

fn to_openai_message(message: &Message) -> OpenAIChatMessage<'_> {
    let text = message.text_content();
    OpenAIChatMessage {
        role: role_str(message.role),
        content: if text.is_empty() { None } else { Some(text) },
        name: message.name.as_deref(),
        tool_calls: message.tool_call_ids.as_ref().map(|_ids| {
            // Tool call arguments aren't recoverable from `Message` alone
            // (they live on the prior `LLMResponse`); a caller round-tripping
            // an assistant turn back into history is expected to push the
            // original `ToolCall`s onto `content`/`metadata` if it needs the
            // full payload to replay. Emitting an empty list here would be
            // wrong, so this only fires when there's nothing to encode.
            Vec::new()
        }),
        tool_call_id: message.tool_call_id.as_deref(),
    }
}

#[derive(Serialize, Debug)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    n: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<&'a str>,
}

pub fn openai_chat_request(
    base_url: &Url,
    api_key: &str,
    messages: &[Message],
    options: &RequestOptions,
    model: &str,
    stream: bool,
) -> Result<Request<Vec<u8>>, GatewayError> {
    let body = OpenAIChatRequest {
        model,
        messages: messages.iter().map(to_openai_message).collect(),
        stream,
        temperature: options.temperature,
        top_p: options.top_p,
        max_tokens: options.max_tokens,
        max_completion_tokens: options.max_completion_tokens,
        stop: options.stop.as_deref(),
        seed: options.seed,
        n: options.n,
        frequency_penalty: options.frequency_penalty,
        presence_penalty: options.presence_penalty,
        response_format: options.response_format.as_ref(),
        tools: options.tools.as_deref().map(to_openai_tools),
        tool_choice: options.tool_choice.as_ref().map(|tc| serde_json::to_value(tc).unwrap_or(Value::Null)),
        reasoning_effort: options.reasoning_effort.as_deref(),
    };

    let url = base_url.join("chat/completions")?;
    let payload = serde_json::to_vec(&body)?;

    Request::builder()
        .method("POST")
        .uri(url.to_string())
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {api_key}"))
        .body(payload)
        .map_err(GatewayError::from)
}

#[derive(Deserialize, Debug)]
struct OpenAIRawUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    #[serde(default)]
    prompt_tokens_details: Option<OpenAITokenDetails>,
    #[serde(default)]
    completion_tokens_details: Option<OpenAITokenDetails>,
}

#[derive(Deserialize, Debug, Default)]
struct OpenAITokenDetails {
    #[serde(default)]
    cached_tokens: u32,
    #[serde(default)]
    reasoning_tokens: u32,
}

impl OpenAIRawUsage {
    fn into_usage(self) -> Usage {
        Usage {
            input_tokens: self.prompt_tokens,
            output_tokens: self.completion_tokens,
            total_tokens: self.prompt_tokens + self.completion_tokens,
            cached_tokens: self.prompt_tokens_details.as_ref().map(|d| d.cached_tokens),
            reasoning_tokens: self.completion_tokens_details.as_ref().map(|d| d.reasoning_tokens),
            audio_tokens: None,
        }
    }
}

#[derive(Deserialize, Debug)]
struct OpenAIChatResponse {
    model: Option<String>,
    choices: Vec<OpenAIChatChoice>,
    usage: Option<OpenAIRawUsage>,
}

#[derive(Deserialize, Debug)]
struct OpenAIChatChoice {
    finish_reason: Option<String>,
    message: OpenAIChatMsg,
}

#[derive(Deserialize, Debug)]
struct OpenAIChatMsg {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
    refusal: Option<String>,
}

fn finish_reason(raw: Option<&str>) -> Option<FinishReason> {
    match raw? {
        "stop" => Some(FinishReason::Stop),
        "length" => Some(FinishReason::Length),
        "tool_calls" | "function_call" => Some(FinishReason::ToolUse),
        "content_filter" => Some(FinishReason::ContentFilter),
        _ => Some(FinishReason::Error),
    }
}

pub fn openai_parse_chat(response: Response<Vec<u8>>, fallback_model: &str) -> Result<LLMResponse, GatewayError> {
    let status = response.status();
    let retry_after = gateway_core::error::parse_retry_after(response.headers());
    let body = response.into_body();
    if !status.is_success() {
        return Err(GatewayError::from_http_status(
            status.as_u16(),
            retry_after,
            String::from_utf8_lossy(&body).into_owned(),
        ));
    }

    let parsed: OpenAIChatResponse = serde_json::from_slice(&body)?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::InvalidRequest("no choices in OpenAI response".into()))?;

    let usage = parsed.usage.map(OpenAIRawUsage::into_usage).unwrap_or_default();

    Ok(LLMResponse {
        content: choice.message.content.unwrap_or_default(),
        model: parsed.model.unwrap_or_else(|| fallback_model.to_string()),
        usage,
        finish_reason: finish_reason(choice.finish_reason.as_deref()),
        tool_calls: choice.message.tool_calls,
        function_call: None,
        refusal: choice.message.refusal,
        logprobs: None,
        cost: None,
        metadata: Default::default(),
    })
}

#[derive(Serialize)]
struct OpenAIEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding_format: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<u32>,
}

pub fn openai_embed_request(
    base_url: &Url,
    api_key: &str,
    inputs: &[String],
    options: &RequestOptions,
    model: &str,
) -> Result<Request<Vec<u8>>, GatewayError> {
    let body = OpenAIEmbeddingRequest {
        model,
        input: inputs,
        encoding_format: Some("float"),
        dimensions: options.dimensions,
    };
    let url = base_url.join("embeddings")?;
    let payload = serde_json::to_vec(&body)?;

    Request::builder()
        .method("POST")
        .uri(url.to_string())
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {api_key}"))
        .body(payload)
        .map_err(GatewayError::from)
}

#[derive(Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

pub fn openai_parse_embed(response: Response<Vec<u8>>) -> Result<Vec<Vec<f32>>, GatewayError> {
    let status = response.status();
    let retry_after = gateway_core::error::parse_retry_after(response.headers());
    let body = response.into_body();
    if !status.is_success() {
        return Err(GatewayError::from_http_status(
            status.as_u16(),
            retry_after,
            String::from_utf8_lossy(&body).into_owned(),
        ));
    }
    let parsed: OpenAIEmbeddingResponse = serde_json::from_slice(&body)?;
    Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
}

pub fn openai_list_models_request(base_url: &Url, api_key: &str) -> Result<Request<Vec<u8>>, GatewayError> {
    let url = base_url.join("models")?;
    Request::builder()
        .method("GET")
        .uri(url.to_string())
        .header("Authorization", format!("Bearer {api_key}"))
        .body(Vec::new())
        .map_err(GatewayError::from)
}

#[derive(Deserialize)]
struct OpenAIModelEntry {
    id: String,
}

#[derive(Deserialize)]
struct OpenAIModelList {
    data: Vec<OpenAIModelEntry>,
}

pub fn openai_parse_list_models(response: Response<Vec<u8>>) -> Result<Vec<String>, GatewayError> {
    let status = response.status();
    let retry_after = gateway_core::error::parse_retry_after(response.headers());
    let body = response.into_body();
    if !status.is_success() {
        return Err(GatewayError::from_http_status(
            status.as_u16(),
            retry_after,
            String::from_utf8_lossy(&body).into_owned(),
        ));
    }
    let parsed: OpenAIModelList = serde_json::from_slice(&body)?;
    Ok(parsed.data.into_iter().map(|m| m.id).collect())
}
