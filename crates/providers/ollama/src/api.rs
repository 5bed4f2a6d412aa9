//! Request/response shaping for Ollama's `/api/chat`, `/api/embed`, and
//! `/api/tags` endpoints.
//!
//! Ollama's non-streaming chat response is a single JSON object shaped the
//! same as each line of its streaming response (just with `"done": true`
//! and the full message up front), so `ollama_parse_chat` reuses the same
//! fields [`gateway_core::stream::dialect::ndjson_chunk`] reads off each
//! stream line.

use http::{Request, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use gateway_core::error::GatewayError;
use gateway_core::functions::ToolCall;
use gateway_core::message::{ContentPart, MediaSource, Message, Role};
use gateway_core::options::RequestOptions;
use gateway_core::response::{FinishReason, LLMResponse, Usage};

#[derive(Serialize, Debug)]
struct OllamaChatMessage<'a> {
    role: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
        Role::Developer => "system",
    }
}

fn to_ollama_message(message: &Message) -> OllamaChatMessage<'_> {
    let mut images = Vec::new();
    for part in &message.content {
        if let ContentPart::Image { source: MediaSource::Data { data, .. }, .. } = part {
            images.push(base64::Engine::encode(&base64::engine::general_purpose::STANDARD, data));
        }
    }
    OllamaChatMessage {
        role: role_str(message.role),
        content: message.text_content(),
        images: if images.is_empty() { None } else { Some(images) },
    }
}

#[derive(Serialize, Debug)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
}

fn build_options(options: &RequestOptions) -> Option<OllamaOptions> {
    let o = OllamaOptions {
        temperature: options.temperature,
        top_p: options.top_p,
        top_k: options.top_k,
        num_predict: options.max_tokens.map(|t| t as i32),
        stop: options.stop.clone(),
        seed: options.seed,
        frequency_penalty: options.frequency_penalty,
        presence_penalty: options.presence_penalty,
    };
    Some(o)
}

#[derive(Serialize, Debug)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Value>,
}

pub fn ollama_chat_request(
    base_url: &Url,
    messages: &[Message],
    options: &RequestOptions,
    model: &str,
    stream: bool,
) -> Result<Request<Vec<u8>>, GatewayError> {
    let body = OllamaChatRequest {
        model,
        messages: messages.iter().map(to_ollama_message).collect(),
        stream,
        options: build_options(options),
        tools: options.tools.as_deref().map(|tools| {
            serde_json::json!(tools
                .iter()
                .map(|t| serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.function.name,
                        "description": t.function.description,
                        "parameters": t.function.parameters,
                    }
                }))
                .collect::<Vec<_>>())
        }),
    };

    let url = base_url.join("api/chat")?;
    let payload = serde_json::to_vec(&body)?;

    Request::builder()
        .method("POST")
        .uri(url.to_string())
        .header("Content-Type", "application/json")
        .body(payload)
        .map_err(GatewayError::from)
}

#[derive(Deserialize, Debug)]
struct OllamaResponseMessage {
    content: String,
    #[serde(default)]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

#[derive(Deserialize, Debug)]
struct OllamaToolCall {
    function: OllamaFunctionCall,
}

#[derive(Deserialize, Debug)]
struct OllamaFunctionCall {
    name: String,
    arguments: Value,
}

#[derive(Deserialize, Debug)]
struct OllamaChatResponse {
    model: Option<String>,
    message: Option<OllamaResponseMessage>,
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

fn finish_reason(message: &Option<OllamaResponseMessage>, done_reason: Option<&str>) -> Option<FinishReason> {
    if message.as_ref().and_then(|m| m.tool_calls.as_ref()).is_some_and(|c| !c.is_empty()) {
        return Some(FinishReason::ToolUse);
    }
    match done_reason? {
        "stop" => Some(FinishReason::Stop),
        "length" => Some(FinishReason::Length),
        _ => Some(FinishReason::Stop),
    }
}

pub fn ollama_parse_chat(response: Response<Vec<u8>>, fallback_model: &str) -> Result<LLMResponse, GatewayError> {
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

    let parsed: OllamaChatResponse = serde_json::from_slice(&body)?;
    let tool_calls = parsed.message.as_ref().and_then(|m| m.tool_calls.as_ref()).map(|calls| {
        calls
            .iter()
            .map(|c| ToolCall {
                id: format!("call_{}", c.function.name),
                call_type: "function".to_string(),
                function: gateway_core::functions::FunctionCallPayload {
                    name: c.function.name.clone(),
                    arguments: serde_json::to_string(&c.function.arguments).unwrap_or_default(),
                },
            })
            .collect::<Vec<_>>()
    });

    let finish = finish_reason(&parsed.message, parsed.done_reason.as_deref());
    let content = parsed.message.as_ref().map(|m| m.content.clone()).unwrap_or_default();

    Ok(LLMResponse {
        content,
        model: parsed.model.unwrap_or_else(|| fallback_model.to_string()),
        usage: Usage::new(parsed.prompt_eval_count, parsed.eval_count),
        finish_reason: finish,
        tool_calls,
        function_call: None,
        refusal: None,
        logprobs: None,
        cost: None,
        metadata: Default::default(),
    })
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

pub fn ollama_embed_request(base_url: &Url, inputs: &[String], model: &str) -> Result<Request<Vec<u8>>, GatewayError> {
    let body = OllamaEmbedRequest { model, input: inputs };
    let url = base_url.join("api/embed")?;
    let payload = serde_json::to_vec(&body)?;
    Request::builder()
        .method("POST")
        .uri(url.to_string())
        .header("Content-Type", "application/json")
        .body(payload)
        .map_err(GatewayError::from)
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

pub fn ollama_parse_embed(response: Response<Vec<u8>>) -> Result<Vec<Vec<f32>>, GatewayError> {
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
    let parsed: OllamaEmbedResponse = serde_json::from_slice(&body)?;
    Ok(parsed.embeddings)
}

pub fn ollama_list_models_request(base_url: &Url) -> Result<Request<Vec<u8>>, GatewayError> {
    let url = base_url.join("api/tags")?;
    Request::builder()
        .method("GET")
        .uri(url.to_string())
        .body(Vec::new())
        .map_err(GatewayError::from)
}

#[derive(Deserialize)]
struct OllamaModelEntry {
    model: String,
}

#[derive(Deserialize)]
struct OllamaModelList {
    models: Vec<OllamaModelEntry>,
}

pub fn ollama_parse_list_models(response: Response<Vec<u8>>) -> Result<Vec<String>, GatewayError> {
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
    let parsed: OllamaModelList = serde_json::from_slice(&body)?;
    Ok(parsed.models.into_iter().map(|m| m.model).collect())
}
