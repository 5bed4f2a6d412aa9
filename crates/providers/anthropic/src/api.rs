//! Request/response shaping for Anthropic's `/v1/messages` and `/v1/models`
//! endpoints.
//!
//! Split from `lib.rs` the same way the OpenAI provider crate splits its
//! wire format from adapter plumbing: pure functions over
//! `http::Request`/`http::Response`, easy to unit test without a network.

use http::{Request, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use gateway_core::error::GatewayError;
use gateway_core::functions::to_anthropic_tools;
use gateway_core::message::{ContentPart, MediaSource, Message, Role};
use gateway_core::options::RequestOptions;
use gateway_core::response::{FinishReason, LLMResponse, Usage};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentOut<'a> {
    Text {
        text: &'a str,
    },
    Image {
        source: AnthropicImageSource<'a>,
    },
    ToolResult {
        tool_use_id: &'a str,
        content: &'a str,
    },
}

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicImageSource<'a> {
    Url { url: &'a str },
    Base64 { media_type: &'a str, data: String },
}

#[derive(Serialize, Debug)]
struct AnthropicMessageOut<'a> {
    role: &'a str,
    content: Vec<AnthropicContentOut<'a>>,
}

fn non_system_role_str(role: Role) -> &'static str {
    match role {
        Role::Assistant => "assistant",
        // Anthropic only has user/assistant turns; tool results and
        // developer-role content travel inside a user turn.
        _ => "user",
    }
}

fn to_anthropic_content(part: &ContentPart) -> Option<AnthropicContentOut<'_>> {
    match part {
        ContentPart::Text { text } if !text.is_empty() => Some(AnthropicContentOut::Text { text }),
        ContentPart::Text { .. } => None,
        ContentPart::Image { source, .. } => Some(AnthropicContentOut::Image {
            source: match source {
                MediaSource::Url(url) => AnthropicImageSource::Url { url },
                MediaSource::Data { data, media_type } => AnthropicImageSource::Base64 {
                    media_type,
                    data: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, data),
                },
            },
        }),
        ContentPart::Audio { .. } | ContentPart::File { .. } => None,
    }
}

fn to_anthropic_message(message: &Message) -> AnthropicMessageOut<'_> {
    if message.role == Role::Tool {
        let tool_use_id = message.tool_call_id.as_deref().unwrap_or_default();
        return AnthropicMessageOut {
            role: "user",
            content: vec![AnthropicContentOut::ToolResult {
                tool_use_id,
                content: message.content.first().and_then(ContentPart::as_text).unwrap_or(""),
            }],
        };
    }

    let content = message.content.iter().filter_map(to_anthropic_content).collect();
    AnthropicMessageOut {
        role: non_system_role_str(message.role),
        content,
    }
}

fn extract_system(messages: &[Message]) -> Option<String> {
    let text = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(Message::text_content)
        .collect::<Vec<_>>()
        .join("\n");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[derive(Serialize, Debug)]
struct AnthropicChatRequest<'a> {
    model: &'a str,
    messages: Vec<AnthropicMessageOut<'a>>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
}

pub fn anthropic_chat_request(
    base_url: &Url,
    api_key: &str,
    messages: &[Message],
    options: &RequestOptions,
    model: &str,
    stream: bool,
) -> Result<Request<Vec<u8>>, GatewayError> {
    let system = extract_system(messages);
    let turns: Vec<AnthropicMessageOut<'_>> = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(to_anthropic_message)
        .collect();

    let body = AnthropicChatRequest {
        model,
        messages: turns,
        max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        stream,
        system: system.as_deref(),
        temperature: options.temperature,
        top_p: options.top_p,
        top_k: options.top_k,
        stop_sequences: options.stop.as_deref(),
        tools: options.tools.as_deref().map(to_anthropic_tools),
        tool_choice: options.tool_choice.as_ref().map(|tc| serde_json::to_value(tc).unwrap_or(Value::Null)),
    };

    let url = base_url.join("messages")?;
    let payload = serde_json::to_vec(&body)?;

    Request::builder()
        .method("POST")
        .uri(url.to_string())
        .header("Content-Type", "application/json")
        .header("x-api-key", api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .body(payload)
        .map_err(GatewayError::from)
}

#[derive(Deserialize, Debug)]
struct AnthropicContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
    id: Option<String>,
    name: Option<String>,
    input: Option<Value>,
}

#[derive(Deserialize, Debug)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Deserialize, Debug)]
struct AnthropicChatResponse {
    model: Option<String>,
    content: Vec<AnthropicContentBlock>,
    stop_reason: Option<String>,
    usage: Option<AnthropicUsage>,
}

fn finish_reason(raw: Option<&str>) -> Option<FinishReason> {
    match raw? {
        "end_turn" | "stop_sequence" => Some(FinishReason::Stop),
        "max_tokens" => Some(FinishReason::Length),
        "tool_use" => Some(FinishReason::ToolUse),
        _ => Some(FinishReason::Error),
    }
}

pub fn anthropic_parse_chat(response: Response<Vec<u8>>, fallback_model: &str) -> Result<LLMResponse, GatewayError> {
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

    let parsed: AnthropicChatResponse = serde_json::from_slice(&body)?;

    let text = parsed
        .content
        .iter()
        .filter(|b| b.block_type == "text")
        .filter_map(|b| b.text.as_deref())
        .collect::<Vec<_>>()
        .join("");

    let tool_calls: Vec<gateway_core::functions::ToolCall> = parsed
        .content
        .iter()
        .filter(|b| b.block_type == "tool_use")
        .map(|b| gateway_core::functions::ToolCall {
            id: b.id.clone().unwrap_or_default(),
            call_type: "function".to_string(),
            function: gateway_core::functions::FunctionCallPayload {
                name: b.name.clone().unwrap_or_default(),
                arguments: serde_json::to_string(b.input.as_ref().unwrap_or(&Value::Null)).unwrap_or_default(),
            },
        })
        .collect();

    let usage = parsed.usage.map(|u| Usage::new(u.input_tokens, u.output_tokens)).unwrap_or_default();

    Ok(LLMResponse {
        content: text,
        model: parsed.model.unwrap_or_else(|| fallback_model.to_string()),
        usage,
        finish_reason: finish_reason(parsed.stop_reason.as_deref()),
        tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
        function_call: None,
        refusal: None,
        logprobs: None,
        cost: None,
        metadata: Default::default(),
    })
}

pub fn anthropic_list_models_request(base_url: &Url, api_key: &str) -> Result<Request<Vec<u8>>, GatewayError> {
    let url = base_url.join("models")?;
    Request::builder()
        .method("GET")
        .uri(url.to_string())
        .header("x-api-key", api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .body(Vec::new())
        .map_err(GatewayError::from)
}

#[derive(Deserialize)]
struct AnthropicModelEntry {
    id: String,
}

#[derive(Deserialize)]
struct AnthropicModelList {
    data: Vec<AnthropicModelEntry>,
}

pub fn anthropic_parse_list_models(response: Response<Vec<u8>>) -> Result<Vec<String>, GatewayError> {
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
    let parsed: AnthropicModelList = serde_json::from_slice(&body)?;
    Ok(parsed.data.into_iter().map(|m| m.id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("https://api.anthropic.com/v1/").unwrap()
    }

    #[test]
    fn chat_request_extracts_system_and_carries_max_tokens() {
        let messages = vec![Message::system("be terse"), Message::user("hi")];
        let req = anthropic_chat_request(&url(), "sk-ant", &messages, &RequestOptions::default(), "claude-3-5-sonnet", false)
            .unwrap();
        assert_eq!(req.uri(), "https://api.anthropic.com/v1/messages");
        let body: Value = serde_json::from_slice(req.body()).unwrap();
        assert_eq!(body["system"], "be terse");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["max_tokens"], 4096);
    }

    #[test]
    fn chat_request_uses_x_api_key_header() {
        let req = anthropic_chat_request(&url(), "sk-ant", &[Message::user("hi")], &RequestOptions::default(), "claude-3-5-sonnet", false)
            .unwrap();
        assert_eq!(req.headers().get("x-api-key").unwrap(), "sk-ant");
        assert_eq!(req.headers().get("anthropic-version").unwrap(), ANTHROPIC_VERSION);
    }

    #[test]
    fn tool_message_becomes_user_turn_tool_result() {
        let messages = vec![Message::user("hi"), Message::tool("call_1", "42")];
        let req = anthropic_chat_request(&url(), "sk-ant", &messages, &RequestOptions::default(), "claude-3-5-sonnet", false)
            .unwrap();
        let body: Value = serde_json::from_slice(req.body()).unwrap();
        let second = &body["messages"][1];
        assert_eq!(second["role"], "user");
        assert_eq!(second["content"][0]["type"], "tool_result");
        assert_eq!(second["content"][0]["tool_use_id"], "call_1");
    }

    #[test]
    fn parse_chat_extracts_text_and_tool_use() {
        let raw = serde_json::json!({
            "model": "claude-3-5-sonnet",
            "stop_reason": "tool_use",
            "content": [
                {"type": "text", "text": "checking the weather"},
                {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"city": "nyc"}}
            ],
            "usage": {"input_tokens": 12, "output_tokens": 8}
        });
        let response = Response::builder().status(200).body(serde_json::to_vec(&raw).unwrap()).unwrap();
        let parsed = anthropic_parse_chat(response, "claude-3-5-sonnet").unwrap();
        assert_eq!(parsed.content, "checking the weather");
        assert_eq!(parsed.finish_reason, Some(FinishReason::ToolUse));
        let calls = parsed.tool_calls.unwrap();
        assert_eq!(calls[0].function.name, "get_weather");
    }

    #[test]
    fn parse_chat_maps_server_error_status() {
        let response = Response::builder().status(529).body(b"overloaded".to_vec()).unwrap();
        let err = anthropic_parse_chat(response, "claude-3-5-sonnet").unwrap_err();
        assert!(matches!(err, GatewayError::ServerError { status: 529, .. }));
    }

    #[test]
    fn parse_chat_maps_429_to_rate_limited() {
        let response = Response::builder().status(429).header("retry-after", "5").body(b"slow down".to_vec()).unwrap();
        let err = anthropic_parse_chat(response, "claude-3-5-sonnet").unwrap_err();
        assert!(matches!(err, GatewayError::RateLimited { retry_after: Some(d) } if d.as_secs() == 5));
    }

    #[test]
    fn parse_chat_maps_401_to_authentication_error() {
        let response = Response::builder().status(401).body(b"bad key".to_vec()).unwrap();
        let err = anthropic_parse_chat(response, "claude-3-5-sonnet").unwrap_err();
        assert!(matches!(err, GatewayError::AuthenticationError(_)));
    }

    #[test]
    fn parse_list_models_extracts_ids() {
        let raw = serde_json::json!({"data": [{"id": "claude-3-5-sonnet"}, {"id": "claude-3-opus"}]});
        let response = Response::builder().status(200).body(serde_json::to_vec(&raw).unwrap()).unwrap();
        let ids = anthropic_parse_list_models(response).unwrap();
        assert_eq!(ids, vec!["claude-3-5-sonnet", "claude-3-opus"]);
    }
}
