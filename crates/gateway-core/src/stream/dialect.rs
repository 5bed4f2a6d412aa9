//! Per-provider translation from a decoded wire frame to a [`StreamChunk`].
//!
//! These are small, pure functions rather than a trait object hierarchy —
//! each provider crate picks the one matching its wire format and feeds it
//! `SseFrame::data` (or a raw ndjson line). Keeping them here, rather than
//! duplicated per provider crate, is what lets the coordinator test its
//! back-pressure/termination/timeout logic against a real dialect instead
//! of a hand-rolled stub.

use serde_json::Value;

use crate::error::GatewayError;
use crate::functions::ToolCall;
use crate::response::{FinishReason, StreamChunk, Usage};

/// OpenAI-style SSE: `data: [DONE]` terminates the stream; otherwise each
/// frame is a `chat.completion.chunk` JSON object with `choices[0].delta`.
pub fn openai_chunk(data: &str) -> Result<Option<StreamChunk>, GatewayError> {
    if data.trim() == "[DONE]" {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(data)?;
    let choice = value.get("choices").and_then(|c| c.get(0));
    let delta = choice.and_then(|c| c.get("delta"));

    let content = delta
        .and_then(|d| d.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let finish_reason = choice
        .and_then(|c| c.get("finish_reason"))
        .and_then(Value::as_str)
        .and_then(openai_finish_reason);

    let delta_tool_calls = delta
        .and_then(|d| d.get("tool_calls"))
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .filter_map(|c| serde_json::from_value::<ToolCall>(c.clone()).ok())
                .collect::<Vec<_>>()
        })
        .filter(|v| !v.is_empty());

    let usage = value.get("usage").and_then(|u| serde_json::from_value::<Usage>(u.clone()).ok());

    let id = value.get("id").and_then(Value::as_str).map(str::to_string);
    let model = value.get("model").and_then(Value::as_str).map(str::to_string);

    Ok(Some(StreamChunk {
        content,
        finish_reason,
        delta_tool_calls,
        usage,
        id,
        model,
        metadata: Default::default(),
    }))
}

fn openai_finish_reason(raw: &str) -> Option<FinishReason> {
    match raw {
        "stop" => Some(FinishReason::Stop),
        "length" => Some(FinishReason::Length),
        "tool_calls" | "function_call" => Some(FinishReason::ToolUse),
        "content_filter" => Some(FinishReason::ContentFilter),
        _ => Some(FinishReason::Error),
    }
}

/// Anthropic-style SSE: distinct `event:` types per frame
/// (`content_block_delta`, `message_delta`, `message_stop`, ...). Tool-use
/// argument deltas arrive as partial JSON strings that must be accumulated
/// by the caller across frames — this function reports them verbatim as
/// `content` on a synthetic "tool_argument_delta" marker in `metadata`
/// rather than attempting to parse partial JSON itself.
pub fn anthropic_chunk(event: Option<&str>, data: &str) -> Result<Option<StreamChunk>, GatewayError> {
    let value: Value = serde_json::from_str(data)?;
    match event.unwrap_or("") {
        "content_block_delta" => {
            let delta = value.get("delta");
            if let Some(text) = delta.and_then(|d| d.get("text")).and_then(Value::as_str) {
                return Ok(Some(StreamChunk::text(text)));
            }
            if let Some(partial) = delta.and_then(|d| d.get("partial_json")).and_then(Value::as_str) {
                let mut chunk = StreamChunk::default();
                chunk
                    .metadata
                    .insert("tool_argument_delta".to_string(), Value::String(partial.to_string()));
                return Ok(Some(chunk));
            }
            Ok(None)
        }
        "message_delta" => {
            let stop_reason = value
                .get("delta")
                .and_then(|d| d.get("stop_reason"))
                .and_then(Value::as_str);
            let usage = value.get("usage").and_then(|u| serde_json::from_value::<Usage>(u.clone()).ok());
            Ok(Some(StreamChunk {
                finish_reason: stop_reason.and_then(anthropic_finish_reason),
                usage,
                ..Default::default()
            }))
        }
        "message_stop" => Ok(Some(StreamChunk {
            finish_reason: Some(FinishReason::Stop),
            ..Default::default()
        })),
        "ping" | "content_block_start" | "content_block_stop" | "message_start" => Ok(None),
        "error" => {
            let message = value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("unknown stream error");
            Err(GatewayError::StreamParseError(message.to_string()))
        }
        other => Err(GatewayError::StreamParseError(format!("unrecognized SSE event: {other}"))),
    }
}

fn anthropic_finish_reason(raw: &str) -> Option<FinishReason> {
    match raw {
        "end_turn" | "stop_sequence" => Some(FinishReason::Stop),
        "max_tokens" => Some(FinishReason::Length),
        "tool_use" => Some(FinishReason::ToolUse),
        _ => Some(FinishReason::Error),
    }
}

/// Provider-native newline-delimited JSON (Ollama's `/api/chat` stream):
/// one JSON object per line, a `"done": true` field terminates the stream.
pub fn ndjson_chunk(line: &str) -> Result<Option<StreamChunk>, GatewayError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(trimmed)?;
    let content = value
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let done = value.get("done").and_then(Value::as_bool).unwrap_or(false);
    let usage = if done {
        let input = value.get("prompt_eval_count").and_then(Value::as_u64).unwrap_or(0) as u32;
        let output = value.get("eval_count").and_then(Value::as_u64).unwrap_or(0) as u32;
        Some(Usage::new(input, output))
    } else {
        None
    };
    Ok(Some(StreamChunk {
        content,
        finish_reason: if done { Some(FinishReason::Stop) } else { None },
        usage,
        ..Default::default()
    }))
}

/// Drives a raw byte stream line-by-line through [`ndjson_chunk`] (or any
/// other per-line parser). Ollama's `/api/chat` response has no SSE framing
/// at all, just one JSON object per `\n`-terminated line, so the buffering
/// concern here is "wait for a full line" rather than "wait for a blank-line
/// frame terminator" — hence a separate driver from [`crate::stream::sse::drive_sse_stream`]
/// rather than reusing the SSE decoder for a format that isn't SSE.
pub fn drive_ndjson_stream<S, F>(
    mut bytes: S,
    mut parse: F,
) -> futures::stream::BoxStream<'static, Result<StreamChunk, GatewayError>>
where
    S: futures::Stream<Item = Result<bytes::Bytes, GatewayError>> + Send + Unpin + 'static,
    F: FnMut(&str) -> Result<Option<StreamChunk>, GatewayError> + Send + 'static,
{
    use futures::StreamExt;

    let state = (String::new(), std::collections::VecDeque::new(), false);

    futures::stream::unfold((bytes, state, parse), move |(mut bytes, mut state, mut parse)| async move {
        loop {
            let (buffer, queue, finished) = &mut state;
            if let Some(item) = queue.pop_front() {
                return Some((item, (bytes, state, parse)));
            }
            if *finished {
                return None;
            }

            match bytes.next().await {
                Some(Ok(chunk)) => {
                    buffer.push_str(&String::from_utf8_lossy(&chunk));
                    while let Some(idx) = buffer.find('\n') {
                        let line: String = buffer.drain(..=idx).collect();
                        match parse(line.trim_end_matches(['\n', '\r'])) {
                            Ok(Some(c)) => queue.push_back(Ok(c)),
                            Ok(None) => {}
                            Err(e) => queue.push_back(Err(e)),
                        }
                    }
                }
                Some(Err(e)) => {
                    *finished = true;
                    queue.push_back(Err(e));
                }
                None => {
                    *finished = true;
                    if !buffer.trim().is_empty() {
                        match parse(buffer.as_str()) {
                            Ok(Some(c)) => queue.push_back(Ok(c)),
                            Ok(None) => {}
                            Err(e) => queue.push_back(Err(e)),
                        }
                    }
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_done_marker_ends_stream() {
        assert!(openai_chunk("[DONE]").unwrap().is_none());
    }

    #[test]
    fn openai_delta_content_is_extracted() {
        let chunk = openai_chunk(r#"{"choices":[{"delta":{"content":"hi"}}]}"#).unwrap().unwrap();
        assert_eq!(chunk.content.as_deref(), Some("hi"));
    }

    #[test]
    fn openai_finish_reason_maps_tool_calls() {
        let chunk = openai_chunk(r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(chunk.finish_reason, Some(FinishReason::ToolUse));
    }

    #[test]
    fn anthropic_text_delta_is_extracted() {
        let chunk = anthropic_chunk(Some("content_block_delta"), r#"{"delta":{"text":"hi"}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(chunk.content.as_deref(), Some("hi"));
    }

    #[test]
    fn anthropic_message_stop_is_terminal() {
        let chunk = anthropic_chunk(Some("message_stop"), "{}").unwrap().unwrap();
        assert!(chunk.is_terminal());
    }

    #[test]
    fn anthropic_unknown_event_errors() {
        assert!(anthropic_chunk(Some("bogus"), "{}").is_err());
    }

    #[test]
    fn ndjson_done_line_carries_usage() {
        let chunk = ndjson_chunk(r#"{"done":true,"prompt_eval_count":5,"eval_count":7}"#)
            .unwrap()
            .unwrap();
        assert!(chunk.is_terminal());
        assert_eq!(chunk.usage.unwrap().output_tokens, 7);
    }

    #[tokio::test]
    async fn drive_ndjson_stream_splits_lines_across_chunks() {
        use futures::StreamExt;

        let raw = [
            bytes::Bytes::from_static(b"{\"message\":{\"content\":\"hi\"},\"done\":fal"),
            bytes::Bytes::from_static(b"se}\n{\"done\":true,\"eval_count\":3}\n"),
        ];
        let source = futures::stream::iter(raw.into_iter().map(Ok::<_, GatewayError>));

        let chunks: Vec<_> = drive_ndjson_stream(source, ndjson_chunk).collect().await;

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].as_ref().unwrap().content.as_deref(), Some("hi"));
        assert!(chunks[1].as_ref().unwrap().is_terminal());
    }
}
