//! Translates the canonical tool/function schema across provider dialects.
//!
//! Each provider adapter already performs the wire-level translation inside
//! its own `chat_request`/`parse_chat` (that's the per-provider dialect,
//! explicitly out of scope for this crate to specify bit-exact). What lives
//! here is the *shared* half of that work: the canonical schema types
//! ([`Tool`], [`ToolChoice`], [`ToolCall`], [`FunctionCall`]) and the small
//! set of pure `to_dialect` projections that more than one provider crate
//! can reuse instead of hand-rolling their own JSON shaping.

pub mod registry;
pub mod schema;

pub use registry::{format_result, FunctionHandler, FunctionRegistry, FunctionResult, ResultDialect};
pub use schema::{FunctionCall, FunctionCallPayload, FunctionSchema, Tool, ToolCall, ToolChoice};

use serde_json::{json, Value};

/// Shapes tools into the OpenAI-style `tools` array:
/// `[{"type": "function", "function": {"name", "description", "parameters"}}]`.
pub fn to_openai_tools(tools: &[Tool]) -> Value {
    json!(tools
        .iter()
        .map(|t| json!({
            "type": "function",
            "function": {
                "name": t.function.name,
                "description": t.function.description,
                "parameters": t.function.parameters,
            }
        }))
        .collect::<Vec<_>>())
}

/// Shapes tools into the Anthropic-style `tools` array, which keys the
/// parameter schema as `input_schema` rather than nesting under `function`.
pub fn to_anthropic_tools(tools: &[Tool]) -> Value {
    json!(tools
        .iter()
        .map(|t| json!({
            "name": t.function.name,
            "description": t.function.description,
            "input_schema": t.function.parameters,
        }))
        .collect::<Vec<_>>())
}

/// Shapes tools into Gemini's `functionDeclarations` array.
pub fn to_gemini_function_declarations(tools: &[Tool]) -> Value {
    json!({
        "functionDeclarations": tools
            .iter()
            .map(|t| json!({
                "name": t.function.name,
                "description": t.function.description,
                "parameters": t.function.parameters,
            }))
            .collect::<Vec<_>>()
    })
}

/// Converts every tool call on a response/chunk into its normalized
/// [`FunctionCall`] form, dropping (not erroring on) any whose arguments
/// fail to parse as JSON — a malformed single tool call shouldn't sink the
/// whole batch.
pub fn from_provider(tool_calls: &[ToolCall]) -> Vec<FunctionCall> {
    tool_calls
        .iter()
        .filter_map(|call| FunctionCall::try_from(call).ok())
        .collect()
}
