//! Canonical function/tool schema shared by every provider dialect.

use schemars::JsonSchema;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// A function the model may call, described as name + JSON-Schema parameters.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FunctionSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Value,
}

/// A tool entry as presented to the facade; `tool_type` is currently always
/// `"function"` but kept as a field rather than hardcoded so a future tool
/// kind doesn't require a breaking enum change.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionSchema,
}

impl Tool {
    pub fn function(schema: FunctionSchema) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: schema,
        }
    }
}

/// How the model is allowed to use the tools offered to it.
#[derive(Debug, Clone, Default)]
pub enum ToolChoice {
    /// Must call at least one tool.
    Any,
    /// May call zero or more tools; the default.
    #[default]
    Auto,
    /// Must call exactly the named tool.
    Named(String),
    /// May not call any tool.
    None,
}

impl Serialize for ToolChoice {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            ToolChoice::Any => serializer.serialize_str("required"),
            ToolChoice::Auto => serializer.serialize_str("auto"),
            ToolChoice::None => serializer.serialize_str("none"),
            ToolChoice::Named(name) => {
                use serde::ser::SerializeMap;
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "function")?;
                let mut function_obj = std::collections::HashMap::new();
                function_obj.insert("name", name.as_str());
                map.serialize_entry("function", &function_obj)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for ToolChoice {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ToolChoiceVisitor;

        impl<'de> Visitor<'de> for ToolChoiceVisitor {
            type Value = ToolChoice;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str(
                    "a string (`required`, `auto`, `none`) or an object `{ type: \"function\", function: { name: ... } }`",
                )
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                match value {
                    "required" => Ok(ToolChoice::Any),
                    "auto" => Ok(ToolChoice::Auto),
                    "none" => Ok(ToolChoice::None),
                    other => Err(de::Error::unknown_variant(
                        other,
                        &["required", "auto", "none"],
                    )),
                }
            }

            fn visit_map<M>(self, mut map: M) -> Result<Self::Value, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut seen_name: Option<String> = None;
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "type" => {
                            let t: String = map.next_value()?;
                            if t != "function" {
                                return Err(de::Error::invalid_value(
                                    de::Unexpected::Str(&t),
                                    &"function",
                                ));
                            }
                        }
                        "function" => {
                            let func_map: serde_json::Map<String, Value> = map.next_value()?;
                            if let Some(Value::String(name)) = func_map.get("name") {
                                seen_name = Some(name.clone());
                            } else {
                                return Err(de::Error::missing_field("name"));
                            }
                        }
                        _ => {
                            let _ignored: Value = map.next_value()?;
                        }
                    }
                }
                let name = seen_name.ok_or_else(|| de::Error::missing_field("function"))?;
                Ok(ToolChoice::Named(name))
            }
        }

        deserializer.deserialize_any(ToolChoiceVisitor)
    }
}

/// A function call the model requested, as surfaced on [`crate::response::LLMResponse`]
/// and [`crate::response::StreamChunk`]. `arguments` is kept as the raw JSON-encoded
/// string each wire dialect actually sends; use [`ToolCall::parsed_arguments`] to
/// get a [`Value`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCallPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionCallPayload {
    pub name: String,
    pub arguments: String,
}

impl ToolCall {
    pub fn parsed_arguments(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.function.arguments)
    }
}

/// The normalized shape the function-calling normalizer hands to
/// `execute_function`: arguments already parsed to JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: Value,
}

impl TryFrom<&ToolCall> for FunctionCall {
    type Error = serde_json::Error;

    fn try_from(call: &ToolCall) -> Result<Self, Self::Error> {
        Ok(FunctionCall {
            name: call.function.name.clone(),
            arguments: call.parsed_arguments()?,
        })
    }
}
