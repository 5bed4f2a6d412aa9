//! The provider-agnostic conversation model threaded through the pipeline.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Who authored a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
    Developer,
}

/// A detail hint for image content, mirroring the OpenAI-style vision knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    Low,
    High,
    Auto,
}

/// The source of inline or referenced binary content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MediaSource {
    Url(String),
    Data {
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
        media_type: String,
    },
}

/// One tagged piece of message content.
///
/// A message always carries at least one part (enforced by [`Message::new`]
/// and [`Message::validate`]); a plain string message is a single `Text`
/// part, which is how most provider dialects and most gateway callers
/// actually use this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image { source: MediaSource, detail: Option<ImageDetail> },
    Audio { data: String, format: String },
    File { reference: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(text),
            _ => None,
        }
    }
}

mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        base64::engine::general_purpose::STANDARD
            .decode(s.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// A single conversation turn.
///
/// Invariants (checked by [`Message::validate`], not by construction): at
/// least one content part; a `Tool` role message carries `tool_call_id`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool calls this (assistant) message requested. Used to keep a
    /// `tool_call` / `tool_response` pair together when the context manager
    /// truncates history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MessageValidationError {
    #[error("message has no content parts")]
    EmptyContent,
    #[error("tool-role message is missing tool_call_id")]
    MissingToolCallId,
}

impl Message {
    pub fn new(role: Role, content: Vec<ContentPart>) -> Self {
        Self {
            role,
            content,
            name: None,
            tool_call_id: None,
            tool_call_ids: None,
            timestamp: None,
        }
    }

    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self::new(role, vec![ContentPart::text(text)])
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::text(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(Role::Assistant, text)
    }

    pub fn tool(tool_call_id: impl Into<String>, text: impl Into<String>) -> Self {
        let mut m = Self::text(Role::Tool, text);
        m.tool_call_id = Some(tool_call_id.into());
        m
    }

    /// Concatenates all text parts, ignoring non-text content.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentPart::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn validate(&self) -> Result<(), MessageValidationError> {
        if self.content.is_empty() {
            return Err(MessageValidationError::EmptyContent);
        }
        if self.role == Role::Tool && self.tool_call_id.is_none() {
            return Err(MessageValidationError::MissingToolCallId);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_content_fails_validation() {
        let m = Message::new(Role::User, vec![]);
        assert_eq!(m.validate(), Err(MessageValidationError::EmptyContent));
    }

    #[test]
    fn tool_message_without_call_id_fails_validation() {
        let m = Message::text(Role::Tool, "result");
        assert_eq!(
            m.validate(),
            Err(MessageValidationError::MissingToolCallId)
        );
    }

    #[test]
    fn tool_message_with_call_id_is_valid() {
        let m = Message::tool("call_1", "result");
        assert!(m.validate().is_ok());
    }

    #[test]
    fn text_content_concatenates_text_parts_only() {
        let mut m = Message::user("hello");
        m.content.push(ContentPart::Audio {
            data: "abc".into(),
            format: "wav".into(),
        });
        m.content.push(ContentPart::text(" world"));
        assert_eq!(m.text_content(), "hello world");
    }
}
