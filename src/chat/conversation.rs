// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Message types for the conversation tree
//!
//! A `Conversation` is one concrete message: role, text content, typed
//! attachments, and optional tool-call / tool-response payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ConversationConfig;

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message
    User,
    /// Assistant response
    Assistant,
    /// Materialized tool result
    Tool,
    /// System prompt
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
            Role::System => write!(f, "system"),
        }
    }
}

/// A typed binary attachment (image, file) carried by a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedData {
    /// Display name of the attachment
    pub file_name: String,
    /// MIME type, e.g. "image/png" or "text/plain"
    pub mime_type: String,
    /// Raw payload, serialized as base64
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl TypedData {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn png(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self::new(file_name, "image/png", data)
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn is_text(&self) -> bool {
        self.mime_type.starts_with("text/")
    }

    /// File extension guessed from the MIME subtype
    pub fn extension(&self) -> &str {
        self.mime_type.rsplit('/').next().unwrap_or("bin")
    }
}

/// A provider-requested tool invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Backend-assigned call identifier (may be empty for backends without one)
    pub call_id: String,
    /// Name of the requested tool
    pub tool: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

impl ToolCall {
    pub fn new(
        call_id: impl Into<String>,
        tool: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool: tool.into(),
            arguments: arguments.into(),
        }
    }
}

/// The materialized outcome of one tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResponse {
    /// Identifier of the originating call
    pub call_id: String,
    /// Name of the tool that ran
    pub tool: String,
    /// Text result (or error text)
    pub content: String,
    /// Binary payloads produced by the tool
    pub data: Vec<TypedData>,
    /// Whether the call failed
    pub is_error: bool,
}

impl ToolResponse {
    /// An empty response shell created before the tool runs
    pub fn pending(call: &ToolCall) -> Self {
        Self {
            call_id: call.call_id.clone(),
            tool: call.tool.clone(),
            content: String::new(),
            data: Vec::new(),
            is_error: false,
        }
    }
}

/// One concrete message in the conversation tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique identifier
    pub id: Uuid,

    /// Role of the sender
    pub role: Role,

    /// Text content
    pub content: String,

    /// Typed attachments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<TypedData>,

    /// Tool calls requested by this (assistant) message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Tool response carried by this (tool) message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_response: Option<ToolResponse>,

    /// True while a generation is streaming into this message
    #[serde(default)]
    pub is_replying: bool,

    /// Creation timestamp
    pub date: DateTime<Utc>,
}

impl Conversation {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            attachments: Vec::new(),
            tool_calls: Vec::new(),
            tool_response: None,
            is_replying: false,
            date: Utc::now(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a user message with attachments
    pub fn user_with_attachments(content: impl Into<String>, attachments: Vec<TypedData>) -> Self {
        let mut conversation = Self::new(Role::User, content);
        conversation.attachments = attachments;
        conversation
    }

    /// Create a completed assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create an empty assistant message awaiting a streamed reply
    pub fn assistant_placeholder() -> Self {
        let mut conversation = Self::new(Role::Assistant, "");
        conversation.is_replying = true;
        conversation
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a tool-role message holding a (possibly pending) tool response
    pub fn tool_result(response: ToolResponse) -> Self {
        let mut conversation = Self::new(Role::Tool, "");
        conversation.is_replying = true;
        conversation.tool_response = Some(response);
        conversation
    }

    /// Whether this message requested any tool calls
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Deep copy with a fresh identity
    pub fn copy_deep(&self) -> Self {
        let mut copy = self.clone();
        copy.id = Uuid::new_v4();
        copy
    }

    /// Estimate token count for this message.
    ///
    /// Uses the configurable chars-per-token heuristic; attachments count
    /// a flat per-image estimate, tool payloads count their text.
    pub fn estimate_tokens(&self, config: &ConversationConfig) -> usize {
        let mut chars = self.content.len();
        if let Some(response) = &self.tool_response {
            chars += response.content.len();
        }
        for call in &self.tool_calls {
            chars += call.tool.len() + call.arguments.len();
        }

        let chars_per_token = config.chars_per_token.max(1) as usize;
        let mut tokens = (chars + config.message_overhead_tokens as usize) / chars_per_token;

        for attachment in &self.attachments {
            if attachment.is_image() {
                tokens += config.image_token_estimate as usize;
            } else {
                tokens += attachment.data.len() / chars_per_token;
            }
        }

        tokens
    }
}

/// Base64 (de)serialization for binary attachment payloads
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_user() {
        let conversation = Conversation::user("Hello");
        assert_eq!(conversation.role, Role::User);
        assert_eq!(conversation.content, "Hello");
        assert!(!conversation.is_replying);
        assert!(conversation.attachments.is_empty());
    }

    #[test]
    fn test_assistant_placeholder_is_replying() {
        let conversation = Conversation::assistant_placeholder();
        assert_eq!(conversation.role, Role::Assistant);
        assert!(conversation.content.is_empty());
        assert!(conversation.is_replying);
    }

    #[test]
    fn test_tool_result_carries_response() {
        let call = ToolCall::new("call_1", "fetch_url", r#"{"url":"https://example.com"}"#);
        let conversation = Conversation::tool_result(ToolResponse::pending(&call));

        assert_eq!(conversation.role, Role::Tool);
        let response = conversation.tool_response.as_ref().unwrap();
        assert_eq!(response.call_id, "call_1");
        assert_eq!(response.tool, "fetch_url");
        assert!(response.content.is_empty());
        assert!(conversation.is_replying);
    }

    #[test]
    fn test_copy_deep_fresh_id() {
        let original = Conversation::user("fork me");
        let copy = original.copy_deep();
        assert_ne!(original.id, copy.id);
        assert_eq!(original.content, copy.content);
        assert_eq!(original.role, copy.role);
    }

    #[test]
    fn test_has_tool_calls() {
        let mut conversation = Conversation::assistant("checking");
        assert!(!conversation.has_tool_calls());
        conversation.tool_calls.push(ToolCall::new("c1", "fetch_url", "{}"));
        assert!(conversation.has_tool_calls());
    }

    #[test]
    fn test_typed_data_kinds() {
        let image = TypedData::png("chart.png", vec![1, 2, 3]);
        assert!(image.is_image());
        assert!(!image.is_text());
        assert_eq!(image.extension(), "png");

        let text = TypedData::new("notes.txt", "text/plain", b"hi".to_vec());
        assert!(text.is_text());
        assert_eq!(text.extension(), "plain");
    }

    #[test]
    fn test_attachment_base64_roundtrip() {
        let conversation =
            Conversation::user_with_attachments("see image", vec![TypedData::png("a.png", vec![0, 255, 128])]);

        let json = serde_json::to_string(&conversation).unwrap();
        assert!(json.contains("AP+A")); // base64 of [0, 255, 128]

        let parsed: Conversation = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.attachments[0].data, vec![0, 255, 128]);
    }

    #[test]
    fn test_estimate_tokens_text() {
        let config = ConversationConfig::default();
        let conversation = Conversation::user("a".repeat(1000));
        let tokens = conversation.estimate_tokens(&config);
        // 1000 chars + 20 overhead, /4
        assert_eq!(tokens, 255);
    }

    #[test]
    fn test_estimate_tokens_image_flat_cost() {
        let config = ConversationConfig::default();
        let plain = Conversation::user("hi");
        let with_image = Conversation::user_with_attachments(
            "hi",
            vec![TypedData::png("big.png", vec![0; 100_000])],
        );

        assert_eq!(
            with_image.estimate_tokens(&config),
            plain.estimate_tokens(&config) + config.image_token_estimate as usize
        );
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert_eq!(Role::Tool.to_string(), "tool");
        assert_eq!(Role::System.to_string(), "system");
    }
}
