// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Anthropic messages adapter
//!
//! Speaks the messages API. Streaming responses arrive as SSE
//! `event:`/`data:` pairs; text deltas surface immediately while tool_use
//! blocks accumulate their JSON fragments and surface as one normalized
//! event when the message stops.

use async_stream::try_stream;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{attachment_stand_in, collapse_body, endpoint};
use crate::catalog::{AiModel, ProviderKind, ProviderRecord};
use crate::chat::{Conversation, Role, SessionConfig, ToolCall};
use crate::error::{BanterError, ProviderError, Result};
use crate::llm::adapter::{
    EventStream, ProviderAdapter, ResponseEvent, ResponseOutcome, ToolSpec, TEST_PROMPT,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic messages adapter
pub struct AnthropicAdapter {
    client: Client,
    host: String,
    api_key: String,
}

impl AnthropicAdapter {
    pub fn new(api_key: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            host: host.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_record(record: &ProviderRecord) -> Self {
        Self::new(record.api_key.clone(), record.host.clone())
    }

    /// Map a canonical conversation onto the messages wire shape.
    ///
    /// Tool results ride as user-role tool_result blocks; assistant tool
    /// calls become tool_use blocks with their arguments re-parsed.
    fn convert(&self, conversation: &Conversation) -> WireMessage {
        if conversation.role == Role::Tool {
            let response = conversation.tool_response.as_ref();
            return WireMessage {
                role: "user",
                content: vec![WireBlock::ToolResult {
                    tool_use_id: response.map(|r| r.call_id.clone()).unwrap_or_default(),
                    content: response.map(|r| r.content.clone()).unwrap_or_default(),
                    is_error: response.filter(|r| r.is_error).map(|_| true),
                }],
            };
        }

        let role = match conversation.role {
            Role::Assistant => "assistant",
            _ => "user",
        };

        let mut blocks = Vec::new();
        for attachment in &conversation.attachments {
            if attachment.is_image() {
                blocks.push(WireBlock::Image {
                    source: ImageSource {
                        source_type: "base64".to_string(),
                        media_type: attachment.mime_type.clone(),
                        data: BASE64.encode(&attachment.data),
                    },
                });
            } else if attachment.is_text() {
                blocks.push(WireBlock::Text {
                    text: String::from_utf8_lossy(&attachment.data).into_owned(),
                });
            } else {
                blocks.push(WireBlock::Text {
                    text: attachment_stand_in(attachment),
                });
            }
        }

        if !conversation.content.is_empty() || blocks.is_empty() {
            blocks.push(WireBlock::Text {
                text: conversation.content.clone(),
            });
        }

        for call in &conversation.tool_calls {
            blocks.push(WireBlock::ToolUse {
                id: call.call_id.clone(),
                name: call.tool.clone(),
                input: serde_json::from_str(&call.arguments)
                    .unwrap_or_else(|_| Value::Object(Default::default())),
            });
        }

        WireMessage {
            role,
            content: blocks,
        }
    }

    fn build_request(
        &self,
        messages: &[Conversation],
        config: &SessionConfig,
        tools: &[ToolSpec],
        stream: bool,
    ) -> MessagesRequest {
        MessagesRequest {
            model: config.model.code.clone(),
            messages: messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(|m| self.convert(m))
                .collect(),
            system: if config.system_prompt.is_empty() {
                None
            } else {
                Some(config.system_prompt.clone())
            },
            max_tokens: config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: config.temperature,
            top_p: config.top_p,
            tools: if tools.is_empty() {
                None
            } else {
                Some(
                    tools
                        .iter()
                        .map(|t| WireTool {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            input_schema: t.parameters.clone(),
                        })
                        .collect(),
                )
            },
            stream,
        }
    }

    async fn post_messages(&self, body: &MessagesRequest) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(endpoint(&self.host, "v1/messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(parse_error(status, &body));
        }
        Ok(response)
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn stream_response(
        &self,
        messages: &[Conversation],
        config: &SessionConfig,
        tools: &[ToolSpec],
    ) -> Result<EventStream> {
        let body = self.build_request(messages, config, tools, true);
        let response = self.post_messages(&body).await?;

        let stream = try_stream! {
            let mut bytes = response.bytes_stream();
            let mut buffer = String::new();
            let mut tool_blocks: Vec<PartialToolUse> = Vec::new();

            'outer: while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(|e| {
                    BanterError::Provider(ProviderError::Stream(e.to_string()))
                })?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = buffer.find("\n\n") {
                    let event_str = buffer[..pos].to_string();
                    buffer.drain(..pos + 2);

                    match parse_sse_event(&event_str) {
                        Some(SseEvent::TextDelta(text)) => {
                            if !text.is_empty() {
                                yield ResponseEvent::ContentDelta(text);
                            }
                        }
                        Some(SseEvent::ToolUseStart { index, id, name }) => {
                            if tool_blocks.len() <= index {
                                tool_blocks.resize_with(index + 1, PartialToolUse::default);
                            }
                            tool_blocks[index].id = id;
                            tool_blocks[index].name = name;
                        }
                        Some(SseEvent::InputJsonDelta { index, partial_json }) => {
                            if let Some(block) = tool_blocks.get_mut(index) {
                                block.arguments.push_str(&partial_json);
                            }
                        }
                        Some(SseEvent::MessageStop) => break 'outer,
                        Some(SseEvent::Error { error_type, message }) => {
                            Err(BanterError::Provider(ProviderError::Stream(format!(
                                "{}: {}",
                                error_type, message
                            ))))?;
                        }
                        None => {}
                    }
                }
            }

            let calls = finish_tool_blocks(tool_blocks);
            if !calls.is_empty() {
                yield ResponseEvent::ToolCallsRequested(calls);
            }
        };

        Ok(Box::pin(stream))
    }

    async fn non_streaming_response(
        &self,
        messages: &[Conversation],
        config: &SessionConfig,
        tools: &[ToolSpec],
    ) -> Result<ResponseOutcome> {
        let body = self.build_request(messages, config, tools, false);
        let response = self.post_messages(&body).await?;
        let parsed: MessagesResponse = response.json().await?;

        let mut text = String::new();
        let mut calls = Vec::new();
        for block in parsed.content {
            match block {
                RespBlock::Text { text: t } => text.push_str(&t),
                RespBlock::ToolUse { id, name, input } => {
                    calls.push(ToolCall::new(id, name, input.to_string()));
                }
            }
        }

        if calls.is_empty() {
            Ok(ResponseOutcome::Content(text))
        } else {
            Ok(ResponseOutcome::ToolCallsRequested(calls))
        }
    }

    async fn refresh_models(&self) -> Vec<AiModel> {
        let result = async {
            let response = self
                .client
                .get(endpoint(&self.host, "v1/models"))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .send()
                .await?
                .error_for_status()?;
            let parsed: ModelsResponse = response.json().await?;
            Ok::<_, reqwest::Error>(parsed)
        }
        .await;

        match result {
            Ok(parsed) => parsed
                .data
                .into_iter()
                .map(|m| {
                    let name = m.display_name.unwrap_or_else(|| m.id.clone());
                    AiModel::chat(m.id, name)
                })
                .collect(),
            Err(e) => {
                tracing::debug!("model refresh failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn test_model(&self, model: &AiModel) -> bool {
        let mut config = SessionConfig::new(ProviderRecord::factory(ProviderKind::Anthropic));
        config.model = model.clone();
        let probe = [Conversation::user(TEST_PROMPT)];

        matches!(
            self.non_streaming_response(&probe, &config, &[]).await,
            Ok(ResponseOutcome::Content(text)) if !text.is_empty()
        )
    }
}

/// One normalized Anthropic SSE event
enum SseEvent {
    TextDelta(String),
    ToolUseStart {
        index: usize,
        id: String,
        name: String,
    },
    InputJsonDelta {
        index: usize,
        partial_json: String,
    },
    MessageStop,
    Error {
        error_type: String,
        message: String,
    },
}

fn parse_sse_event(event_str: &str) -> Option<SseEvent> {
    let mut event_type = None;
    let mut data = None;

    for line in event_str.lines() {
        if let Some(rest) = line.strip_prefix("event: ") {
            event_type = Some(rest.to_string());
        } else if let Some(rest) = line.strip_prefix("data: ") {
            data = Some(rest.to_string());
        }
    }

    let event_type = event_type?;
    let data = data?;

    match event_type.as_str() {
        "content_block_start" => {
            let parsed: Value = serde_json::from_str(&data).ok()?;
            let index = parsed["index"].as_u64()? as usize;
            let block = &parsed["content_block"];
            if block["type"].as_str()? == "tool_use" {
                Some(SseEvent::ToolUseStart {
                    index,
                    id: block["id"].as_str().unwrap_or("").to_string(),
                    name: block["name"].as_str()?.to_string(),
                })
            } else {
                None
            }
        }
        "content_block_delta" => {
            let parsed: Value = serde_json::from_str(&data).ok()?;
            let index = parsed["index"].as_u64()? as usize;
            let delta = &parsed["delta"];
            match delta["type"].as_str()? {
                "text_delta" => Some(SseEvent::TextDelta(delta["text"].as_str()?.to_string())),
                "input_json_delta" => Some(SseEvent::InputJsonDelta {
                    index,
                    partial_json: delta["partial_json"].as_str()?.to_string(),
                }),
                _ => None,
            }
        }
        "message_stop" => Some(SseEvent::MessageStop),
        "error" => {
            let parsed: Value = serde_json::from_str(&data).ok()?;
            Some(SseEvent::Error {
                error_type: parsed["error"]["type"].as_str()?.to_string(),
                message: parsed["error"]["message"].as_str()?.to_string(),
            })
        }
        _ => None,
    }
}

#[derive(Debug, Default)]
struct PartialToolUse {
    id: String,
    name: String,
    arguments: String,
}

fn finish_tool_blocks(blocks: Vec<PartialToolUse>) -> Vec<ToolCall> {
    blocks
        .into_iter()
        .filter(|b| !b.name.is_empty())
        .map(|b| {
            let arguments = if b.arguments.is_empty() {
                "{}".to_string()
            } else {
                b.arguments
            };
            ToolCall::new(b.id, b.name, arguments)
        })
        .collect()
}

fn parse_error(status: u16, body: &str) -> BanterError {
    if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(body) {
        let provider_error = match parsed.error.error_type.as_str() {
            "authentication_error" => ProviderError::AuthenticationFailed,
            "rate_limit_error" => ProviderError::RateLimited(10),
            "not_found_error" => ProviderError::ModelNotFound(parsed.error.message),
            _ => ProviderError::ServerError {
                status,
                message: parsed.error.message,
            },
        };
        BanterError::Provider(provider_error)
    } else {
        BanterError::Provider(ProviderError::ServerError {
            status,
            message: collapse_body(body),
        })
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Vec<WireBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock {
    Text {
        text: String,
    },
    Image {
        source: ImageSource,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    source_type: String,
    media_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<RespBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RespBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ToolResponse, TypedData};

    fn adapter() -> AnthropicAdapter {
        AnthropicAdapter::new("sk-ant-test", "https://api.anthropic.com")
    }

    fn config() -> SessionConfig {
        SessionConfig::new(ProviderRecord::factory(ProviderKind::Anthropic))
    }

    #[test]
    fn test_convert_tool_result_rides_as_user_block() {
        let call = ToolCall::new("toolu_1", "fetch_url", "{}");
        let mut response = ToolResponse::pending(&call);
        response.content = "result text".to_string();
        response.is_error = true;

        let wire = adapter().convert(&Conversation::tool_result(response));
        assert_eq!(wire.role, "user");
        match &wire.content[0] {
            WireBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                assert_eq!(tool_use_id, "toolu_1");
                assert_eq!(content, "result text");
                assert_eq!(*is_error, Some(true));
            }
            other => panic!("expected tool_result block, got {:?}", other),
        }
    }

    #[test]
    fn test_convert_assistant_tool_calls_become_tool_use() {
        let mut conversation = Conversation::assistant("checking");
        conversation
            .tool_calls
            .push(ToolCall::new("toolu_2", "fetch_url", r#"{"url":"x"}"#));

        let wire = adapter().convert(&conversation);
        assert_eq!(wire.role, "assistant");
        assert_eq!(wire.content.len(), 2);
        match &wire.content[1] {
            WireBlock::ToolUse { id, name, input } => {
                assert_eq!(id, "toolu_2");
                assert_eq!(name, "fetch_url");
                assert_eq!(input["url"], "x");
            }
            other => panic!("expected tool_use block, got {:?}", other),
        }
    }

    #[test]
    fn test_convert_image_attachment() {
        let conversation = Conversation::user_with_attachments(
            "describe",
            vec![TypedData::png("p.png", vec![9, 9])],
        );
        let wire = adapter().convert(&conversation);

        match &wire.content[0] {
            WireBlock::Image { source } => {
                assert_eq!(source.source_type, "base64");
                assert_eq!(source.media_type, "image/png");
            }
            other => panic!("expected image block, got {:?}", other),
        }
    }

    #[test]
    fn test_build_request_filters_system_role_and_sets_top_level() {
        let config = config().with_system_prompt("Be brief.");
        let messages = [Conversation::system("ignored"), Conversation::user("hi")];
        let request = adapter().build_request(&messages, &config, &[], false);

        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.system, Some("Be brief.".to_string()));
        assert_eq!(request.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_parse_sse_text_delta() {
        let event = "event: content_block_delta\ndata: {\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}";
        match parse_sse_event(event) {
            Some(SseEvent::TextDelta(text)) => assert_eq!(text, "Hi"),
            _ => panic!("expected text delta"),
        }
    }

    #[test]
    fn test_parse_sse_tool_use_start() {
        let event = "event: content_block_start\ndata: {\"index\":1,\"content_block\":{\"type\":\"tool_use\",\"id\":\"toolu_1\",\"name\":\"fetch_url\"}}";
        match parse_sse_event(event) {
            Some(SseEvent::ToolUseStart { index, id, name }) => {
                assert_eq!(index, 1);
                assert_eq!(id, "toolu_1");
                assert_eq!(name, "fetch_url");
            }
            _ => panic!("expected tool_use start"),
        }
    }

    #[test]
    fn test_parse_sse_ignores_ping() {
        let event = "event: ping\ndata: {}";
        assert!(parse_sse_event(event).is_none());
    }

    #[test]
    fn test_finish_tool_blocks_defaults_empty_arguments() {
        let blocks = vec![PartialToolUse {
            id: "toolu_1".to_string(),
            name: "fetch_url".to_string(),
            arguments: String::new(),
        }];
        let calls = finish_tool_blocks(blocks);
        assert_eq!(calls[0].arguments, "{}");
    }

    #[test]
    fn test_parse_error_authentication() {
        let err = parse_error(
            401,
            r#"{"error":{"type":"authentication_error","message":"bad key"}}"#,
        );
        assert!(matches!(
            err,
            BanterError::Provider(ProviderError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_parse_error_non_json_body() {
        let err = parse_error(502, "<html>bad gateway</html>");
        match err {
            BanterError::Provider(ProviderError::ServerError { status, message }) => {
                assert_eq!(status, 502);
                assert!(message.contains("bad gateway"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
