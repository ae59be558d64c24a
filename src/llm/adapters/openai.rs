// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! OpenAI chat-completions adapter
//!
//! Speaks the chat-completions wire format, which OpenAI-compatible
//! servers also accept. Streaming uses `data:`-prefixed SSE lines with a
//! `[DONE]` terminator; tool-call argument fragments are merged by choice
//! index before being surfaced as one normalized event.

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
use crate::chat::{Conversation, Role, SessionConfig, ToolCall, TypedData};
use crate::error::{BanterError, ProviderError, Result};
use crate::llm::adapter::{
    EventStream, ProviderAdapter, ResponseEvent, ResponseOutcome, ToolSpec, TEST_PROMPT,
};

/// OpenAI chat-completions adapter
pub struct OpenAiAdapter {
    client: Client,
    host: String,
    api_key: String,
}

impl OpenAiAdapter {
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

    /// Map a canonical conversation onto the wire message shape
    fn convert(&self, conversation: &Conversation) -> WireMessage {
        let role = match conversation.role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
            Role::System => "system",
        };

        if conversation.role == Role::Tool {
            let response = conversation.tool_response.as_ref();
            return WireMessage {
                role,
                content: WireContent::Text(
                    response.map(|r| r.content.clone()).unwrap_or_default(),
                ),
                tool_call_id: response.map(|r| r.call_id.clone()),
                tool_calls: None,
            };
        }

        let tool_calls = if conversation.tool_calls.is_empty() {
            None
        } else {
            Some(
                conversation
                    .tool_calls
                    .iter()
                    .map(|c| WireToolCall {
                        id: c.call_id.clone(),
                        kind: "function".to_string(),
                        function: WireFunction {
                            name: c.tool.clone(),
                            arguments: c.arguments.clone(),
                        },
                    })
                    .collect(),
            )
        };

        let content = if conversation.attachments.is_empty() {
            WireContent::Text(conversation.content.clone())
        } else {
            let mut parts = Vec::new();
            for attachment in &conversation.attachments {
                parts.push(convert_attachment(attachment));
            }
            parts.push(WirePart::Text {
                text: conversation.content.clone(),
            });
            WireContent::Parts(parts)
        };

        WireMessage {
            role,
            content,
            tool_call_id: None,
            tool_calls,
        }
    }

    fn build_request(
        &self,
        messages: &[Conversation],
        config: &SessionConfig,
        tools: &[ToolSpec],
        stream: bool,
    ) -> ChatRequest {
        let mut wire_messages = Vec::with_capacity(messages.len() + 1);
        if !config.system_prompt.is_empty() {
            wire_messages.push(WireMessage {
                role: "system",
                content: WireContent::Text(config.system_prompt.clone()),
                tool_call_id: None,
                tool_calls: None,
            });
        }
        wire_messages.extend(messages.iter().map(|m| self.convert(m)));

        ChatRequest {
            model: config.model.code.clone(),
            messages: wire_messages,
            stream,
            temperature: config.temperature,
            top_p: config.top_p,
            frequency_penalty: config.frequency_penalty,
            presence_penalty: config.presence_penalty,
            max_tokens: config.max_tokens,
            tools: if tools.is_empty() {
                None
            } else {
                Some(
                    tools
                        .iter()
                        .map(|t| WireTool {
                            kind: "function",
                            function: WireToolDef {
                                name: t.name.clone(),
                                description: t.description.clone(),
                                parameters: t.parameters.clone(),
                            },
                        })
                        .collect(),
                )
            },
        }
    }

    async fn post_chat(&self, body: &ChatRequest) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(endpoint(&self.host, "v1/chat/completions"))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let retry_after = extract_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(parse_error(status, &body, retry_after));
        }
        Ok(response)
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn stream_response(
        &self,
        messages: &[Conversation],
        config: &SessionConfig,
        tools: &[ToolSpec],
    ) -> Result<EventStream> {
        let body = self.build_request(messages, config, tools, true);
        let response = self.post_chat(&body).await?;

        let stream = try_stream! {
            let mut bytes = response.bytes_stream();
            let mut buffer = String::new();
            let mut partials: Vec<PartialToolCall> = Vec::new();
            let mut done = false;

            'outer: while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(|e| {
                    BanterError::Provider(ProviderError::Stream(e.to_string()))
                })?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer.drain(..=pos);

                    let Some(payload) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let payload = payload.trim_start();
                    if payload == "[DONE]" {
                        done = true;
                        break 'outer;
                    }
                    if payload.is_empty() {
                        continue;
                    }

                    let chunk: ChatChunk = serde_json::from_str(payload).map_err(|_| {
                        BanterError::Provider(ProviderError::Stream(collapse_body(payload)))
                    })?;

                    if let Some(choice) = chunk.choices.first() {
                        if let Some(content) = &choice.delta.content {
                            if !content.is_empty() {
                                yield ResponseEvent::ContentDelta(content.clone());
                            }
                        }
                        if let Some(deltas) = &choice.delta.tool_calls {
                            merge_tool_call_deltas(&mut partials, deltas);
                        }
                    }
                }
            }

            // A truncated stream (EOF without [DONE]) still ends normally
            // with whatever was accumulated.
            let _ = done;
            let calls = finish_partials(partials);
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
        let response = self.post_chat(&body).await?;
        let parsed: ChatResponse = response.json().await?;

        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| {
                BanterError::Provider(ProviderError::InvalidResponse(
                    "response contained no choices".to_string(),
                ))
            })?;

        if let Some(calls) = message.tool_calls {
            if !calls.is_empty() {
                return Ok(ResponseOutcome::ToolCallsRequested(
                    calls
                        .into_iter()
                        .map(|c| ToolCall::new(c.id, c.function.name, c.function.arguments))
                        .collect(),
                ));
            }
        }

        Ok(ResponseOutcome::Content(message.content.unwrap_or_default()))
    }

    async fn refresh_models(&self) -> Vec<AiModel> {
        let result = async {
            let response = self
                .client
                .get(endpoint(&self.host, "v1/models"))
                .bearer_auth(&self.api_key)
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
                .map(|m| AiModel::chat(m.id.clone(), m.id))
                .collect(),
            Err(e) => {
                tracing::debug!("model refresh failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn test_model(&self, model: &AiModel) -> bool {
        let mut config = SessionConfig::new(ProviderRecord::factory(ProviderKind::OpenAi));
        config.model = model.clone();
        let probe = [Conversation::user(TEST_PROMPT)];

        matches!(
            self.non_streaming_response(&probe, &config, &[]).await,
            Ok(ResponseOutcome::Content(text)) if !text.is_empty()
        )
    }

    async fn generate_image(&self, prompt: &str, model: &AiModel) -> Result<Vec<TypedData>> {
        let body = serde_json::json!({
            "model": model.code,
            "prompt": prompt,
            "n": 1,
            "response_format": "b64_json",
        });

        let response = self
            .client
            .post(endpoint(&self.host, "v1/images/generations"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let retry_after = extract_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(parse_error(status, &body, retry_after));
        }

        let parsed: ImagesResponse = response.json().await?;
        let mut images = Vec::new();
        for (index, entry) in parsed.data.into_iter().enumerate() {
            let encoded = entry.b64_json.ok_or_else(|| {
                BanterError::Provider(ProviderError::InvalidResponse(
                    "image entry missing b64_json".to_string(),
                ))
            })?;
            let data = BASE64.decode(encoded.as_bytes()).map_err(|e| {
                BanterError::Provider(ProviderError::InvalidResponse(format!(
                    "invalid image payload: {}",
                    e
                )))
            })?;
            images.push(TypedData::png(format!("image-{}.png", index), data));
        }
        Ok(images)
    }
}

fn convert_attachment(attachment: &TypedData) -> WirePart {
    if attachment.is_image() {
        let url = format!(
            "data:{};base64,{}",
            attachment.mime_type,
            BASE64.encode(&attachment.data)
        );
        WirePart::ImageUrl {
            image_url: ImageUrl { url },
        }
    } else if attachment.is_text() {
        WirePart::Text {
            text: String::from_utf8_lossy(&attachment.data).into_owned(),
        }
    } else {
        WirePart::Text {
            text: attachment_stand_in(attachment),
        }
    }
}

/// Merge one chunk's tool-call fragments into the partial accumulator
fn merge_tool_call_deltas(partials: &mut Vec<PartialToolCall>, deltas: &[ToolCallDelta]) {
    for delta in deltas {
        let index = delta.index.unwrap_or(0) as usize;
        if partials.len() <= index {
            partials.resize_with(index + 1, PartialToolCall::default);
        }
        let partial = &mut partials[index];
        if let Some(id) = &delta.id {
            partial.id.push_str(id);
        }
        if let Some(function) = &delta.function {
            if let Some(name) = &function.name {
                partial.name.push_str(name);
            }
            if let Some(arguments) = &function.arguments {
                partial.arguments.push_str(arguments);
            }
        }
    }
}

fn finish_partials(partials: Vec<PartialToolCall>) -> Vec<ToolCall> {
    partials
        .into_iter()
        .filter(|p| !p.name.is_empty())
        .map(|p| ToolCall::new(p.id, p.name, p.arguments))
        .collect()
}

fn extract_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
}

fn parse_error(status: u16, body: &str, retry_after: Option<u64>) -> BanterError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| collapse_body(body));

    let provider_error = match status {
        401 | 403 => ProviderError::AuthenticationFailed,
        429 => ProviderError::RateLimited(retry_after.unwrap_or(10) as u32),
        404 => ProviderError::ModelNotFound(message),
        _ => ProviderError::ServerError { status, message },
    };
    BanterError::Provider(provider_error)
}

// Wire types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: WireContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Parts(Vec<WirePart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: WireFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireToolDef,
}

#[derive(Debug, Serialize)]
struct WireToolDef {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
    #[serde(default)]
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    index: Option<u32>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<RespChoice>,
}

#[derive(Debug, Deserialize)]
struct RespChoice {
    message: RespMessage,
}

#[derive(Debug, Deserialize)]
struct RespMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    data: Vec<ImageEntry>,
}

#[derive(Debug, Deserialize)]
struct ImageEntry {
    #[serde(default)]
    b64_json: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}
