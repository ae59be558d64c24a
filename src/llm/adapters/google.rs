// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Google Gemini adapter
//!
//! Speaks the generateContent API. Streaming uses
//! `streamGenerateContent?alt=sse`, which emits `data:` lines of JSON
//! chunks; functionCall parts arrive fully-formed inside chunks rather
//! than as argument fragments.

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

/// Google Gemini adapter
pub struct GoogleAdapter {
    client: Client,
    host: String,
    api_key: String,
}

impl GoogleAdapter {
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

    /// Map a canonical conversation onto Gemini content.
    ///
    /// Attachments ride as inlineData parts ahead of the text; tool
    /// results become functionResponse parts on a user turn.
    fn convert(&self, conversation: &Conversation) -> WireContent {
        let role = match conversation.role {
            Role::Assistant => "model",
            _ => "user",
        };

        let mut parts = Vec::new();
        for attachment in &conversation.attachments {
            if attachment.is_text() {
                parts.push(WirePart::Text {
                    text: String::from_utf8_lossy(&attachment.data).into_owned(),
                });
            } else if attachment.is_image() {
                parts.push(WirePart::InlineData {
                    inline_data: InlineData {
                        mime_type: attachment.mime_type.clone(),
                        data: BASE64.encode(&attachment.data),
                    },
                });
            } else {
                parts.push(WirePart::Text {
                    text: attachment_stand_in(attachment),
                });
            }
        }

        if let Some(response) = &conversation.tool_response {
            parts.push(WirePart::FunctionResponse {
                function_response: FunctionResponse {
                    name: response.tool.clone(),
                    response: serde_json::json!({ "content": response.content }),
                },
            });
        } else if !conversation.content.is_empty() || parts.is_empty() {
            parts.push(WirePart::Text {
                text: conversation.content.clone(),
            });
        }

        for call in &conversation.tool_calls {
            parts.push(WirePart::FunctionCall {
                function_call: FunctionCall {
                    name: call.tool.clone(),
                    args: serde_json::from_str(&call.arguments)
                        .unwrap_or_else(|_| Value::Object(Default::default())),
                },
            });
        }

        WireContent {
            role,
            parts,
        }
    }

    fn build_request(
        &self,
        messages: &[Conversation],
        config: &SessionConfig,
        tools: &[ToolSpec],
    ) -> GenerateRequest {
        GenerateRequest {
            contents: messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(|m| self.convert(m))
                .collect(),
            system_instruction: if config.system_prompt.is_empty() {
                None
            } else {
                Some(SystemInstruction {
                    parts: vec![WirePart::Text {
                        text: config.system_prompt.clone(),
                    }],
                })
            },
            generation_config: GenerationConfig {
                temperature: config.temperature,
                top_p: config.top_p,
                max_output_tokens: config.max_tokens,
            },
            tools: if tools.is_empty() {
                None
            } else {
                Some(vec![WireTools {
                    function_declarations: tools
                        .iter()
                        .map(|t| FunctionDeclaration {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: t.parameters.clone(),
                        })
                        .collect(),
                }])
            },
        }
    }

    async fn post_generate(
        &self,
        model: &str,
        method: &str,
        query: &str,
        body: &GenerateRequest,
    ) -> Result<reqwest::Response> {
        let path = format!("v1beta/models/{}:{}{}", model, method, query);
        let response = self
            .client
            .post(endpoint(&self.host, &path))
            .header("x-goog-api-key", &self.api_key)
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
impl ProviderAdapter for GoogleAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    async fn stream_response(
        &self,
        messages: &[Conversation],
        config: &SessionConfig,
        tools: &[ToolSpec],
    ) -> Result<EventStream> {
        let body = self.build_request(messages, config, tools);
        let response = self
            .post_generate(&config.model.code, "streamGenerateContent", "?alt=sse", &body)
            .await?;

        let stream = try_stream! {
            let mut bytes = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = bytes.next().await {
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
                    if payload.is_empty() {
                        continue;
                    }

                    let chunk: GenerateResponse = serde_json::from_str(payload).map_err(|_| {
                        BanterError::Provider(ProviderError::Stream(collapse_body(payload)))
                    })?;

                    let (text, calls) = split_candidate_parts(chunk);
                    if !text.is_empty() {
                        yield ResponseEvent::ContentDelta(text);
                    }
                    if !calls.is_empty() {
                        yield ResponseEvent::ToolCallsRequested(calls);
                    }
                }
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
        let body = self.build_request(messages, config, tools);
        let response = self
            .post_generate(&config.model.code, "generateContent", "", &body)
            .await?;
        let parsed: GenerateResponse = response.json().await?;

        let (text, calls) = split_candidate_parts(parsed);
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
                .get(endpoint(&self.host, "v1beta/models"))
                .header("x-goog-api-key", &self.api_key)
                .send()
                .await?
                .error_for_status()?;
            let parsed: ModelsResponse = response.json().await?;
            Ok::<_, reqwest::Error>(parsed)
        }
        .await;

        match result {
            Ok(parsed) => parsed
                .models
                .into_iter()
                .map(|m| {
                    let code = m.name.strip_prefix("models/").unwrap_or(&m.name).to_string();
                    let name = m.display_name.unwrap_or_else(|| code.clone());
                    AiModel::chat(code, name)
                })
                .collect(),
            Err(e) => {
                tracing::debug!("model refresh failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn test_model(&self, model: &AiModel) -> bool {
        let mut config = SessionConfig::new(ProviderRecord::factory(ProviderKind::Google));
        config.model = model.clone();
        let probe = [Conversation::user(TEST_PROMPT)];

        matches!(
            self.non_streaming_response(&probe, &config, &[]).await,
            Ok(ResponseOutcome::Content(text)) if !text.is_empty()
        )
    }
}

/// Pull text and function calls out of the first candidate's parts
fn split_candidate_parts(response: GenerateResponse) -> (String, Vec<ToolCall>) {
    let mut text = String::new();
    let mut calls = Vec::new();

    if let Some(candidate) = response.candidates.into_iter().next() {
        for part in candidate.content.parts {
            match part {
                RespPart::Text { text: t } => text.push_str(&t),
                RespPart::FunctionCall { function_call } => {
                    // Gemini assigns no call ids; downstream keys accept empty
                    calls.push(ToolCall::new(
                        "",
                        function_call.name,
                        function_call.args.to_string(),
                    ));
                }
            }
        }
    }

    (text, calls)
}

fn parse_error(status: u16, body: &str) -> BanterError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| collapse_body(body));

    let provider_error = match status {
        401 | 403 => ProviderError::AuthenticationFailed,
        429 => ProviderError::RateLimited(10),
        404 => ProviderError::ModelNotFound(message),
        _ => ProviderError::ServerError { status, message },
    };
    BanterError::Provider(provider_error)
}

// Wire types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTools>>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct WireContent {
    role: &'static str,
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WirePart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: FunctionCall,
    },
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: FunctionResponse,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    args: Value,
}

#[derive(Debug, Serialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireTools {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<RespPart>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RespPart {
    Text {
        text: String,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: FunctionCall,
    },
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelEntry {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}
