// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mock provider adapter for testing
//!
//! A scripted implementation of the adapter contract usable in engine
//! tests without network access. Responses are queued and popped per
//! request; every request is recorded for assertions.

use async_stream::stream;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::catalog::{AiModel, ProviderKind};
use crate::chat::{Conversation, SessionConfig, ToolCall, TypedData};
use crate::error::{BanterError, ProviderError, Result};
use crate::llm::adapter::{
    EventStream, ProviderAdapter, ResponseEvent, ResponseOutcome, ToolSpec,
};

/// A scripted response for one generation request
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// Events emitted in order
    pub events: Vec<ResponseEvent>,
    /// Pause inserted between consecutive events
    pub gap: Option<Duration>,
    /// Error yielded after the scripted events
    pub error: Option<String>,
}

impl MockResponse {
    /// A single complete text response
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            events: vec![ResponseEvent::ContentDelta(text.into())],
            gap: None,
            error: None,
        }
    }

    /// A response streamed as multiple deltas
    pub fn deltas(parts: &[&str]) -> Self {
        Self {
            events: parts
                .iter()
                .map(|p| ResponseEvent::ContentDelta(p.to_string()))
                .collect(),
            gap: None,
            error: None,
        }
    }

    /// A response requesting tool calls (after optional text deltas)
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            events: vec![ResponseEvent::ToolCallsRequested(calls)],
            gap: None,
            error: None,
        }
    }

    /// A response that fails after its scripted events
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            events: Vec::new(),
            gap: None,
            error: Some(message.into()),
        }
    }

    /// Insert a pause between consecutive events
    pub fn with_gap(mut self, gap: Duration) -> Self {
        self.gap = Some(gap);
        self
    }

    /// Append an error after the scripted events
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }
}

/// One recorded generation request
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Conversation>,
    pub streamed: bool,
    pub tool_names: Vec<String>,
    pub model: String,
}

/// A scripted mock adapter
#[derive(Clone)]
pub struct MockAdapter {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
    call_count: Arc<AtomicUsize>,
    images: Arc<Mutex<Vec<TypedData>>>,
    models: Arc<Mutex<Vec<AiModel>>>,
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAdapter {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            recorded: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(AtomicUsize::new(0)),
            images: Arc::new(Mutex::new(Vec::new())),
            models: Arc::new(Mutex::new(vec![AiModel::chat("mock-model", "Mock Model")])),
        }
    }

    /// Queue one scripted response
    pub fn queue(&self, response: MockResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Convenience: single text response
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.queue(MockResponse::text(text));
        self
    }

    /// Binary payloads returned by `generate_image`
    pub fn with_images(self, images: Vec<TypedData>) -> Self {
        *self.images.lock().unwrap() = images;
        self
    }

    /// Models returned by `refresh_models`
    pub fn with_models(self, models: Vec<AiModel>) -> Self {
        *self.models.lock().unwrap() = models;
        self
    }

    /// Number of generation requests issued so far
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// All recorded generation requests
    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.recorded.lock().unwrap().clone()
    }

    fn next_response(&self) -> MockResponse {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| MockResponse::text("Mock response"))
    }

    fn record(
        &self,
        messages: &[Conversation],
        config: &SessionConfig,
        tools: &[ToolSpec],
        streamed: bool,
    ) {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.recorded.lock().unwrap().push(RecordedRequest {
            messages: messages.to_vec(),
            streamed,
            tool_names: tools.iter().map(|t| t.name.clone()).collect(),
            model: config.model.code.clone(),
        });
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn stream_response(
        &self,
        messages: &[Conversation],
        config: &SessionConfig,
        tools: &[ToolSpec],
    ) -> Result<EventStream> {
        self.record(messages, config, tools, true);
        let response = self.next_response();

        let event_stream = stream! {
            let mut first = true;
            for event in response.events {
                if !first {
                    if let Some(gap) = response.gap {
                        tokio::time::sleep(gap).await;
                    }
                }
                first = false;
                yield Ok(event);
            }
            if let Some(message) = response.error {
                yield Err(BanterError::Provider(ProviderError::Stream(message)));
            }
        };

        Ok(Box::pin(event_stream))
    }

    async fn non_streaming_response(
        &self,
        messages: &[Conversation],
        config: &SessionConfig,
        tools: &[ToolSpec],
    ) -> Result<ResponseOutcome> {
        self.record(messages, config, tools, false);
        let response = self.next_response();

        if let Some(message) = response.error {
            return Err(BanterError::Provider(ProviderError::Stream(message)));
        }

        let mut text = String::new();
        for event in response.events {
            match event {
                ResponseEvent::ContentDelta(delta) => text.push_str(&delta),
                ResponseEvent::ToolCallsRequested(calls) => {
                    return Ok(ResponseOutcome::ToolCallsRequested(calls));
                }
            }
        }
        Ok(ResponseOutcome::Content(text))
    }

    async fn refresh_models(&self) -> Vec<AiModel> {
        self.models.lock().unwrap().clone()
    }

    async fn test_model(&self, _model: &AiModel) -> bool {
        true
    }

    async fn generate_image(&self, _prompt: &str, _model: &AiModel) -> Result<Vec<TypedData>> {
        let images = self.images.lock().unwrap().clone();
        if images.is_empty() {
            return Err(BanterError::Provider(ProviderError::Unsupported(
                "mock has no image payloads queued".to_string(),
            )));
        }
        Ok(images)
    }
}
