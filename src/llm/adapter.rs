// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Provider adapter trait and canonical event types
//!
//! Every backend family implements the same capability contract; the
//! canonical event union is the only response shape that crosses upward
//! into the orchestrator. Wire-format conversion stays inside each
//! adapter since every backend's message type is different.

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;
use std::pin::Pin;

use crate::catalog::{AiModel, ProviderKind};
use crate::chat::{Conversation, SessionConfig, ToolCall, TypedData};
use crate::error::{BanterError, ProviderError, Result};

/// One normalized event from a streaming response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseEvent {
    /// A chunk of assistant text
    ContentDelta(String),
    /// The backend requested tool invocations
    ToolCallsRequested(Vec<ToolCall>),
}

/// The normalized result of a non-streaming response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Final assistant text
    Content(String),
    /// The backend requested tool invocations
    ToolCallsRequested(Vec<ToolCall>),
}

/// A cancellable, finite stream of normalized response events
pub type EventStream = Pin<Box<dyn Stream<Item = Result<ResponseEvent>> + Send>>;

/// A tool definition advertised to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's arguments
    pub parameters: Value,
}

/// Capability contract implemented once per backend family
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Backend family this adapter speaks
    fn kind(&self) -> ProviderKind;

    /// Open a streaming generation over the given context.
    ///
    /// The returned stream ends normally on backend completion and fails
    /// with a `ProviderError` carrying the backend's diagnostic. Dropping
    /// the stream cancels the request.
    async fn stream_response(
        &self,
        messages: &[Conversation],
        config: &SessionConfig,
        tools: &[ToolSpec],
    ) -> Result<EventStream>;

    /// Single-shot generation over the given context
    async fn non_streaming_response(
        &self,
        messages: &[Conversation],
        config: &SessionConfig,
        tools: &[ToolSpec],
    ) -> Result<ResponseOutcome>;

    /// Query the backend's model catalog.
    ///
    /// Model discovery is best-effort: any failure yields an empty list.
    async fn refresh_models(&self) -> Vec<AiModel>;

    /// Probe a model with a minimal request; reports reachability only
    /// and never errors.
    async fn test_model(&self, model: &AiModel) -> bool;

    /// Generate images from a prompt, for backends with an image endpoint
    async fn generate_image(&self, _prompt: &str, _model: &AiModel) -> Result<Vec<TypedData>> {
        Err(BanterError::Provider(ProviderError::Unsupported(format!(
            "{} has no image generation endpoint",
            self.kind().name()
        ))))
    }
}

/// Canonical probe text used by `test_model`
pub const TEST_PROMPT: &str = "Reply with the single word: pong";
