// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Stream orchestration
//!
//! Drives one generation attempt end-to-end: opens the adapter stream,
//! accumulates deltas with gated visible flushes, buffers tool-call
//! requests, dispatches them sequentially, and loops into a continuation
//! run targeting a fresh assistant placeholder. Cancellation is
//! cooperative and observed at the next chunk or tool await; cleanup of
//! the in-flight group is atomic on every exit path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::context::select_for_continuation;
use super::conversation::{Conversation, ToolCall, ToolResponse, TypedData};
use super::flush::FlushGate;
use super::session::Session;
use super::session_config::SessionConfig;
use crate::error::BanterError;
use crate::llm::adapter::{ProviderAdapter, ResponseEvent, ResponseOutcome, ToolSpec};
use crate::store::SessionStore;
use crate::tools::ToolExecutor;

/// Session tree shared between the controller and its orchestrator task
pub type SharedSession = Arc<Mutex<Session>>;

/// Terminal state of one orchestrator run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Finalized,
    Cancelled,
    Errored,
}

/// Everything one run needs, snapshotted at start
pub struct RunParams {
    pub session: SharedSession,
    pub adapter: Arc<dyn ProviderAdapter>,
    pub config: SessionConfig,
    pub executor: ToolExecutor,
    pub tool_specs: Vec<ToolSpec>,
    pub store: Option<Arc<dyn SessionStore>>,
    pub cancel: CancellationToken,
    pub flush_interval: Duration,
}

enum RunError {
    Cancelled,
    Failed(BanterError),
}

enum Dispatch {
    Continue {
        messages: Vec<Conversation>,
        target: Uuid,
    },
    Finalized,
    Cancelled,
}

/// One generation attempt over a session
pub struct StreamOrchestrator {
    session: SharedSession,
    adapter: Arc<dyn ProviderAdapter>,
    config: SessionConfig,
    executor: ToolExecutor,
    tool_specs: Vec<ToolSpec>,
    store: Option<Arc<dyn SessionStore>>,
    cancel: CancellationToken,
    flush_interval: Duration,
}

impl StreamOrchestrator {
    pub fn new(params: RunParams) -> Self {
        Self {
            session: params.session,
            adapter: params.adapter,
            config: params.config,
            executor: params.executor,
            tool_specs: params.tool_specs,
            store: params.store,
            cancel: params.cancel,
            flush_interval: params.flush_interval,
        }
    }

    /// Run to a terminal state, following tool-call continuations.
    pub async fn run(self, mut messages: Vec<Conversation>, mut target: Uuid) -> RunOutcome {
        loop {
            let attempt = if self.config.stream {
                self.stream_once(&messages, target).await
            } else {
                self.single_shot(&messages, target).await
            };

            match attempt {
                Ok(calls) if !calls.is_empty() => {
                    match self.dispatch_tools(target, calls).await {
                        Dispatch::Continue {
                            messages: next_messages,
                            target: next_target,
                        } => {
                            messages = next_messages;
                            target = next_target;
                        }
                        Dispatch::Finalized => {
                            self.save_session().await;
                            return RunOutcome::Finalized;
                        }
                        Dispatch::Cancelled => {
                            self.save_session().await;
                            return RunOutcome::Cancelled;
                        }
                    }
                }
                Ok(_) => {
                    self.finalize(target).await;
                    return RunOutcome::Finalized;
                }
                Err(RunError::Cancelled) => {
                    self.cleanup_cancelled(target).await;
                    return RunOutcome::Cancelled;
                }
                Err(RunError::Failed(error)) => {
                    self.fail(target, error).await;
                    return RunOutcome::Errored;
                }
            }
        }
    }

    /// One streaming attempt. Returns the buffered tool calls (possibly
    /// empty) on normal stream end.
    async fn stream_once(
        &self,
        messages: &[Conversation],
        target: Uuid,
    ) -> Result<Vec<ToolCall>, RunError> {
        self.set_replying(target, true).await;

        // opening the connection is itself a suspension point
        let mut stream = tokio::select! {
            _ = self.cancel.cancelled() => return Err(RunError::Cancelled),
            result = self
                .adapter
                .stream_response(messages, &self.config, &self.tool_specs) => {
                result.map_err(RunError::Failed)?
            }
        };

        let mut accumulated = String::new();
        let mut pending_calls: Vec<ToolCall> = Vec::new();
        let mut gate = FlushGate::new(self.flush_interval, Instant::now());

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(RunError::Cancelled),
                event = stream.next() => match event {
                    None => break,
                    Some(Ok(ResponseEvent::ContentDelta(delta))) => {
                        accumulated.push_str(&delta);
                        if gate.poll(Instant::now()) {
                            self.flush_content(target, &accumulated).await;
                        }
                    }
                    Some(Ok(ResponseEvent::ToolCallsRequested(calls))) => {
                        pending_calls.extend(calls);
                    }
                    Some(Err(error)) => return Err(RunError::Failed(error)),
                },
            }
        }

        // the final flush bypasses the gate and applies the complete text
        if !accumulated.is_empty() {
            self.flush_content(target, &accumulated).await;
        }

        Ok(pending_calls)
    }

    /// One non-streaming attempt.
    async fn single_shot(
        &self,
        messages: &[Conversation],
        target: Uuid,
    ) -> Result<Vec<ToolCall>, RunError> {
        self.set_replying(target, true).await;

        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => return Err(RunError::Cancelled),
            outcome = self
                .adapter
                .non_streaming_response(messages, &self.config, &self.tool_specs) => outcome,
        };

        match outcome {
            Ok(ResponseOutcome::Content(text)) => {
                self.flush_content(target, &text).await;
                Ok(Vec::new())
            }
            Ok(ResponseOutcome::ToolCallsRequested(calls)) => Ok(calls),
            Err(error) => Err(RunError::Failed(error)),
        }
    }

    /// Execute buffered tool calls sequentially, materialize each result
    /// as its own group, then append the continuation placeholder.
    async fn dispatch_tools(&self, assistant: Uuid, calls: Vec<ToolCall>) -> Dispatch {
        {
            let mut session = self.session.lock().await;
            if let Some(group) = session.group_by_id_mut(assistant) {
                let conversation = group.active_mut();
                conversation.tool_calls = calls.clone();
                conversation.is_replying = false;
            }
            session.refresh_token_count();
        }

        let mut binary: Vec<TypedData> = Vec::new();
        for call in &calls {
            let tool_group = {
                let mut session = self.session.lock().await;
                session.add_group(Conversation::tool_result(ToolResponse::pending(call)))
            };

            let output = tokio::select! {
                _ = self.cancel.cancelled() => {
                    // the pending result has produced nothing yet
                    let mut session = self.session.lock().await;
                    session.remove_group_by_id(tool_group);
                    return Dispatch::Cancelled;
                }
                output = self.executor.execute_call(call, &self.config.tools) => output,
            };

            {
                let mut session = self.session.lock().await;
                if let Some(group) = session.group_by_id_mut(tool_group) {
                    let conversation = group.active_mut();
                    if let Some(response) = conversation.tool_response.as_mut() {
                        response.content = output.text.clone();
                        response.data = output.data.clone();
                        response.is_error = output.is_error;
                    }
                    conversation.is_replying = false;
                }
            }
            binary.extend(output.data);
        }

        let (new_target, continuation) = {
            let mut session = self.session.lock().await;
            let id = session.add_group(Conversation::assistant_placeholder());
            let messages = select_for_continuation(&session);
            session.refresh_token_count();
            (id, messages)
        };

        // binary tool output short-circuits the continuation: the payloads
        // attach directly to the fresh assistant message
        if !binary.is_empty() {
            let mut session = self.session.lock().await;
            if let Some(group) = session.group_by_id_mut(new_target) {
                let conversation = group.active_mut();
                conversation.attachments = binary;
                conversation.is_replying = false;
            }
            session.refresh_token_count();
            return Dispatch::Finalized;
        }

        Dispatch::Continue {
            messages: continuation,
            target: new_target,
        }
    }

    async fn set_replying(&self, target: Uuid, replying: bool) {
        let mut session = self.session.lock().await;
        if let Some(group) = session.group_by_id_mut(target) {
            group.active_mut().is_replying = replying;
        }
    }

    async fn flush_content(&self, target: Uuid, content: &str) {
        let mut session = self.session.lock().await;
        if let Some(group) = session.group_by_id_mut(target) {
            group.active_mut().content = content.to_string();
        }
    }

    async fn finalize(&self, target: Uuid) {
        {
            let mut session = self.session.lock().await;
            if let Some(group) = session.group_by_id_mut(target) {
                group.active_mut().is_replying = false;
            }
            session.refresh_token_count();
        }
        self.save_session().await;
    }

    async fn cleanup_cancelled(&self, target: Uuid) {
        {
            let mut session = self.session.lock().await;
            Self::cleanup_target(&mut session, target);
            session.refresh_token_count();
        }
        self.save_session().await;
    }

    async fn fail(&self, target: Uuid, error: BanterError) {
        tracing::warn!(error = %error, "generation run failed");
        {
            let mut session = self.session.lock().await;
            session.error_message = error.to_string();
            Self::cleanup_target(&mut session, target);
            session.refresh_token_count();
        }
        self.save_session().await;
    }

    /// Cleanup shared by the cancel and error paths: an empty target
    /// variant is removed (and its group with it when that was the last
    /// variant); flushed partial content is kept.
    fn cleanup_target(session: &mut Session, target: Uuid) {
        let Some(index) = session.group_index(target) else {
            return;
        };
        let Some(group) = session.group_mut(index) else {
            return;
        };

        let active = group.active();
        if active.content.is_empty() && active.tool_calls.is_empty() {
            if group.remove_active_variant() {
                session.remove_group_by_id(target);
            }
        } else {
            group.active_mut().is_replying = false;
        }
    }

    async fn save_session(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let session = self.session.lock().await;
        if session.is_quick {
            return;
        }
        if let Err(e) = store.save(&session) {
            tracing::warn!(error = %e, "best-effort session save failed");
        }
    }
}
