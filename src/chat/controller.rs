// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session controller
//!
//! The user-facing operation surface over one session: send, stop,
//! regenerate, edit, fork, context reset, and deletion. The controller
//! is the session's single mutator apart from the orchestrator task it
//! spawns, and it enforces the at-most-one-active-run invariant.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::context::{select_context, select_for_regeneration};
use super::conversation::{Conversation, TypedData};
use super::flush::DEFAULT_FLUSH_INTERVAL;
use super::orchestrator::{RunOutcome, RunParams, SharedSession, StreamOrchestrator};
use super::session::Session;
use super::session_config::ConfigPurpose;
use super::title::generate_title;
use crate::catalog::{AiModel, ProviderRecord};
use crate::error::{BanterError, Result};
use crate::llm::adapter::ProviderAdapter;
use crate::llm::adapters::adapter_for;
use crate::store::SessionStore;
use crate::tools::{ToolContext, ToolExecutor, ToolRegistry};

struct ActiveRun {
    cancel: CancellationToken,
    handle: JoinHandle<RunOutcome>,
}

/// Operation surface over one session
pub struct SessionController {
    session: SharedSession,
    adapter: Arc<dyn ProviderAdapter>,
    registry: Arc<ToolRegistry>,
    store: Option<Arc<dyn SessionStore>>,
    active: Option<ActiveRun>,
    editing: Option<usize>,
    flush_interval: Duration,
    autogen_titles: bool,
}

impl SessionController {
    /// Wrap a session, deriving the adapter from its provider record
    pub fn new(session: Session) -> Self {
        let adapter = adapter_for(&session.config.provider);
        Self {
            session: Arc::new(tokio::sync::Mutex::new(session)),
            adapter,
            registry: Arc::new(ToolRegistry::with_builtins()),
            store: None,
            active: None,
            editing: None,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            autogen_titles: true,
        }
    }

    /// Override the adapter (tests, custom backends)
    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapter = adapter;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_autogen_titles(mut self, autogen: bool) -> Self {
        self.autogen_titles = autogen;
        self
    }

    /// Shared handle to the session tree, for observation
    pub fn session(&self) -> SharedSession {
        self.session.clone()
    }

    /// Whether a generation run is currently active
    pub fn is_streaming(&self) -> bool {
        self.active
            .as_ref()
            .map(|run| !run.handle.is_finished())
            .unwrap_or(false)
    }

    /// Drop the handle of a run that already reached a terminal state
    fn reap_finished(&mut self) {
        if let Some(run) = &self.active {
            if run.handle.is_finished() {
                self.active = None;
            }
        }
    }

    fn ensure_idle(&mut self) -> Result<()> {
        self.reap_finished();
        if self.active.is_some() {
            return Err(BanterError::InvalidState(
                "a generation is already in progress".to_string(),
            ));
        }
        Ok(())
    }

    /// Send user input and start exactly one generation run.
    ///
    /// In editing mode the targeted user turn is overwritten and all
    /// later groups are dropped; otherwise a new user group is appended.
    /// An empty prompt outside editing mode is a no-op.
    pub async fn send(
        &mut self,
        prompt: impl Into<String>,
        attachments: Vec<TypedData>,
    ) -> Result<()> {
        self.ensure_idle()?;
        let prompt = prompt.into();

        let (messages, target) = {
            let mut session = self.session.lock().await;
            session.error_message.clear();
            session.date = chrono::Utc::now();

            if let Some(index) = self.editing.take() {
                if let Err(e) = session.apply_edit(index, prompt, attachments) {
                    session.error_message = e.to_string();
                    return Err(e);
                }
            } else {
                if prompt.is_empty() {
                    return Ok(());
                }
                session.add_group(Conversation::user_with_attachments(prompt, attachments));
            }

            let messages = select_context(&session);
            let target = session.add_group(Conversation::assistant_placeholder());
            session.refresh_token_count();
            (messages, target)
        };

        if self.autogen_titles {
            tokio::spawn(generate_title(
                self.session.clone(),
                self.adapter.clone(),
                false,
            ));
        }

        self.start_run(messages, target).await;
        Ok(())
    }

    /// Regenerate an assistant group: branch a new variant, truncate the
    /// tail, and restart generation targeting the new variant.
    pub async fn regenerate(&mut self, group_index: usize) -> Result<()> {
        self.ensure_idle()?;

        let (messages, target) = {
            let mut session = self.session.lock().await;
            session.error_message.clear();
            let (target, user_content) = session.prepare_regeneration(group_index)?;
            let messages = select_for_regeneration(&session, &user_content);
            session.refresh_token_count();
            (messages, target)
        };

        self.start_run(messages, target).await;
        Ok(())
    }

    /// Cancel the active run and wait for its deterministic cleanup
    pub async fn stop(&mut self) -> Option<RunOutcome> {
        let run = self.active.take()?;
        run.cancel.cancel();
        match run.handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::warn!(error = %e, "orchestrator task aborted");
                Some(RunOutcome::Errored)
            }
        }
    }

    /// Wait for the active run, if any, to reach a terminal state
    pub async fn wait_for_idle(&mut self) -> Option<RunOutcome> {
        let run = self.active.take()?;
        match run.handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::warn!(error = %e, "orchestrator task aborted");
                Some(RunOutcome::Errored)
            }
        }
    }

    /// Toggle the context-reset marker at a group index
    pub async fn reset_context(&mut self, group_index: usize) -> Result<()> {
        self.session.lock().await.reset_context_at(group_index)
    }

    /// Delete a group, cascading per the exchange rule
    pub async fn delete_group(&mut self, group_index: usize) -> Result<()> {
        if self.is_streaming() {
            return Err(BanterError::InvalidState(
                "cannot delete groups while a generation is active".to_string(),
            ));
        }
        self.session.lock().await.delete_group(group_index)
    }

    /// Delete the whole tree
    pub async fn delete_all(&mut self) -> Result<()> {
        if self.is_streaming() {
            return Err(BanterError::InvalidState(
                "cannot clear the session while a generation is active".to_string(),
            ));
        }
        self.session.lock().await.delete_all_groups();
        Ok(())
    }

    /// Deep-copy the session up to `upto` into a new independent session
    /// and persist it best-effort.
    pub async fn fork(&self, upto: Option<usize>) -> Session {
        let forked = {
            let session = self.session.lock().await;
            session.fork(upto, ConfigPurpose::Chat)
        };
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&forked) {
                tracing::warn!(error = %e, "could not persist forked session");
            }
        }
        forked
    }

    /// Enter editing mode for a user group; returns its current content
    /// and attachments for the caller's input surface.
    pub async fn begin_editing(&mut self, group_index: usize) -> Result<(String, Vec<TypedData>)> {
        let session = self.session.lock().await;
        let group = session.groups().get(group_index).ok_or_else(|| {
            BanterError::InvalidState(format!("no group at index {}", group_index))
        })?;
        if group.role() != super::conversation::Role::User {
            return Err(BanterError::InvalidState(
                "only user messages can be edited".to_string(),
            ));
        }

        self.editing = Some(group_index);
        let active = group.active();
        Ok((active.content.clone(), active.attachments.clone()))
    }

    /// Leave editing mode without mutating the tree
    pub fn cancel_editing(&mut self) {
        self.editing = None;
    }

    /// Whether the controller is in editing mode
    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    /// Regenerate the session title regardless of exchange count
    pub async fn regenerate_title(&self) {
        generate_title(self.session.clone(), self.adapter.clone(), true).await;
    }

    /// Swap the backend between runs
    pub async fn set_provider(&mut self, record: ProviderRecord) -> Result<()> {
        self.ensure_idle()?;
        self.adapter = adapter_for(&record);
        let mut session = self.session.lock().await;
        session.config.model = record.chat_model.clone();
        session.config.provider = record;
        Ok(())
    }

    /// Swap the model between runs
    pub async fn set_model(&mut self, model: AiModel) -> Result<()> {
        self.ensure_idle()?;
        self.session.lock().await.config.model = model;
        Ok(())
    }

    /// Persist the session best-effort
    pub async fn save(&self) {
        if let Some(store) = &self.store {
            let session = self.session.lock().await;
            if session.is_quick {
                return;
            }
            if let Err(e) = store.save(&session) {
                tracing::warn!(error = %e, "session save failed");
            }
        }
    }

    async fn start_run(&mut self, messages: Vec<Conversation>, target: uuid::Uuid) {
        let config = self.session.lock().await.config.clone();
        let tool_specs = self.registry.specs_for(&config.tools);
        let executor = ToolExecutor::new(
            self.registry.clone(),
            ToolContext::new(self.adapter.clone(), config.provider.image_model.clone()),
        );

        let cancel = CancellationToken::new();
        let orchestrator = StreamOrchestrator::new(RunParams {
            session: self.session.clone(),
            adapter: self.adapter.clone(),
            config,
            executor,
            tool_specs,
            store: self.store.clone(),
            cancel: cancel.clone(),
            flush_interval: self.flush_interval,
        });

        let handle = tokio::spawn(orchestrator.run(messages, target));
        self.active = Some(ActiveRun { cancel, handle });
    }
}
