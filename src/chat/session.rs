// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session tree
//!
//! A session owns an ordered list of conversation groups, an optional
//! context-reset marker, and its generation config. All structural
//! mutations of the tree live here so they can be tested synchronously;
//! the async controller and orchestrator act through these operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::conversation::{Conversation, Role, TypedData};
use super::group::ConversationGroup;
use super::session_config::{ConfigPurpose, SessionConfig};
use crate::error::{BanterError, Result};

/// One conversation thread with its own configuration and history tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub order: usize,
    pub title: String,
    pub starred: bool,

    /// Last user-visible error, empty when none
    pub error_message: String,

    /// Context-reset marker: only groups after this index reach the provider
    pub reset_marker: Option<usize>,

    /// Quick-query sessions are transient: skipped by backup and autotitle
    pub is_quick: bool,

    /// Cached token estimate for the current context
    pub token_count: usize,

    groups: Vec<ConversationGroup>,

    pub config: SessionConfig,
}

impl Session {
    /// Create an empty chat session
    pub fn new(config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            date: Utc::now(),
            order: 0,
            title: "Chat Session".to_string(),
            starred: false,
            error_message: String::new(),
            reset_marker: None,
            is_quick: false,
            token_count: 0,
            groups: Vec::new(),
            config,
        }
    }

    /// Create a transient quick-query session
    pub fn quick(config: SessionConfig) -> Self {
        let mut session = Self::new(config);
        session.is_quick = true;
        session
    }

    /// Groups in creation order
    pub fn groups(&self) -> &[ConversationGroup] {
        &self.groups
    }

    pub fn group_mut(&mut self, index: usize) -> Option<&mut ConversationGroup> {
        self.groups.get_mut(index)
    }

    /// Locate a group by id
    pub fn group_index(&self, id: Uuid) -> Option<usize> {
        self.groups.iter().position(|g| g.id == id)
    }

    pub fn group_by_id_mut(&mut self, id: Uuid) -> Option<&mut ConversationGroup> {
        self.groups.iter_mut().find(|g| g.id == id)
    }

    /// Groups included in provider context (after the reset marker)
    pub fn adjusted_groups(&self) -> &[ConversationGroup] {
        match self.reset_marker {
            Some(marker) if marker + 1 <= self.groups.len() => &self.groups[marker + 1..],
            Some(_) => &[],
            None => &self.groups,
        }
    }

    /// Whether the newest group is currently being streamed into
    pub fn is_replying(&self) -> bool {
        self.groups.last().map(|g| g.is_replying()).unwrap_or(false)
    }

    /// Append a new group holding `conversation`; returns its id
    pub fn add_group(&mut self, conversation: Conversation) -> Uuid {
        let group = ConversationGroup::new(conversation);
        let id = group.id;
        self.groups.push(group);
        id
    }

    /// Toggle the context-reset marker at a group index.
    ///
    /// Setting it where it already is clears it; history before the
    /// marker is suppressed from future requests but never deleted.
    pub fn reset_context_at(&mut self, index: usize) -> Result<()> {
        if index >= self.groups.len() {
            return Err(BanterError::InvalidState(format!(
                "no group at index {}",
                index
            )));
        }

        self.reset_marker = if self.reset_marker == Some(index) {
            None
        } else {
            Some(index)
        };
        self.refresh_token_count();
        Ok(())
    }

    /// Clear the reset marker when a mutation touches the marked prefix
    fn clear_marker_covering(&mut self, index: usize) {
        if let Some(marker) = self.reset_marker {
            if index <= marker {
                self.reset_marker = None;
            }
        }
    }

    /// The contiguous range removed when deleting the group at `index`.
    ///
    /// For an assistant group the whole exchange tail is removed: every
    /// non-user group walking backwards, stopping before the nearest user
    /// turn. Other roles remove just themselves. Computed once so deletion
    /// is a single structural drain.
    pub fn exchange_range(&self, index: usize) -> std::ops::RangeInclusive<usize> {
        if self.groups[index].role() != Role::Assistant {
            return index..=index;
        }

        let mut start = index;
        while start > 0 && self.groups[start - 1].role() != Role::User {
            start -= 1;
        }
        start..=index
    }

    /// Delete the group at `index`, cascading per the exchange rule
    pub fn delete_group(&mut self, index: usize) -> Result<()> {
        if index >= self.groups.len() {
            return Err(BanterError::InvalidState(format!(
                "no group at index {}",
                index
            )));
        }

        let range = self.exchange_range(index);
        self.clear_marker_covering(*range.start());
        self.groups.drain(range);
        self.refresh_token_count();
        Ok(())
    }

    /// Remove a group by id without cascading (orchestrator cleanup path)
    pub fn remove_group_by_id(&mut self, id: Uuid) {
        self.groups.retain(|g| g.id != id);
    }

    /// Delete the whole tree, clearing marker and error state
    pub fn delete_all_groups(&mut self) {
        self.reset_marker = None;
        self.groups.clear();
        self.error_message.clear();
        self.refresh_token_count();
    }

    /// Truncate every group after `index`
    pub fn truncate_after(&mut self, index: usize) {
        self.groups.truncate(index + 1);
    }

    /// Overwrite the user turn at `index` and drop everything after it.
    ///
    /// An edit is a destructive truncate-and-replace, not a branch. Fails
    /// without mutating the tree when the target is not a user turn.
    pub fn apply_edit(
        &mut self,
        index: usize,
        content: impl Into<String>,
        attachments: Vec<TypedData>,
    ) -> Result<()> {
        let valid = self
            .groups
            .get(index)
            .map(|g| g.role() == Role::User)
            .unwrap_or(false);
        if !valid {
            return Err(BanterError::InvalidState(
                "no editable user message at that position".to_string(),
            ));
        }

        self.clear_marker_covering(index);
        let target = self.groups[index].active_mut();
        target.content = content.into();
        target.attachments = attachments;
        self.truncate_after(index);
        self.refresh_token_count();
        Ok(())
    }

    /// Prepare an assistant group for regeneration: add a fresh empty
    /// variant and truncate everything after the group.
    ///
    /// Returns the preceding user turn's content, which the context
    /// selector substitutes into the request.
    pub fn prepare_regeneration(&mut self, index: usize) -> Result<(Uuid, String)> {
        let valid = self
            .groups
            .get(index)
            .map(|g| g.role() == Role::Assistant)
            .unwrap_or(false);
        if !valid {
            return Err(BanterError::InvalidState(
                "only assistant messages can be regenerated".to_string(),
            ));
        }
        let user_content = self.groups[..index]
            .iter()
            .rev()
            .find(|g| g.role() == Role::User)
            .map(|g| g.active().content.clone())
            .ok_or_else(|| {
                BanterError::InvalidState(
                    "assistant message has no preceding user turn".to_string(),
                )
            })?;

        self.clear_marker_covering(index);

        let group = &mut self.groups[index];
        group.add_variant(Conversation::assistant_placeholder());
        let id = group.id;
        self.truncate_after(index);
        Ok((id, user_content))
    }

    /// Deep-copy this session up to and including `upto` (whole tree when
    /// `None`) into a new independent session.
    pub fn fork(&self, upto: Option<usize>, purpose: ConfigPurpose) -> Session {
        let end = upto
            .map(|i| (i + 1).min(self.groups.len()))
            .unwrap_or(self.groups.len());

        let mut forked = Session::new(self.config.copy_for(purpose));
        forked.title = format!("{} {}", purpose.title_prefix(), self.title);
        forked.is_quick = purpose == ConfigPurpose::Quick;
        forked.groups = self.groups[..end]
            .iter()
            .map(ConversationGroup::copy_deep)
            .collect();
        forked.refresh_token_count();
        forked
    }

    /// Recompute the cached token estimate for the current context
    pub fn refresh_token_count(&mut self) {
        let config = &self.config.conversation;
        let message_tokens: usize = self
            .adjusted_groups()
            .iter()
            .map(|g| g.estimate_tokens(config))
            .sum();
        let system_tokens =
            self.config.system_prompt.len() / config.chars_per_token.max(1) as usize;
        let tool_tokens = self.config.tools.estimate_tokens(config);

        self.token_count = message_tokens + system_tokens + tool_tokens;
    }
}
