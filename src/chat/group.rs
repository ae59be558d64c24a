// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation groups
//!
//! A group is one turn-slot in a session. It holds every variant produced
//! for that slot (regenerations) and the index of the currently active one.
//! Invariant: the variant list is never empty and the active index is
//! always in range.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::conversation::{Conversation, Role};
use crate::config::ConversationConfig;

/// One turn-slot holding regeneration variants of a single message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationGroup {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    variants: Vec<Conversation>,
    active: usize,
}

impl ConversationGroup {
    /// Create a group with its first (and active) variant
    pub fn new(conversation: Conversation) -> Self {
        Self {
            id: Uuid::new_v4(),
            date: Utc::now(),
            variants: vec![conversation],
            active: 0,
        }
    }

    /// The currently selected variant
    pub fn active(&self) -> &Conversation {
        &self.variants[self.active]
    }

    /// Mutable access to the currently selected variant
    pub fn active_mut(&mut self) -> &mut Conversation {
        &mut self.variants[self.active]
    }

    /// Index of the active variant
    pub fn active_index(&self) -> usize {
        self.active
    }

    /// All variants, oldest first
    pub fn variants(&self) -> &[Conversation] {
        &self.variants
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Role of this turn-slot (the active variant's role)
    pub fn role(&self) -> Role {
        self.active().role
    }

    /// Whether the active variant is currently being streamed into
    pub fn is_replying(&self) -> bool {
        self.active().is_replying
    }

    /// Append a new variant and make it active
    pub fn add_variant(&mut self, conversation: Conversation) {
        self.variants.push(conversation);
        self.active = self.variants.len() - 1;
    }

    /// Select a different variant. Out-of-range indices are ignored.
    pub fn set_active(&mut self, index: usize) -> bool {
        if index < self.variants.len() {
            self.active = index;
            true
        } else {
            false
        }
    }

    /// Remove the variant at `index`, repairing the active index.
    ///
    /// Returns true when the group is now empty (and must be removed by
    /// its owning session).
    pub fn remove_variant(&mut self, index: usize) -> bool {
        if index >= self.variants.len() {
            return self.variants.is_empty();
        }

        self.variants.remove(index);
        if self.variants.is_empty() {
            return true;
        }

        if self.active >= index && self.active > 0 {
            self.active -= 1;
        }
        false
    }

    /// Remove the active variant; see [`Self::remove_variant`].
    pub fn remove_active_variant(&mut self) -> bool {
        self.remove_variant(self.active)
    }

    /// Deep copy with fresh identities and the same active selection
    pub fn copy_deep(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            date: self.date,
            variants: self.variants.iter().map(Conversation::copy_deep).collect(),
            active: self.active,
        }
    }

    /// Estimated token count of the active variant
    pub fn estimate_tokens(&self, config: &ConversationConfig) -> usize {
        self.active().estimate_tokens(config)
    }

    /// Active index invariant, asserted after every mutation in tests
    pub fn invariant_holds(&self) -> bool {
        !self.variants.is_empty() && self.active < self.variants.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_new() {
        let group = ConversationGroup::new(Conversation::user("hi"));
        assert_eq!(group.len(), 1);
        assert_eq!(group.active_index(), 0);
        assert_eq!(group.role(), Role::User);
        assert!(group.invariant_holds());
    }

    #[test]
    fn test_add_variant_activates_it() {
        let mut group = ConversationGroup::new(Conversation::assistant("first"));
        group.add_variant(Conversation::assistant("second"));

        assert_eq!(group.len(), 2);
        assert_eq!(group.active_index(), 1);
        assert_eq!(group.active().content, "second");
        assert!(group.invariant_holds());
    }

    #[test]
    fn test_set_active_valid_and_invalid() {
        let mut group = ConversationGroup::new(Conversation::assistant("a"));
        group.add_variant(Conversation::assistant("b"));

        assert!(group.set_active(0));
        assert_eq!(group.active().content, "a");

        assert!(!group.set_active(5));
        assert_eq!(group.active_index(), 0);
        assert!(group.invariant_holds());
    }

    #[test]
    fn test_remove_variant_repairs_active() {
        let mut group = ConversationGroup::new(Conversation::assistant("a"));
        group.add_variant(Conversation::assistant("b"));
        group.add_variant(Conversation::assistant("c"));
        assert_eq!(group.active_index(), 2);

        let emptied = group.remove_variant(2);
        assert!(!emptied);
        assert_eq!(group.active_index(), 1);
        assert_eq!(group.active().content, "b");
        assert!(group.invariant_holds());
    }

    #[test]
    fn test_remove_variant_before_active() {
        let mut group = ConversationGroup::new(Conversation::assistant("a"));
        group.add_variant(Conversation::assistant("b"));
        group.add_variant(Conversation::assistant("c"));
        group.set_active(2);

        group.remove_variant(0);
        assert_eq!(group.active().content, "c");
        assert!(group.invariant_holds());
    }

    #[test]
    fn test_remove_last_variant_signals_empty() {
        let mut group = ConversationGroup::new(Conversation::assistant("only"));
        let emptied = group.remove_active_variant();
        assert!(emptied);
        assert!(group.is_empty());
    }

    #[test]
    fn test_remove_variant_out_of_range_is_noop() {
        let mut group = ConversationGroup::new(Conversation::assistant("a"));
        let emptied = group.remove_variant(9);
        assert!(!emptied);
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn test_copy_deep_independent() {
        let mut group = ConversationGroup::new(Conversation::assistant("a"));
        group.add_variant(Conversation::assistant("b"));
        group.set_active(0);

        let copy = group.copy_deep();
        assert_ne!(copy.id, group.id);
        assert_eq!(copy.len(), 2);
        assert_eq!(copy.active_index(), 0);
        assert_ne!(copy.variants()[0].id, group.variants()[0].id);
        assert_eq!(copy.variants()[1].content, "b");
    }

    #[test]
    fn test_serde_roundtrip_preserves_active() {
        let mut group = ConversationGroup::new(Conversation::assistant("a"));
        group.add_variant(Conversation::assistant("b"));

        let json = serde_json::to_string(&group).unwrap();
        let parsed: ConversationGroup = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.active_index(), 1);
        assert_eq!(parsed.active().content, "b");
        assert!(parsed.invariant_holds());
    }
}
