// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Context selection
//!
//! Pure projections from the session tree to the ordered message list
//! submitted to a provider. No side effects; the orchestrator and
//! controller call these at request-build time.

use super::conversation::{Conversation, Role};
use super::session::Session;

/// The ordered provider context: each included group's active variant,
/// honoring the context-reset marker.
pub fn select_context(session: &Session) -> Vec<Conversation> {
    session
        .adjusted_groups()
        .iter()
        .map(|g| g.active().clone())
        .collect()
}

/// Context for a regeneration run.
///
/// The last user message's text is substituted with `regen_content`
/// (its attachments are preserved) and the trailing assistant message,
/// the empty regeneration target, is dropped.
pub fn select_for_regeneration(session: &Session, regen_content: &str) -> Vec<Conversation> {
    let mut conversations = select_context(session);

    if let Some(last_user) = conversations.iter().rposition(|c| c.role == Role::User) {
        let attachments = conversations[last_user].attachments.clone();
        conversations[last_user] =
            Conversation::user_with_attachments(regen_content, attachments);
    }
    if let Some(last_assistant) = conversations
        .iter()
        .rposition(|c| c.role == Role::Assistant)
    {
        conversations.remove(last_assistant);
    }

    conversations
}

/// Context for a tool-loop continuation: the current context minus the
/// freshly appended, still-empty assistant placeholder.
pub fn select_for_continuation(session: &Session) -> Vec<Conversation> {
    let mut conversations = select_context(session);
    if conversations
        .last()
        .map(|c| c.role == Role::Assistant && c.content.is_empty())
        .unwrap_or(false)
    {
        conversations.pop();
    }
    conversations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ProviderKind, ProviderRecord};
    use crate::chat::conversation::TypedData;
    use crate::chat::session_config::SessionConfig;

    fn session() -> Session {
        Session::new(SessionConfig::new(ProviderRecord::factory(
            ProviderKind::OpenAi,
        )))
    }

    #[test]
    fn test_select_context_uses_active_variants() {
        let mut s = session();
        s.add_group(Conversation::user("q"));
        s.add_group(Conversation::assistant("v1"));
        s.group_mut(1)
            .unwrap()
            .add_variant(Conversation::assistant("v2"));

        let context = select_context(&s);
        assert_eq!(context.len(), 2);
        assert_eq!(context[1].content, "v2");

        s.group_mut(1).unwrap().set_active(0);
        let context = select_context(&s);
        assert_eq!(context[1].content, "v1");
    }

    #[test]
    fn test_select_context_honors_marker() {
        let mut s = session();
        s.add_group(Conversation::user("old"));
        s.add_group(Conversation::assistant("old answer"));
        s.add_group(Conversation::user("new"));
        s.reset_context_at(1).unwrap();

        let context = select_context(&s);
        assert_eq!(context.len(), 1);
        assert_eq!(context[0].content, "new");
    }

    #[test]
    fn test_marker_round_trip_restores_output() {
        let mut s = session();
        s.add_group(Conversation::user("a"));
        s.add_group(Conversation::assistant("b"));
        let before = select_context(&s);

        s.reset_context_at(0).unwrap();
        s.reset_context_at(0).unwrap();
        let after = select_context(&s);

        assert_eq!(before.len(), after.len());
        assert!(before
            .iter()
            .zip(&after)
            .all(|(x, y)| x.content == y.content));
    }

    #[test]
    fn test_selector_length_matches_groups_after_marker() {
        let mut s = session();
        for i in 0..6 {
            s.add_group(Conversation::user(format!("m{}", i)));
        }
        for marker in 0..6 {
            s.reset_marker = Some(marker);
            assert_eq!(select_context(&s).len(), s.groups().len() - marker - 1);
        }
    }

    #[test]
    fn test_regeneration_substitutes_and_drops() {
        let mut s = session();
        s.add_group(Conversation::user_with_attachments(
            "original question",
            vec![TypedData::png("x.png", vec![1])],
        ));
        s.add_group(Conversation::assistant("stale answer"));
        s.prepare_regeneration(1).unwrap();

        let context = select_for_regeneration(&s, "original question");
        assert_eq!(context.len(), 1);
        assert_eq!(context[0].role, Role::User);
        assert_eq!(context[0].content, "original question");
        // attachments survive the substitution
        assert_eq!(context[0].attachments.len(), 1);
    }

    #[test]
    fn test_continuation_drops_trailing_placeholder() {
        let mut s = session();
        s.add_group(Conversation::user("q"));
        s.add_group(Conversation::assistant("answer with tools"));
        s.add_group(Conversation::assistant_placeholder());

        let context = select_for_continuation(&s);
        assert_eq!(context.len(), 2);
        assert_eq!(context[1].content, "answer with tools");
    }

    #[test]
    fn test_continuation_keeps_nonempty_trailing_assistant() {
        let mut s = session();
        s.add_group(Conversation::user("q"));
        s.add_group(Conversation::assistant("done"));

        let context = select_for_continuation(&s);
        assert_eq!(context.len(), 2);
    }

    #[test]
    fn test_empty_session_selects_nothing() {
        let s = session();
        assert!(select_context(&s).is_empty());
        assert!(select_for_continuation(&s).is_empty());
    }
}
