// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Opportunistic title generation
//!
//! A one-shot non-streaming probe through the same adapter contract,
//! fired off the critical path after the first exchanges. Failures are
//! ignored: a missing title never blocks or errors the main exchange.

use std::sync::Arc;

use super::context::select_context;
use super::orchestrator::SharedSession;
use super::session_config::ConfigPurpose;
use crate::llm::adapter::{ProviderAdapter, ResponseOutcome};

const TITLE_PROMPT: &str =
    "Summarize the conversation so far as a title of at most five words. \
     Reply with the title only, no quotes or punctuation around it.";

const MAX_TITLE_LEN: usize = 60;

/// Generate and apply a session title.
///
/// Skipped for quick sessions and, unless `forced`, for sessions past
/// their first two exchanges.
pub async fn generate_title(
    session: SharedSession,
    adapter: Arc<dyn ProviderAdapter>,
    forced: bool,
) {
    let (messages, config) = {
        let locked = session.lock().await;
        if locked.is_quick {
            return;
        }

        let exchanges = locked
            .adjusted_groups()
            .iter()
            .filter(|g| !(g.active().content.is_empty() && g.is_replying()))
            .count();
        if !forced && !(1..=2).contains(&exchanges) {
            return;
        }

        let mut messages = select_context(&locked);
        messages.retain(|c| !c.content.is_empty());
        if messages.is_empty() {
            return;
        }
        messages.push(super::conversation::Conversation::user(TITLE_PROMPT));
        (messages, locked.config.copy_for(ConfigPurpose::Title))
    };

    match adapter.non_streaming_response(&messages, &config, &[]).await {
        Ok(ResponseOutcome::Content(text)) => {
            let title = clean_title(&text);
            if !title.is_empty() {
                session.lock().await.title = title;
            }
        }
        Ok(ResponseOutcome::ToolCallsRequested(_)) => {
            tracing::debug!("title probe unexpectedly requested tool calls");
        }
        Err(e) => {
            tracing::debug!(error = %e, "title generation failed");
        }
    }
}

/// First line, stripped of wrapping quotes, clamped in length
fn clean_title(raw: &str) -> String {
    let line = raw.lines().next().unwrap_or("").trim();
    let line = line.trim_matches(|c| c == '"' || c == '\'' || c == '`').trim();

    let mut title = line.to_string();
    if title.len() > MAX_TITLE_LEN {
        let mut cut = MAX_TITLE_LEN;
        while !title.is_char_boundary(cut) {
            cut -= 1;
        }
        title.truncate(cut);
    }
    title
}
