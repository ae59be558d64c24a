// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! End-to-end engine flow tests
//!
//! Drives the session controller and orchestrator against the scripted
//! mock adapter: send/stop/regenerate/fork flows, flush coalescing,
//! tool-call continuation, and cascade deletion.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use banter::catalog::{ProviderKind, ProviderRecord};
use banter::chat::{
    Role, RunOutcome, Session, SessionConfig, SessionController, ToolCall, ToolSelection,
};
use banter::error::BanterError;
use banter::llm::{MockAdapter, MockResponse};
use banter::store::{JsonSessionStore, SessionStore};
use banter::tools::{Tool, ToolContext, ToolOutput, ToolRegistry};

struct LookupTool;

#[async_trait]
impl Tool for LookupTool {
    fn name(&self) -> &str {
        "lookup"
    }

    fn description(&self) -> &str {
        "Look up a value"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {"query": {"type": "string"}}
        })
    }

    async fn execute(
        &self,
        _arguments: Value,
        _context: &ToolContext,
    ) -> banter::Result<ToolOutput> {
        Ok(ToolOutput::text("42"))
    }
}

fn controller_with(adapter: MockAdapter) -> SessionController {
    let mut config = SessionConfig::new(ProviderRecord::factory(ProviderKind::OpenAi));
    config.tools = ToolSelection::with(&["lookup"]);

    let mut registry = ToolRegistry::empty();
    registry.register(Arc::new(LookupTool));

    SessionController::new(Session::new(config))
        .with_adapter(Arc::new(adapter))
        .with_registry(Arc::new(registry))
        .with_autogen_titles(false)
        .with_flush_interval(Duration::ZERO)
}

#[tokio::test]
async fn single_exchange_round_trip() {
    let adapter = MockAdapter::new();
    adapter.queue(MockResponse::deltas(&["Hi", " there"]));
    let mut controller = controller_with(adapter);

    controller.send("Hello", vec![]).await.unwrap();
    let outcome = controller.wait_for_idle().await;

    assert_eq!(outcome, Some(RunOutcome::Finalized));
    let session = controller.session();
    let session = session.lock().await;
    assert_eq!(session.groups().len(), 2);
    assert_eq!(session.groups()[0].active().content, "Hello");
    assert_eq!(session.groups()[1].active().content, "Hi there");
    assert!(!session.is_replying());
    assert!(session.error_message.is_empty());
    assert!(session.token_count > 0);
}

#[tokio::test(start_paused = true)]
async fn deltas_inside_flush_window_coalesce_into_one_visible_update() {
    let adapter = MockAdapter::new();
    // two deltas 50ms apart against a 200ms gate
    adapter.queue(MockResponse::deltas(&["Hi", " there"]).with_gap(Duration::from_millis(50)));
    let mut config = SessionConfig::new(ProviderRecord::factory(ProviderKind::OpenAi));
    config.tools = ToolSelection::none();

    let mut controller = SessionController::new(Session::new(config))
        .with_adapter(Arc::new(adapter))
        .with_autogen_titles(false)
        .with_flush_interval(Duration::from_millis(200));

    controller.send("Hello", vec![]).await.unwrap();

    // mid-stream, inside the gate window, nothing has been flushed yet
    tokio::time::sleep(Duration::from_millis(25)).await;
    {
        let session = controller.session();
        let session = session.lock().await;
        assert_eq!(session.groups()[1].active().content, "");
        assert!(session.groups()[1].active().is_replying);
    }

    controller.wait_for_idle().await;

    // the unconditional final flush applied the complete text at once
    let session = controller.session();
    let session = session.lock().await;
    assert_eq!(session.groups()[1].active().content, "Hi there");
    assert!(!session.groups()[1].active().is_replying);
}

#[tokio::test]
async fn second_send_refused_while_run_active() {
    let adapter = MockAdapter::new();
    adapter.queue(MockResponse::deltas(&["slow", " reply"]).with_gap(Duration::from_secs(300)));
    let mut controller = controller_with(adapter);

    controller.send("first", vec![]).await.unwrap();
    assert!(controller.is_streaming());

    let second = controller.send("second", vec![]).await;
    assert!(matches!(second, Err(BanterError::InvalidState(_))));

    // only one user group and one placeholder were created
    {
        let session = controller.session();
        let session = session.lock().await;
        assert_eq!(session.groups().len(), 2);
    }

    controller.stop().await;

    // after the run ends a new send is accepted again
    controller.send("third", vec![]).await.unwrap();
    controller.wait_for_idle().await;
}

#[tokio::test]
async fn tool_continuation_and_cascade_delete_scenario() {
    let adapter = MockAdapter::new();
    adapter.queue(MockResponse::tool_calls(vec![ToolCall::new(
        "call_1",
        "lookup",
        r#"{"query":"x"}"#,
    )]));
    adapter.queue(MockResponse::text("The answer is 42."));
    let mut controller = controller_with(adapter.clone());

    controller.send("What is x?", vec![]).await.unwrap();
    let outcome = controller.wait_for_idle().await;
    assert_eq!(outcome, Some(RunOutcome::Finalized));

    {
        let session = controller.session();
        let session = session.lock().await;
        // user, assistant(tool-call), tool(lookup, "42"), assistant
        assert_eq!(session.groups().len(), 4);
        assert_eq!(session.groups()[2].role(), Role::Tool);
        let response = session.groups()[2].active().tool_response.as_ref().unwrap();
        assert_eq!(response.tool, "lookup");
        assert_eq!(response.content, "42");
        assert_eq!(session.groups()[3].active().content, "The answer is 42.");

        // continuation context ended with the tool result
        let recorded = adapter.recorded();
        assert_eq!(recorded.len(), 2);
        let last = recorded[1].messages.last().unwrap();
        assert_eq!(last.role, Role::Tool);
    }

    // deleting the final assistant group cascades over the tool result
    // and the tool-calling assistant, leaving the user message intact
    controller.delete_group(3).await.unwrap();
    let session = controller.session();
    let session = session.lock().await;
    assert_eq!(session.groups().len(), 1);
    assert_eq!(session.groups()[0].role(), Role::User);
    assert_eq!(session.groups()[0].active().content, "What is x?");
}

#[tokio::test]
async fn tool_batch_materializes_in_request_order() {
    let adapter = MockAdapter::new();
    adapter.queue(MockResponse::tool_calls(vec![
        ToolCall::new("a", "lookup", "{}"),
        ToolCall::new("b", "lookup", "{}"),
        ToolCall::new("c", "lookup", "{}"),
    ]));
    adapter.queue(MockResponse::text("done"));
    let mut controller = controller_with(adapter);

    controller.send("go", vec![]).await.unwrap();
    controller.wait_for_idle().await;

    let session = controller.session();
    let session = session.lock().await;
    let ids: Vec<String> = session
        .groups()
        .iter()
        .filter(|g| g.role() == Role::Tool)
        .map(|g| g.active().tool_response.as_ref().unwrap().call_id.clone())
        .collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test(start_paused = true)]
async fn stop_with_empty_target_removes_placeholder_group() {
    let adapter = MockAdapter::new();
    adapter.queue(MockResponse::deltas(&["never", " seen"]).with_gap(Duration::from_secs(300)));
    let mut controller = controller_with(adapter);
    // keep the gate closed so nothing flushes before cancellation
    controller = controller.with_flush_interval(Duration::from_secs(10));

    controller.send("Hello", vec![]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let outcome = controller.stop().await;

    assert_eq!(outcome, Some(RunOutcome::Cancelled));
    let session = controller.session();
    let session = session.lock().await;
    assert_eq!(session.groups().len(), 1);
    assert_eq!(session.groups()[0].role(), Role::User);
}

#[tokio::test(start_paused = true)]
async fn stop_after_flush_keeps_exactly_flushed_content() {
    let adapter = MockAdapter::new();
    adapter.queue(MockResponse::deltas(&["Hi", " there"]).with_gap(Duration::from_secs(300)));
    let mut controller = controller_with(adapter);

    controller.send("Hello", vec![]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let outcome = controller.stop().await;

    assert_eq!(outcome, Some(RunOutcome::Cancelled));
    let session = controller.session();
    let session = session.lock().await;
    assert_eq!(session.groups().len(), 2);
    assert_eq!(session.groups()[1].active().content, "Hi");
    assert!(!session.groups()[1].active().is_replying);
}

#[tokio::test]
async fn regenerate_keeps_prior_variants_retrievable() {
    let adapter = MockAdapter::new();
    adapter.queue(MockResponse::text("first take"));
    adapter.queue(MockResponse::text("second take"));
    let mut controller = controller_with(adapter);

    controller.send("q", vec![]).await.unwrap();
    controller.wait_for_idle().await;
    controller.regenerate(1).await.unwrap();
    controller.wait_for_idle().await;

    let session = controller.session();
    let mut session = session.lock().await;
    let group = session.group_mut(1).unwrap();
    assert_eq!(group.len(), 2);
    assert_eq!(group.active().content, "second take");
    assert_eq!(group.active_index(), 1);

    // the earlier take is still selectable
    assert!(group.set_active(0));
    assert_eq!(group.active().content, "first take");
    assert!(group.invariant_holds());
}

#[tokio::test]
async fn fork_from_group_copies_prefix_deeply() {
    let adapter = MockAdapter::new();
    for text in ["a1", "a2", "a3"] {
        adapter.queue(MockResponse::text(text));
    }
    let mut controller = controller_with(adapter);

    for prompt in ["q1", "q2", "q3"] {
        controller.send(prompt, vec![]).await.unwrap();
        controller.wait_for_idle().await;
    }

    // 6-group tree; fork through index 2 keeps 3 groups
    let forked = controller.fork(Some(2)).await;
    assert_eq!(forked.groups().len(), 3);
    assert_eq!(forked.groups()[2].active().content, "q2");

    let session = controller.session();
    let session = session.lock().await;
    assert_eq!(session.groups().len(), 6);
    for (original, copy) in session.groups().iter().zip(forked.groups()) {
        assert_ne!(original.id, copy.id);
        assert_ne!(original.active().id, copy.active().id);
    }
}

#[tokio::test]
async fn reset_context_suppresses_history_in_next_request() {
    let adapter = MockAdapter::new();
    adapter.queue(MockResponse::text("a1"));
    adapter.queue(MockResponse::text("a2"));
    let mut controller = controller_with(adapter.clone());

    controller.send("q1", vec![]).await.unwrap();
    controller.wait_for_idle().await;

    // forget everything up to and including the first answer
    controller.reset_context(1).await.unwrap();

    controller.send("q2", vec![]).await.unwrap();
    controller.wait_for_idle().await;

    let recorded = adapter.recorded();
    assert_eq!(recorded.len(), 2);
    // the second request carries only the new user turn
    assert_eq!(recorded[1].messages.len(), 1);
    assert_eq!(recorded[1].messages[0].content, "q2");

    // stored history is untouched
    let session = controller.session();
    let session = session.lock().await;
    assert_eq!(session.groups().len(), 4);
}

#[tokio::test]
async fn provider_error_surfaces_on_session() {
    let adapter = MockAdapter::new();
    adapter.queue(MockResponse::error("model overloaded"));
    let mut controller = controller_with(adapter);

    controller.send("q", vec![]).await.unwrap();
    let outcome = controller.wait_for_idle().await;

    assert_eq!(outcome, Some(RunOutcome::Errored));
    let session = controller.session();
    let session = session.lock().await;
    assert!(session.error_message.contains("model overloaded"));
    // the empty placeholder was cleaned up
    assert_eq!(session.groups().len(), 1);
}

#[tokio::test]
async fn finalized_run_persists_session_best_effort() {
    let dir = tempfile::TempDir::new().unwrap();
    let store: Arc<dyn SessionStore> = Arc::new(JsonSessionStore::new(dir.path()).unwrap());

    let adapter = MockAdapter::new();
    adapter.queue(MockResponse::text("persisted"));
    let mut controller = controller_with(adapter).with_store(store.clone());

    controller.send("save me", vec![]).await.unwrap();
    controller.wait_for_idle().await;

    let loaded = store.load_all().unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].groups().len(), 2);
    assert_eq!(loaded[0].groups()[1].active().content, "persisted");
}

#[tokio::test]
async fn non_streaming_config_uses_single_shot_call() {
    let adapter = MockAdapter::new();
    adapter.queue(MockResponse::text("whole response"));

    let mut config = SessionConfig::new(ProviderRecord::factory(ProviderKind::OpenAi));
    config.stream = false;
    let mut controller = SessionController::new(Session::new(config))
        .with_adapter(Arc::new(adapter.clone()))
        .with_autogen_titles(false);

    controller.send("q", vec![]).await.unwrap();
    controller.wait_for_idle().await;

    let recorded = adapter.recorded();
    assert_eq!(recorded.len(), 1);
    assert!(!recorded[0].streamed);

    let session = controller.session();
    let session = session.lock().await;
    assert_eq!(session.groups()[1].active().content, "whole response");
}
