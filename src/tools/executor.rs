// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool execution engine
//!
//! Executes requested tool calls strictly sequentially, in arrival order.
//! Failures are scoped: an unknown name, a disallowed tool, bad
//! arguments, or an execution error each become an error-content result
//! for that call and never abort the rest of the batch.

use std::sync::Arc;

use serde_json::Value;

use super::{ToolContext, ToolOutput, ToolRegistry};
use crate::chat::{ToolCall, ToolSelection};

/// Sequential executor over the tool registry
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    context: ToolContext,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, context: ToolContext) -> Self {
        Self { registry, context }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute one call. Never fails outward: every failure mode becomes
    /// an error-content output keyed to the originating call.
    pub async fn execute_call(&self, call: &ToolCall, selection: &ToolSelection) -> ToolOutput {
        if !selection.is_enabled(&call.tool) {
            return ToolOutput::error(format!("Tool '{}' is not enabled", call.tool));
        }

        let Some(tool) = self.registry.get(&call.tool) else {
            return ToolOutput::error(format!("Unknown tool: {}", call.tool));
        };

        let arguments: Value = if call.arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            match serde_json::from_str(&call.arguments) {
                Ok(value) => value,
                Err(e) => {
                    return ToolOutput::error(format!("Invalid tool arguments: {}", e));
                }
            }
        };

        tracing::debug!(tool = %call.tool, "executing tool call");
        match tool.execute(arguments, &self.context).await {
            Ok(output) => output,
            Err(e) => ToolOutput::error(e.to_string()),
        }
    }

    /// Execute a batch in request order, pairing each output with its
    /// originating call id.
    pub async fn execute_batch(
        &self,
        calls: &[ToolCall],
        selection: &ToolSelection,
    ) -> Vec<(String, ToolOutput)> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let output = self.execute_call(call, selection).await;
            results.push((call.call_id.clone(), output));
        }
        results
    }
}
