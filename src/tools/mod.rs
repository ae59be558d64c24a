// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool system for banter
//!
//! Provides the framework for tools the model can request during a
//! generation: a registry of trait objects, structured results carrying
//! text and/or binary payloads, and the sequential batch executor.

pub mod builtin;
pub mod executor;

pub use executor::ToolExecutor;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::AiModel;
use crate::chat::{ToolSelection, TypedData};
use crate::error::Result;
use crate::llm::adapter::{ProviderAdapter, ToolSpec};

/// Structured result of one tool invocation
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Text result, or error text when `is_error`
    pub text: String,
    /// Binary payloads produced by the tool
    pub data: Vec<TypedData>,
    /// Whether the invocation failed
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            data: Vec::new(),
            is_error: false,
        }
    }

    pub fn with_data(text: impl Into<String>, data: Vec<TypedData>) -> Self {
        Self {
            text: text.into(),
            data,
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            text: message.into(),
            data: Vec::new(),
            is_error: true,
        }
    }
}

/// Context provided to tools during execution
#[derive(Clone)]
pub struct ToolContext {
    /// HTTP client shared across invocations
    pub http: reqwest::Client,
    /// Adapter of the session's provider, for tools that call back into it
    pub adapter: Arc<dyn ProviderAdapter>,
    /// The provider's designated image model, if any
    pub image_model: Option<AiModel>,
}

impl ToolContext {
    pub fn new(adapter: Arc<dyn ProviderAdapter>, image_model: Option<AiModel>) -> Self {
        Self {
            http: reqwest::Client::new(),
            adapter,
            image_model,
        }
    }
}

/// A tool the model can invoke
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name as advertised to the backend
    fn name(&self) -> &str;

    /// One-line description for the backend's tool listing
    fn description(&self) -> &str;

    /// JSON Schema for the tool's arguments
    fn parameters(&self) -> Value;

    /// Run the tool
    async fn execute(&self, arguments: Value, context: &ToolContext) -> Result<ToolOutput>;

    /// Definition advertised to provider adapters
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Registry of available tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ToolRegistry {
    pub fn empty() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registry preloaded with the built-in tools
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(builtin::FetchUrlTool));
        registry.register(Arc::new(builtin::GenerateImageTool));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Specs for the tools enabled in a session
    pub fn specs_for(&self, selection: &ToolSelection) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self
            .tools
            .values()
            .filter(|t| selection.is_enabled(t.name()))
            .map(|t| t.spec())
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }
}
