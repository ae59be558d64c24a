// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Per-session generation configuration
//!
//! A `SessionConfig` is snapshotted (cloned) into every orchestrator run.
//! The controller only mutates it between runs, never while a stream is
//! active.

use serde::{Deserialize, Serialize};

use crate::catalog::{AiModel, ProviderRecord};
use crate::config::ConversationConfig;

/// What a session's config is tuned for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigPurpose {
    /// Ordinary chat session
    Chat,
    /// One-shot quick query
    Quick,
    /// Title generation probe
    Title,
}

impl ConfigPurpose {
    /// Title prefix applied when forking a session for this purpose
    pub fn title_prefix(self) -> &'static str {
        match self {
            ConfigPurpose::Chat => "(fork)",
            ConfigPurpose::Quick => "(quick)",
            ConfigPurpose::Title => "(title)",
        }
    }
}

/// Which tools a session exposes to the model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSelection {
    /// Names of enabled tools
    pub enabled: Vec<String>,
}

impl ToolSelection {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(names: &[&str]) -> Self {
        Self {
            enabled: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.iter().any(|n| n == name)
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }

    /// Rough token cost of advertising the enabled tools
    pub fn estimate_tokens(&self, config: &ConversationConfig) -> usize {
        let chars_per_token = config.chars_per_token.max(1) as usize;
        self.enabled
            .iter()
            .map(|n| n.len() / chars_per_token + config.message_overhead_tokens as usize)
            .sum()
    }
}

/// Generation configuration shared by a session and its in-flight runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Backend this session talks to
    pub provider: ProviderRecord,
    /// Selected model
    pub model: AiModel,

    /// Sampling parameters; `None` leaves the backend default
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub max_tokens: Option<u32>,

    /// Whether responses stream token-by-token
    pub stream: bool,

    /// System prompt prepended to every request
    pub system_prompt: String,

    /// Tools exposed to the model
    pub tools: ToolSelection,

    /// What this config is tuned for
    pub purpose: ConfigPurpose,

    /// Token estimation heuristics
    #[serde(default)]
    pub conversation: ConversationConfig,
}

impl SessionConfig {
    /// Create a chat config using the provider's designated chat model
    pub fn new(provider: ProviderRecord) -> Self {
        let model = provider.chat_model.clone();
        Self {
            provider,
            model,
            temperature: None,
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
            max_tokens: None,
            stream: true,
            system_prompt: String::new(),
            tools: ToolSelection::none(),
            purpose: ConfigPurpose::Chat,
            conversation: ConversationConfig::default(),
        }
    }

    /// Set the system prompt
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the maximum response length
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Enable or disable streaming
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Set the enabled tool set
    pub fn with_tools(mut self, tools: ToolSelection) -> Self {
        self.tools = tools;
        self
    }

    /// Derive a config for a different purpose.
    ///
    /// Title probes use the provider's designated title model, drop the
    /// tool set, and never stream.
    pub fn copy_for(&self, purpose: ConfigPurpose) -> Self {
        let mut copy = self.clone();
        copy.purpose = purpose;
        if purpose == ConfigPurpose::Title {
            copy.model = self.provider.title_model.clone();
            copy.tools = ToolSelection::none();
            copy.stream = false;
            copy.system_prompt = String::new();
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ProviderKind;

    fn provider() -> ProviderRecord {
        ProviderRecord::factory(ProviderKind::OpenAi)
    }

    #[test]
    fn test_new_uses_chat_model() {
        let record = provider();
        let expected = record.chat_model.code.clone();
        let config = SessionConfig::new(record);

        assert_eq!(config.model.code, expected);
        assert!(config.stream);
        assert!(config.tools.is_empty());
        assert_eq!(config.purpose, ConfigPurpose::Chat);
    }

    #[test]
    fn test_builder_chain() {
        let config = SessionConfig::new(provider())
            .with_system_prompt("Be terse.")
            .with_temperature(0.4)
            .with_max_tokens(1024)
            .with_stream(false)
            .with_tools(ToolSelection::with(&["fetch_url"]));

        assert_eq!(config.system_prompt, "Be terse.");
        assert_eq!(config.temperature, Some(0.4));
        assert_eq!(config.max_tokens, Some(1024));
        assert!(!config.stream);
        assert!(config.tools.is_enabled("fetch_url"));
    }

    #[test]
    fn test_copy_for_title_drops_tools_and_stream() {
        let config = SessionConfig::new(provider())
            .with_system_prompt("Be helpful.")
            .with_tools(ToolSelection::with(&["fetch_url", "generate_image"]));

        let title = config.copy_for(ConfigPurpose::Title);
        assert_eq!(title.purpose, ConfigPurpose::Title);
        assert_eq!(title.model, title.provider.title_model);
        assert!(title.tools.is_empty());
        assert!(!title.stream);
        assert!(title.system_prompt.is_empty());

        // the original is untouched
        assert!(config.stream);
        assert!(!config.tools.is_empty());
    }

    #[test]
    fn test_copy_for_quick_keeps_model() {
        let config = SessionConfig::new(provider());
        let quick = config.copy_for(ConfigPurpose::Quick);
        assert_eq!(quick.purpose, ConfigPurpose::Quick);
        assert_eq!(quick.model, config.model);
    }

    #[test]
    fn test_tool_selection() {
        let selection = ToolSelection::with(&["fetch_url"]);
        assert!(selection.is_enabled("fetch_url"));
        assert!(!selection.is_enabled("generate_image"));
        assert!(ToolSelection::none().is_empty());
    }

    #[test]
    fn test_tool_selection_token_estimate() {
        let config = ConversationConfig::default();
        assert_eq!(ToolSelection::none().estimate_tokens(&config), 0);
        assert!(ToolSelection::with(&["fetch_url"]).estimate_tokens(&config) > 0);
    }
}
