// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Provider and model catalog
//!
//! Describes configured backends and the models they expose. Records are
//! read-only for the duration of a generation run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Backend family a provider speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat-completions wire format (also used by compatible servers)
    OpenAi,
    /// Anthropic messages API
    Anthropic,
    /// Google Gemini generateContent API
    Google,
}

impl ProviderKind {
    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Anthropic => "Anthropic",
            ProviderKind::Google => "Google",
        }
    }

    pub fn default_host(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com",
            ProviderKind::Anthropic => "https://api.anthropic.com",
            ProviderKind::Google => "https://generativelanguage.googleapis.com",
        }
    }

    pub fn default_api_key_env(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::Google => "GEMINI_API_KEY",
        }
    }

    /// Seed models shipped for this backend before any catalog refresh
    pub fn default_models(self) -> Vec<AiModel> {
        match self {
            ProviderKind::OpenAi => vec![
                AiModel::chat("gpt-4o", "GPT-4o"),
                AiModel::chat("gpt-4o-mini", "GPT-4o mini"),
                AiModel::image("dall-e-3", "DALL-E 3"),
            ],
            ProviderKind::Anthropic => vec![
                AiModel::chat("claude-sonnet-4-20250514", "Claude Sonnet 4"),
                AiModel::chat("claude-3-5-haiku-20241022", "Claude 3.5 Haiku"),
            ],
            ProviderKind::Google => vec![
                AiModel::chat("gemini-2.0-flash", "Gemini 2.0 Flash"),
                AiModel::chat("gemini-1.5-pro", "Gemini 1.5 Pro"),
            ],
        }
    }
}

/// Capability bucket a model belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Chat,
    Image,
}

/// One model exposed by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiModel {
    /// Wire identifier sent to the backend
    pub code: String,
    /// Human-readable name
    pub name: String,
    /// Capability bucket
    pub kind: ModelKind,
}

impl AiModel {
    pub fn chat(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            kind: ModelKind::Chat,
        }
    }

    pub fn image(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            kind: ModelKind::Image,
        }
    }
}

/// A configured backend: credentials, host, and its model catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub name: String,
    pub host: String,
    pub api_key: String,
    pub kind: ProviderKind,
    pub enabled: bool,

    /// Full model catalog, chat and image models mixed
    pub models: Vec<AiModel>,

    /// Designated model for chat exchanges
    pub chat_model: AiModel,
    /// Designated model for title generation probes
    pub title_model: AiModel,
    /// Designated model for image generation, if the backend has one
    pub image_model: Option<AiModel>,
}

impl ProviderRecord {
    /// Create a provider record with the backend's defaults
    pub fn factory(kind: ProviderKind) -> Self {
        let models = kind.default_models();
        let chat_model = models
            .iter()
            .find(|m| m.kind == ModelKind::Chat)
            .cloned()
            .expect("every backend ships at least one chat model");
        let image_model = models.iter().find(|m| m.kind == ModelKind::Image).cloned();

        Self {
            id: Uuid::new_v4(),
            date: Utc::now(),
            name: kind.name().to_string(),
            host: kind.default_host().to_string(),
            api_key: String::new(),
            kind,
            enabled: true,
            title_model: chat_model.clone(),
            chat_model,
            image_model,
            models,
        }
    }

    pub fn chat_models(&self) -> impl Iterator<Item = &AiModel> {
        self.models.iter().filter(|m| m.kind == ModelKind::Chat)
    }

    pub fn image_models(&self) -> impl Iterator<Item = &AiModel> {
        self.models.iter().filter(|m| m.kind == ModelKind::Image)
    }

    /// Merge a refreshed catalog into the known model list.
    ///
    /// Models already present (by code) are kept as-is; new codes are
    /// appended. Returns how many models were added.
    pub fn merge_models(&mut self, fetched: Vec<AiModel>) -> usize {
        let mut added = 0;
        for model in fetched {
            if !self.models.iter().any(|m| m.code == model.code) {
                self.models.push(model);
                added += 1;
            }
        }
        added
    }
}
