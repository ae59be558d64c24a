// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for banter
//!
//! Handles loading and saving settings from ~/.banter/settings.json

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::catalog::{ProviderKind, ProviderRecord};
use crate::error::{BanterError, Result};

/// Main settings structure, stored in ~/.banter/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Provider backend configurations
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Default settings for new sessions
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Conversation and token estimation settings
    #[serde(default)]
    pub conversation: ConversationConfig,
}

/// Configuration for provider backends
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    /// OpenAI (or OpenAI-compatible) configuration
    #[serde(default)]
    pub openai: BackendConfig,

    /// Anthropic configuration
    #[serde(default)]
    pub anthropic: BackendConfig,

    /// Google Gemini configuration
    #[serde(default)]
    pub google: BackendConfig,
}

/// Per-backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for the API key
    #[serde(default)]
    pub api_key_env: String,

    /// Base URL override (for custom/self-hosted endpoints)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

/// Default settings for new sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default provider name: "openai", "anthropic", or "google"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Whether responses stream by default
    #[serde(default = "default_stream")]
    pub stream: bool,

    /// Whether session titles are generated automatically
    #[serde(default = "default_autogen_titles")]
    pub autogen_titles: bool,

    /// Minimum interval between visible content flushes, in milliseconds
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            stream: default_stream(),
            autogen_titles: default_autogen_titles(),
            flush_interval_ms: default_flush_interval_ms(),
        }
    }
}

/// Conversation and token estimation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Heuristic characters-per-token ratio
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: u32,

    /// Fixed per-message overhead, in estimated tokens
    #[serde(default = "default_message_overhead_tokens")]
    pub message_overhead_tokens: u32,

    /// Flat token estimate for an image attachment
    #[serde(default = "default_image_token_estimate")]
    pub image_token_estimate: u32,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            chars_per_token: default_chars_per_token(),
            message_overhead_tokens: default_message_overhead_tokens(),
            image_token_estimate: default_image_token_estimate(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_stream() -> bool {
    true
}

fn default_autogen_titles() -> bool {
    true
}

fn default_flush_interval_ms() -> u64 {
    200
}

fn default_chars_per_token() -> u32 {
    4
}

fn default_message_overhead_tokens() -> u32 {
    20
}

fn default_image_token_estimate() -> u32 {
    85
}

impl Settings {
    /// Banter home directory (~/.banter)
    pub fn banter_home() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".banter")
    }

    /// Path to the settings file
    pub fn settings_path() -> PathBuf {
        Self::banter_home().join("settings.json")
    }

    /// Directory holding persisted session records
    pub fn sessions_dir() -> PathBuf {
        Self::banter_home().join("sessions")
    }

    /// Ensure the banter directories exist
    pub fn ensure_directories() -> Result<()> {
        std::fs::create_dir_all(Self::banter_home())?;
        std::fs::create_dir_all(Self::sessions_dir())?;
        Ok(())
    }

    /// Load settings from disk, falling back to defaults if absent
    pub fn load() -> Result<Self> {
        let path = Self::settings_path();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map_err(|e| BanterError::Config(format!("invalid settings file: {}", e)))
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<()> {
        Self::ensure_directories()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(Self::settings_path(), content)?;
        Ok(())
    }

    /// Resolve the API key for a backend: direct value first, then env var
    pub fn api_key_for(&self, kind: ProviderKind) -> Option<String> {
        let backend = self.backend(kind);
        if let Some(key) = &backend.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }

        let env_name = if backend.api_key_env.is_empty() {
            kind.default_api_key_env()
        } else {
            backend.api_key_env.as_str()
        };
        std::env::var(env_name).ok().filter(|k| !k.is_empty())
    }

    /// Build a provider record for a backend from these settings
    pub fn build_provider(&self, kind: ProviderKind) -> Result<ProviderRecord> {
        let api_key = self.api_key_for(kind).ok_or_else(|| {
            BanterError::Config(format!(
                "No API key found for {}. Set {} or add it to {}.",
                kind.name(),
                kind.default_api_key_env(),
                Self::settings_path().display()
            ))
        })?;

        let mut record = ProviderRecord::factory(kind);
        record.api_key = api_key;
        if let Some(host) = &self.backend(kind).host {
            record.host = host.clone();
        }
        Ok(record)
    }

    /// Parse a provider name from the CLI / defaults section
    pub fn resolve_kind(&self, requested: Option<&str>) -> Result<ProviderKind> {
        let name = requested.unwrap_or(&self.defaults.provider);
        match name {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "google" => Ok(ProviderKind::Google),
            other => Err(BanterError::Config(format!("unknown provider: {}", other))),
        }
    }

    fn backend(&self, kind: ProviderKind) -> &BackendConfig {
        match kind {
            ProviderKind::OpenAi => &self.providers.openai,
            ProviderKind::Anthropic => &self.providers.anthropic,
            ProviderKind::Google => &self.providers.google,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert_eq!(settings.defaults.provider, "openai");
        assert!(settings.defaults.stream);
        assert!(settings.defaults.autogen_titles);
        assert_eq!(settings.defaults.flush_interval_ms, 200);
    }

    #[test]
    fn test_conversation_config_defaults() {
        let config = ConversationConfig::default();
        assert_eq!(config.chars_per_token, 4);
        assert_eq!(config.message_overhead_tokens, 20);
        assert_eq!(config.image_token_estimate, 85);
    }

    #[test]
    fn test_settings_roundtrip() {
        let mut settings = Settings::default();
        settings.defaults.provider = "anthropic".to_string();
        settings.providers.anthropic.api_key = Some("sk-test".to_string());

        let json = serde_json::to_string(&settings).unwrap();
        let parsed: Settings = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.defaults.provider, "anthropic");
        assert_eq!(
            parsed.providers.anthropic.api_key,
            Some("sk-test".to_string())
        );
    }

    #[test]
    fn test_settings_partial_json_uses_defaults() {
        let parsed: Settings = serde_json::from_str(r#"{"defaults":{"stream":false}}"#).unwrap();
        assert!(!parsed.defaults.stream);
        assert_eq!(parsed.defaults.provider, "openai");
        assert_eq!(parsed.conversation.chars_per_token, 4);
    }

    #[test]
    fn test_api_key_direct_value_wins() {
        let mut settings = Settings::default();
        settings.providers.openai.api_key = Some("sk-direct".to_string());
        assert_eq!(
            settings.api_key_for(ProviderKind::OpenAi),
            Some("sk-direct".to_string())
        );
    }

    #[test]
    fn test_resolve_kind() {
        let settings = Settings::default();
        assert_eq!(
            settings.resolve_kind(Some("google")).unwrap(),
            ProviderKind::Google
        );
        assert_eq!(
            settings.resolve_kind(None).unwrap(),
            ProviderKind::OpenAi
        );
        assert!(settings.resolve_kind(Some("petrel")).is_err());
    }

    #[test]
    fn test_build_provider_without_key_fails() {
        let mut settings = Settings::default();
        settings.providers.openai.api_key = None;
        settings.providers.openai.api_key_env = "BANTER_NONEXISTENT_KEY_54321".to_string();

        let result = settings.build_provider(ProviderKind::OpenAi);
        assert!(result.is_err());
    }

    #[test]
    fn test_build_provider_host_override() {
        let mut settings = Settings::default();
        settings.providers.openai.api_key = Some("sk-test".to_string());
        settings.providers.openai.host = Some("http://localhost:8080".to_string());

        let record = settings.build_provider(ProviderKind::OpenAi).unwrap();
        assert_eq!(record.host, "http://localhost:8080");
        assert_eq!(record.api_key, "sk-test");
    }
}
