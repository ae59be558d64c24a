// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for banter
//!
//! This module defines all error types used throughout the engine.

use thiserror::Error;

/// Main error type for banter operations
#[derive(Error, Debug)]
pub enum BanterError {
    /// Provider/backend errors
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Tool execution errors (scoped to a single tool call)
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    /// An operation was requested in a state that does not permit it
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// An attachment could not be converted to a backend message part
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Session store errors
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backup import/export errors
    #[error("Backup error: {0}")]
    Backup(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Backend-specific error types
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Authentication failed (invalid API key)
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    /// Rate limited by the backend
    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u32),

    /// Requested model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// Malformed or unexpected response from the backend
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// Backend returned an error body
    #[error("Provider error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Timeout waiting for response
    #[error("Request timed out")]
    Timeout,

    /// Streaming error mid-response
    #[error("Streaming error: {0}")]
    Stream(String),

    /// The backend has no endpoint for the requested capability
    #[error("Unsupported capability: {0}")]
    Unsupported(String),
}

/// Result type alias for banter operations
pub type Result<T> = std::result::Result<T, BanterError>;

impl From<anyhow::Error> for BanterError {
    fn from(err: anyhow::Error) -> Self {
        BanterError::ToolExecution(err.to_string())
    }
}
