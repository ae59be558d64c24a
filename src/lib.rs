// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! banter - a branching, multi-provider conversation engine for LLM
//! chat clients.
//!
//! This crate exposes the session engine used by the `banter` CLI and by
//! embedding front ends. Rendering is explicitly out of scope; the
//! engine exposes the session object graph plus streaming status for
//! observation.
//!
//! Architecture highlights:
//! - `chat`: the branching session tree, context selection, stream
//!   orchestration with the tool-call continuation loop, and the
//!   user-facing session controller
//! - `llm`: the provider adapter contract and one adapter per backend
//!   family (OpenAI-compatible, Anthropic, Google)
//! - `tools`: tool registry and the sequential batch executor
//! - `store`: the session persistence boundary
//! - `backup`: the versioned JSON export/import format
//! - `catalog`, `config`: provider/model records and user settings

pub mod backup;
pub mod catalog;
pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod store;
pub mod tools;

pub use error::{BanterError, ProviderError, Result};
