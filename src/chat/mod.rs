// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation engine
//!
//! The branching session tree, context selection, stream orchestration,
//! and the user-facing session controller.

pub mod context;
pub mod controller;
pub mod conversation;
pub mod flush;
pub mod group;
pub mod orchestrator;
pub mod session;
pub mod session_config;
pub mod title;

pub use controller::SessionController;
pub use conversation::{Conversation, Role, ToolCall, ToolResponse, TypedData};
pub use group::ConversationGroup;
pub use orchestrator::{RunOutcome, SharedSession, StreamOrchestrator};
pub use session::Session;
pub use session_config::{ConfigPurpose, SessionConfig, ToolSelection};
