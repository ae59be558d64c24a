// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Provider adapter abstraction and backend implementations

pub mod adapter;
pub mod adapters;
pub mod mock_adapter;

pub use adapter::{
    EventStream, ProviderAdapter, ResponseEvent, ResponseOutcome, ToolSpec, TEST_PROMPT,
};
pub use adapters::{adapter_for, AnthropicAdapter, GoogleAdapter, OpenAiAdapter};
pub use mock_adapter::{MockAdapter, MockResponse};
