// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Built-in tools

mod fetch_url;
mod generate_image;

pub use fetch_url::FetchUrlTool;
pub use generate_image::GenerateImageTool;
