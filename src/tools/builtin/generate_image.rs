// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Image generation tool
//!
//! Calls back into the session's provider adapter using its designated
//! image model. The binary payloads it produces are attached directly to
//! the follow-up assistant message instead of being resubmitted to the
//! chat model.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{BanterError, Result};
use crate::tools::{Tool, ToolContext, ToolOutput};

pub struct GenerateImageTool;

#[async_trait]
impl Tool for GenerateImageTool {
    fn name(&self) -> &str {
        "generate_image"
    }

    fn description(&self) -> &str {
        "Generate an image from a text prompt"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "Description of the image to generate"
                }
            },
            "required": ["prompt"]
        })
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> Result<ToolOutput> {
        let prompt = arguments["prompt"].as_str().ok_or_else(|| {
            BanterError::ToolExecution("missing required argument: prompt".to_string())
        })?;

        let model = context.image_model.as_ref().ok_or_else(|| {
            BanterError::ToolExecution(
                "this provider has no image model configured".to_string(),
            )
        })?;

        let images = context.adapter.generate_image(prompt, model).await?;
        let count = images.len();
        Ok(ToolOutput::with_data(
            format!("Generated {} image(s)", count),
            images,
        ))
    }
}
