// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! URL fetching tool
//!
//! Fetches a web page and reduces it to plain text the model can read.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{BanterError, Result};
use crate::tools::{Tool, ToolContext, ToolOutput};

/// Maximum characters returned to the model
const MAX_TEXT_LEN: usize = 8_000;

pub struct FetchUrlTool;

#[async_trait]
impl Tool for FetchUrlTool {
    fn name(&self) -> &str {
        "fetch_url"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its text content"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> Result<ToolOutput> {
        let url = arguments["url"].as_str().ok_or_else(|| {
            BanterError::ToolExecution("missing required argument: url".to_string())
        })?;

        let response = context
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| BanterError::ToolExecution(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Ok(ToolOutput::error(format!(
                "Fetch failed with status {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| BanterError::ToolExecution(format!("could not read body: {}", e)))?;

        let mut text = html_to_text(&body);
        if text.len() > MAX_TEXT_LEN {
            let mut cut = MAX_TEXT_LEN;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
            text.push_str("\n[truncated]");
        }

        Ok(ToolOutput::text(text))
    }
}

/// Crude HTML-to-text: drops script/style blocks, strips tags, collapses
/// whitespace. Good enough for model consumption; not a real parser.
fn html_to_text(html: &str) -> String {
    let without_scripts = strip_element(html, "script");
    let without_styles = strip_element(&without_scripts, "style");

    let mut text = String::with_capacity(without_styles.len() / 2);
    let mut in_tag = false;
    for c in without_styles.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove `<name ...>...</name>` blocks, case-insensitively.
/// ASCII lowercasing keeps byte offsets aligned with the original.
fn strip_element(html: &str, name: &str) -> String {
    let open = format!("<{}", name);
    let close = format!("</{}>", name);
    let lower = html.to_ascii_lowercase();

    let mut result = String::with_capacity(html.len());
    let mut pos = 0;
    while let Some(start) = lower[pos..].find(&open) {
        let start = pos + start;
        result.push_str(&html[pos..start]);
        match lower[start..].find(&close) {
            Some(end) => pos = start + end + close.len(),
            None => {
                // unterminated block: drop the rest
                return result;
            }
        }
    }
    result.push_str(&html[pos..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text_strips_tags() {
        let html = "<html><body><h1>Title</h1><p>Hello <b>world</b></p></body></html>";
        assert_eq!(html_to_text(html), "Title Hello world");
    }

    #[test]
    fn test_html_to_text_drops_scripts_and_styles() {
        let html = "<head><style>body { color: red }</style></head>\
                    <body><script>alert('x')</script><p>Visible</p></body>";
        assert_eq!(html_to_text(html), "Visible");
    }

    #[test]
    fn test_html_to_text_plain_text_passthrough() {
        assert_eq!(html_to_text("just   plain\n\ntext"), "just plain text");
    }

    #[test]
    fn test_strip_element_unterminated() {
        let html = "before<script>never closed";
        assert_eq!(strip_element(html, "script"), "before");
    }

    #[test]
    fn test_strip_element_case_insensitive() {
        let html = "a<SCRIPT>x</SCRIPT>b";
        assert_eq!(strip_element(html, "script"), "ab");
    }

    #[test]
    fn test_parameters_schema() {
        let tool = FetchUrlTool;
        let params = tool.parameters();
        assert_eq!(params["type"], "object");
        assert_eq!(params["required"][0], "url");
    }

    #[tokio::test]
    async fn test_missing_url_argument_fails() {
        use crate::llm::MockAdapter;
        use std::sync::Arc;

        let tool = FetchUrlTool;
        let context = ToolContext::new(Arc::new(MockAdapter::new()), None);
        let result = tool.execute(json!({}), &context).await;
        assert!(result.is_err());
    }
}
