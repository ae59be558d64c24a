// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Backend adapter implementations
//!
//! One adapter per backend family, all implementing [`ProviderAdapter`].

pub mod anthropic;
pub mod google;
pub mod openai;

pub use anthropic::AnthropicAdapter;
pub use google::GoogleAdapter;
pub use openai::OpenAiAdapter;

use std::sync::Arc;

use crate::catalog::{ProviderKind, ProviderRecord};
use crate::chat::TypedData;
use crate::llm::adapter::ProviderAdapter;

/// Construct the adapter for a provider record's backend family
pub fn adapter_for(record: &ProviderRecord) -> Arc<dyn ProviderAdapter> {
    match record.kind {
        ProviderKind::OpenAi => Arc::new(OpenAiAdapter::from_record(record)),
        ProviderKind::Anthropic => Arc::new(AnthropicAdapter::from_record(record)),
        ProviderKind::Google => Arc::new(GoogleAdapter::from_record(record)),
    }
}

/// Join a host and path into a full endpoint URL.
///
/// Hosts configured without a scheme get https; explicit http hosts are
/// kept as-is so self-hosted and test endpoints work.
pub(crate) fn endpoint(host: &str, path: &str) -> String {
    let host = host.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}/{}", host, path)
    } else {
        format!("https://{}/{}", host, path)
    }
}

/// Explanatory text substituted for attachment kinds a backend cannot
/// carry inline. Degrading beats failing the whole request.
pub(crate) fn attachment_stand_in(attachment: &TypedData) -> String {
    format!(
        "[{} attachment '{}' is not supported by this backend; tell the user it was omitted]",
        attachment.extension().to_uppercase(),
        attachment.file_name
    )
}

/// Collapse an arbitrary (possibly non-JSON) error body into one line
pub(crate) fn collapse_body(body: &str) -> String {
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.len() > 300 {
        format!("{}...", &collapsed[..297])
    } else {
        collapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_adds_https() {
        assert_eq!(
            endpoint("api.openai.com", "v1/models"),
            "https://api.openai.com/v1/models"
        );
    }

    #[test]
    fn test_endpoint_keeps_explicit_scheme() {
        assert_eq!(
            endpoint("http://127.0.0.1:8080/", "/v1/models"),
            "http://127.0.0.1:8080/v1/models"
        );
    }

    #[test]
    fn test_adapter_for_matches_kind() {
        for kind in [
            ProviderKind::OpenAi,
            ProviderKind::Anthropic,
            ProviderKind::Google,
        ] {
            let record = ProviderRecord::factory(kind);
            assert_eq!(adapter_for(&record).kind(), kind);
        }
    }

    #[test]
    fn test_attachment_stand_in_names_the_file() {
        let attachment = TypedData::new("report.pdf", "application/pdf", vec![]);
        let text = attachment_stand_in(&attachment);
        assert!(text.contains("PDF"));
        assert!(text.contains("report.pdf"));
    }

    #[test]
    fn test_collapse_body() {
        assert_eq!(collapse_body("a\n  b\tc"), "a b c");
        let long = "x".repeat(400);
        assert!(collapse_body(&long).len() <= 300);
    }
}
