//! LLM access for website generation.
//!
//! Three structured operations are needed by the generation pipeline, each defined on
//! [`AiProvider`]:
//!
//! - [`AiProvider::parse_intent`]: free-text prompt to [`IntentAnalysis`]
//! - [`AiProvider::generate_content`]: intent to page copy ([`GeneratedContent`])
//! - [`AiProvider::generate_design_tokens`]: intent to [`DesignTokens`]
//!
//! [`KimiClient`] talks to an OpenAI-compatible chat completions API. [`MockProvider`] returns
//! canned data and never fails. [`AiRouter`] walks primary, then fallbacks, then mock, so callers
//! always get a usable answer.

pub mod kimi;
pub mod mock;
pub mod router;

pub use kimi::KimiClient;
pub use mock::MockProvider;
pub use router::{AiRouter, Routed};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI provider is not configured: {0}")]
    NotConfigured(String),
    #[error("network error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("provider returned no completion")]
    EmptyResponse,
    #[error("malformed {operation} response: {reason}")]
    MalformedResponse { operation: &'static str, reason: String },
}

/// Structured reading of what the user asked for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentAnalysis {
    pub intent: String,
    pub category: String,
    pub features: Vec<String>,
    pub target_audience: String,
    pub tone: String,
    pub style: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorPalette {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub background: String,
    pub surface: String,
    pub text: String,
    pub text_muted: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Typography {
    pub heading_font: String,
    pub body_font: String,
    pub base_size: String,
    pub scale: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spacing {
    pub unit: String,
    pub scale: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeScale {
    pub small: String,
    pub medium: String,
    pub large: String,
}

/// Fixed-shape design system the CSS is generated from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignTokens {
    pub colors: ColorPalette,
    pub typography: Typography,
    pub spacing: Spacing,
    pub border_radius: SizeScale,
    pub shadows: SizeScale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Hero,
    Features,
    About,
    Services,
    Testimonials,
    Cta,
    Contact,
    Footer,
    #[serde(other)]
    Other,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Hero => "hero",
            SectionKind::Features => "features",
            SectionKind::About => "about",
            SectionKind::Services => "services",
            SectionKind::Testimonials => "testimonials",
            SectionKind::Cta => "cta",
            SectionKind::Contact => "contact",
            SectionKind::Footer => "footer",
            SectionKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSection {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SectionKind,
    pub heading: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoMetadata {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
}

/// Page copy for a generated site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub title: String,
    pub headline: String,
    pub subheadline: String,
    pub sections: Vec<ContentSection>,
    pub seo: SeoMetadata,
}

#[async_trait::async_trait]
pub trait AiProvider: Send + Sync {
    /// Short identifier recorded on generated websites
    fn name(&self) -> &str;

    async fn parse_intent(&self, prompt: &str) -> Result<IntentAnalysis, AiError>;

    async fn generate_content(&self, intent: &IntentAnalysis, prompt: &str) -> Result<GeneratedContent, AiError>;

    async fn generate_design_tokens(&self, intent: &IntentAnalysis) -> Result<DesignTokens, AiError>;

    /// Rewrite a single section of existing copy according to `instructions`
    async fn regenerate_section(
        &self,
        intent: &IntentAnalysis,
        section: &ContentSection,
        instructions: &str,
    ) -> Result<ContentSection, AiError>;
}

/// Pull the JSON payload out of an LLM reply, which may wrap it in a markdown code fence.
pub fn extract_json(reply: &str) -> &str {
    let trimmed = reply.trim();
    for fence in ["```json", "```JSON", "```"] {
        if let Some(start) = trimmed.find(fence) {
            let body = &trimmed[start + fence.len()..];
            if let Some(end) = body.find("```") {
                return body[..end].trim();
            }
        }
    }
    trimmed
}

/// Deserialize an LLM reply into `T`, tolerating code fences.
pub fn parse_reply<T: serde::de::DeserializeOwned>(operation: &'static str, reply: &str) -> Result<T, AiError> {
    serde_json::from_str(extract_json(reply)).map_err(|e| AiError::MalformedResponse {
        operation,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_from_fences() {
        assert_eq!(extract_json("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(extract_json("Here you go:\n```\n{\"a\": 1}\n```\nEnjoy"), "{\"a\": 1}");
        assert_eq!(extract_json("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_unclosed_fence_falls_back_to_raw() {
        assert_eq!(extract_json("```json {\"a\": 1}"), "```json {\"a\": 1}");
    }

    #[test]
    fn test_parse_reply_reports_operation() {
        let err = parse_reply::<IntentAnalysis>("intent", "not json").unwrap_err();
        assert!(matches!(err, AiError::MalformedResponse { operation: "intent", .. }));
    }

    #[test]
    fn test_content_section_wire_format() {
        let section: ContentSection = serde_json::from_str(
            r#"{"id":"features","type":"features","heading":"Features","content":"What we offer","items":["Fast"]}"#,
        )
        .unwrap();
        assert_eq!(section.kind, SectionKind::Features);
        assert_eq!(section.items, Some(vec!["Fast".to_string()]));

        let unknown: ContentSection =
            serde_json::from_str(r#"{"id":"faq","type":"faq","heading":"FAQ","content":"Answers"}"#).unwrap();
        assert_eq!(unknown.kind, SectionKind::Other);
    }
}
