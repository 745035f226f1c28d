//! Canned responses used when no LLM is configured or every provider failed.

use super::{AiError, AiProvider, ContentSection, DesignTokens, GeneratedContent, IntentAnalysis};
use crate::generation::{content, design};

/// Deterministic provider that never fails
#[derive(Debug, Clone, Copy, Default)]
pub struct MockProvider;

impl MockProvider {
    pub const NAME: &'static str = "mock";

    /// A generic business site reading, whatever was asked for
    pub fn intent(&self) -> IntentAnalysis {
        IntentAnalysis {
            intent: "Business website".to_string(),
            category: "business".to_string(),
            features: ["home", "about", "services", "contact"].map(String::from).to_vec(),
            target_audience: "general".to_string(),
            tone: "professional".to_string(),
            style: "modern".to_string(),
        }
    }

    /// Category-appropriate stock copy
    pub fn content(&self, intent: &IntentAnalysis) -> GeneratedContent {
        content::default_content(intent)
    }

    /// The category colour scheme on the stock type and spacing scale
    pub fn tokens(&self, intent: &IntentAnalysis) -> DesignTokens {
        design::default_tokens(intent)
    }
}

#[async_trait::async_trait]
impl AiProvider for MockProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn parse_intent(&self, _prompt: &str) -> Result<IntentAnalysis, AiError> {
        Ok(self.intent())
    }

    async fn generate_content(&self, intent: &IntentAnalysis, _prompt: &str) -> Result<GeneratedContent, AiError> {
        Ok(self.content(intent))
    }

    async fn generate_design_tokens(&self, intent: &IntentAnalysis) -> Result<DesignTokens, AiError> {
        Ok(self.tokens(intent))
    }

    /// Sections are returned unchanged
    async fn regenerate_section(
        &self,
        _intent: &IntentAnalysis,
        section: &ContentSection,
        _instructions: &str,
    ) -> Result<ContentSection, AiError> {
        Ok(section.clone())
    }
}
