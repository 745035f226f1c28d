//! The staged generation pipeline.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use super::content::{self, ContentGenerator};
use super::design::{self, DesignGenerator};
use super::intent::{self, IntentParser};
use super::{
    CONFIG_VERSION, GenerationProgress, GenerationStage, WebsiteConfig, WebsiteGenerationInput, WebsiteGenerationResult,
};
use crate::ai::{AiRouter, ContentSection, DesignTokens, GeneratedContent, IntentAnalysis};
use crate::errors::Error;
use crate::types::abbrev_uuid;

/// A page after one of its sections was rewritten
#[derive(Debug, Clone)]
pub struct RegeneratedSection {
    pub section: ContentSection,
    pub config: WebsiteConfig,
    pub html: String,
    pub ai_model: String,
}

/// A page after a design change
#[derive(Debug, Clone)]
pub struct RedesignedSite {
    pub config: WebsiteConfig,
    pub html: String,
    pub css: String,
}

#[derive(Clone)]
pub struct WebsitePipeline {
    intent_parser: IntentParser,
    content_generator: ContentGenerator,
    design_generator: DesignGenerator,
}

async fn report(
    progress: Option<&mpsc::Sender<GenerationProgress>>,
    stage: GenerationStage,
    percent: u8,
    message: &str,
) {
    let Some(sender) = progress else {
        return;
    };

    let event = GenerationProgress {
        stage,
        progress: percent,
        message: message.to_string(),
    };
    if let Err(e) = sender.send(event).await {
        warn!(?stage, percent, "Progress listener went away: {e}");
    }
}

/// Site configuration from the generated parts
pub fn generate_config(
    input: &WebsiteGenerationInput,
    intent: &IntentAnalysis,
    tokens: &DesignTokens,
    content: &GeneratedContent,
) -> WebsiteConfig {
    let now = Utc::now();
    let pages = intent::determine_page_structure(intent);

    WebsiteConfig {
        name: input.name.clone(),
        description: input.description.clone().unwrap_or_default(),
        subdomain: input.subdomain.clone(),
        navigation: content::navigation_links(&pages),
        pages,
        footer: content::footer_content(now.year()),
        design: tokens.clone(),
        seo: content.seo.clone(),
        intent: intent.clone(),
        content: content.clone(),
        generated_at: now,
        version: CONFIG_VERSION.to_string(),
    }
}

impl WebsitePipeline {
    pub fn new(router: Arc<AiRouter>) -> Self {
        Self {
            intent_parser: IntentParser::new(router.clone()),
            content_generator: ContentGenerator::new(router.clone()),
            design_generator: DesignGenerator::new(router),
        }
    }

    /// Generate a complete site from a prompt.
    ///
    /// Progress events go to `progress` if given. A closed channel is logged and ignored.
    #[instrument(skip_all, fields(user_id = %abbrev_uuid(&input.user_id), subdomain = %input.subdomain), err)]
    pub async fn generate(
        &self,
        input: &WebsiteGenerationInput,
        progress: Option<&mpsc::Sender<GenerationProgress>>,
    ) -> Result<WebsiteGenerationResult, Error> {
        info!("Starting website generation pipeline");

        report(progress, GenerationStage::Intent, 10, "Analyzing your requirements...").await;
        let intent = self.intent_parser.parse_intent(&input.prompt).await.value;
        debug!(?intent, "Intent analysis complete");

        report(progress, GenerationStage::Design, 30, "Creating your design system...").await;
        let tokens_future = self.design_generator.generate_design_tokens(&intent);

        report(progress, GenerationStage::Content, 50, "Generating compelling content...").await;
        let content_future = self.content_generator.generate_content(&intent, &input.prompt);

        let (tokens, content) = tokio::join!(tokens_future, content_future);
        let (tokens, ai_model, content) = (tokens.value, content.provider, content.value);

        report(progress, GenerationStage::Assembly, 70, "Assembling your website...").await;
        let html = design::html_layout(&content, &tokens, Utc::now().year())?;

        report(progress, GenerationStage::Assembly, 85, "Applying styles...").await;
        let css = design::global_styles(&tokens)?;

        report(progress, GenerationStage::Finalization, 95, "Finalizing your website...").await;
        let config = generate_config(input, &intent, &tokens, &content);

        report(progress, GenerationStage::Finalization, 100, "Your website is ready!").await;
        info!(%ai_model, "Website generation complete");

        Ok(WebsiteGenerationResult {
            html,
            css,
            config,
            intent,
            content,
            tokens,
            ai_model,
        })
    }

    /// Rewrite one section of a generated site and re-render the page.
    pub async fn regenerate_section(
        &self,
        config: &WebsiteConfig,
        section_id: &str,
        instructions: &str,
    ) -> Result<RegeneratedSection, Error> {
        let position = config
            .content
            .sections
            .iter()
            .position(|s| s.id == section_id)
            .ok_or_else(|| Error::not_found("Section", section_id))?;

        let routed = self
            .content_generator
            .regenerate_section(&config.intent, &config.content.sections[position], instructions)
            .await;

        let mut config = config.clone();
        config.content.sections[position] = routed.value.clone();
        let html = design::html_layout(&config.content, &config.design, Utc::now().year())?;

        Ok(RegeneratedSection {
            section: routed.value,
            config,
            html,
            ai_model: routed.provider,
        })
    }

    /// Apply colour overrides and re-render the stylesheet and page.
    pub fn update_design(&self, config: &WebsiteConfig, changes: &BTreeMap<String, String>) -> Result<RedesignedSite, Error> {
        let mut config = config.clone();
        config.design = design::update_design(&config.design, changes)?;

        Ok(RedesignedSite {
            css: design::global_styles(&config.design)?,
            html: design::html_layout(&config.content, &config.design, Utc::now().year())?,
            config,
        })
    }
}
