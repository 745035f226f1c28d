//! Website generation.
//!
//! A prompt becomes a site in four stages:
//!
//! 1. [`intent`]: the prompt is read into an [`IntentAnalysis`](crate::ai::IntentAnalysis)
//! 2. [`design`] and [`content`], concurrently: design tokens and page copy
//! 3. assembly: the HTML page and stylesheet are rendered from tokens and copy
//! 4. finalization: the site configuration ([`WebsiteConfig`]) is built
//!
//! [`pipeline::WebsitePipeline`] runs the stages and reports [`GenerationProgress`].
//! [`service::GenerationService`] wraps it with the token ledger and persistence.

pub mod content;
pub mod design;
pub mod intent;
pub mod pipeline;
pub mod service;

pub use pipeline::WebsitePipeline;
pub use service::GenerationService;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ai::{DesignTokens, GeneratedContent, IntentAnalysis, SeoMetadata};
use crate::types::UserId;
use content::{Footer, NavLink};

pub const CONFIG_VERSION: &str = "1.0.0";

#[derive(Debug, Clone)]
pub struct WebsiteGenerationInput {
    pub user_id: UserId,
    pub name: String,
    pub subdomain: String,
    pub prompt: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStage {
    Intent,
    Design,
    Content,
    Assembly,
    Finalization,
}

/// A progress event emitted while a site is generated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationProgress {
    pub stage: GenerationStage,
    /// Percent complete, 0 to 100
    pub progress: u8,
    pub message: String,
}

/// Site configuration stored alongside the generated HTML and CSS.
///
/// Keeps the intent and copy so single sections can be regenerated and the design changed later
/// without another full generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteConfig {
    pub name: String,
    pub description: String,
    pub subdomain: String,
    pub pages: Vec<String>,
    pub navigation: Vec<NavLink>,
    pub footer: Footer,
    pub design: DesignTokens,
    pub seo: SeoMetadata,
    pub intent: IntentAnalysis,
    pub content: GeneratedContent,
    pub generated_at: DateTime<Utc>,
    pub version: String,
}

#[derive(Debug, Clone)]
pub struct WebsiteGenerationResult {
    pub html: String,
    pub css: String,
    pub config: WebsiteConfig,
    pub intent: IntentAnalysis,
    pub content: GeneratedContent,
    pub tokens: DesignTokens,
    /// Provider that wrote the page copy
    pub ai_model: String,
}
