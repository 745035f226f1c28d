//! Page copy, navigation and footer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ai::{AiRouter, ContentSection, GeneratedContent, IntentAnalysis, Routed, SectionKind, SeoMetadata};
use crate::types::{capitalize, truncate_chars};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavLink {
    pub label: String,
    pub href: String,
}

impl NavLink {
    fn new(label: &str, href: &str) -> Self {
        Self {
            label: label.to_string(),
            href: href.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footer {
    pub copyright: String,
    pub links: Vec<NavLink>,
}

/// Headline and subheadline per site category
fn category_headlines(category: &str) -> (&'static str, &'static str) {
    match category {
        "portfolio" => (
            "Showcasing Creative Excellence",
            "Explore our portfolio of stunning work and creative solutions.",
        ),
        "blog" => ("Insights & Inspiration", "Discover thought-provoking articles and expert insights."),
        "ecommerce" => (
            "Quality Products, Exceptional Service",
            "Shop our curated collection of premium products.",
        ),
        "landing" => (
            "Your Solution Starts Here",
            "Join thousands of satisfied customers who trust our platform.",
        ),
        "personal" => (
            "Welcome to My World",
            "A glimpse into my journey, thoughts, and creative endeavors.",
        ),
        _ => (
            "Transform Your Business Today",
            "We provide innovative solutions to help your business grow and succeed.",
        ),
    }
}

fn section(id: &str, kind: SectionKind, heading: &str, content: String) -> ContentSection {
    ContentSection {
        id: id.to_string(),
        kind,
        heading: heading.to_string(),
        content,
        items: None,
    }
}

/// Stock copy for the intent's category: hero, features, about and call to action.
pub fn default_content(intent: &IntentAnalysis) -> GeneratedContent {
    let (headline, subheadline) = category_headlines(&intent.category);

    let sections = vec![
        section("hero", SectionKind::Hero, headline, subheadline.to_string()),
        ContentSection {
            items: Some(intent.features.iter().take(3).map(|f| capitalize(f)).collect()),
            ..section(
                "features",
                SectionKind::Features,
                "Key Features",
                "Discover what makes us unique and why our customers choose us.".to_string(),
            )
        },
        section(
            "about",
            SectionKind::About,
            "About Us",
            format!(
                "We are dedicated to serving {} with {} solutions that make a difference.",
                intent.target_audience, intent.tone
            ),
        ),
        section(
            "cta",
            SectionKind::Cta,
            "Get Started Today",
            "Ready to take the next step? Contact us to learn more about how we can help.".to_string(),
        ),
    ];

    GeneratedContent {
        title: truncate_chars(&intent.intent, 50),
        headline: headline.to_string(),
        subheadline: subheadline.to_string(),
        sections,
        seo: SeoMetadata {
            title: truncate_chars(&intent.intent, 60),
            description: truncate_chars(subheadline, 160),
            keywords: intent.features.iter().take(5).cloned().collect(),
        },
    }
}

/// One link per page; `home` maps to the site root.
pub fn navigation_links(pages: &[String]) -> Vec<NavLink> {
    pages
        .iter()
        .map(|page| NavLink {
            label: capitalize(page),
            href: if page == "home" { "/".to_string() } else { format!("/{page}") },
        })
        .collect()
}

pub fn footer_content(year: i32) -> Footer {
    Footer {
        copyright: format!("© {year} All rights reserved."),
        links: vec![
            NavLink::new("Privacy Policy", "/privacy"),
            NavLink::new("Terms of Service", "/terms"),
            NavLink::new("Contact", "/contact"),
        ],
    }
}

/// Page copy generation through the AI router
#[derive(Clone)]
pub struct ContentGenerator {
    router: Arc<AiRouter>,
}

impl ContentGenerator {
    pub fn new(router: Arc<AiRouter>) -> Self {
        Self { router }
    }

    /// Generate copy for the whole page. A provider answer without sections gets the stock ones.
    pub async fn generate_content(&self, intent: &IntentAnalysis, prompt: &str) -> Routed<GeneratedContent> {
        debug!(intent = %intent.intent, "Generating content");
        let mut routed = self.router.generate_content(intent, prompt).await;

        if routed.value.sections.is_empty() {
            debug!(provider = %routed.provider, "Provider returned no sections, using defaults");
            routed.value.sections = default_content(intent).sections;
        }

        info!(
            title = %routed.value.title,
            sections = routed.value.sections.len(),
            provider = %routed.provider,
            "Content generated"
        );
        routed
    }

    pub async fn regenerate_section(
        &self,
        intent: &IntentAnalysis,
        section: &ContentSection,
        instructions: &str,
    ) -> Routed<ContentSection> {
        debug!(section = %section.id, "Regenerating section");
        let mut routed = self.router.regenerate_section(intent, section, instructions).await;
        // The section keeps its place in the page whatever the provider says
        routed.value.id = section.id.clone();
        routed
    }
}
