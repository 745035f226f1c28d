//! Prompt interpretation and page planning.

use std::sync::Arc;

use tracing::{debug, info};

use crate::ai::{AiRouter, IntentAnalysis, Routed};
use crate::types::truncate_chars;

/// Reading used when a provider answers with a blank intent
pub fn default_intent(prompt: &str) -> IntentAnalysis {
    IntentAnalysis {
        intent: truncate_chars(prompt.trim(), 100),
        category: "business".to_string(),
        features: ["home", "about", "contact"].map(String::from).to_vec(),
        target_audience: "general".to_string(),
        tone: "professional".to_string(),
        style: "modern".to_string(),
    }
}

/// Fill blank fields of a provider answer from [`default_intent`] and normalise the category.
fn normalize(mut intent: IntentAnalysis, prompt: &str) -> IntentAnalysis {
    let defaults = default_intent(prompt);

    if intent.intent.trim().is_empty() {
        intent.intent = defaults.intent;
    }
    intent.category = intent.category.trim().to_lowercase();
    if intent.category.is_empty() {
        intent.category = defaults.category;
    }
    intent.features.retain(|f| !f.trim().is_empty());
    if intent.features.is_empty() {
        intent.features = defaults.features;
    }
    if intent.target_audience.trim().is_empty() {
        intent.target_audience = defaults.target_audience;
    }
    if intent.tone.trim().is_empty() {
        intent.tone = defaults.tone;
    }
    if intent.style.trim().is_empty() {
        intent.style = defaults.style;
    }
    intent
}

fn push_unique(list: &mut Vec<String>, value: impl Into<String>) {
    let value = value.into();
    if !list.contains(&value) {
        list.push(value);
    }
}

/// Category, features, style, tone and the longer words of the intent, without duplicates.
pub fn extract_keywords(intent: &IntentAnalysis) -> Vec<String> {
    let mut keywords = Vec::new();

    push_unique(&mut keywords, intent.category.as_str());
    for feature in &intent.features {
        push_unique(&mut keywords, feature.to_lowercase());
    }
    push_unique(&mut keywords, intent.style.as_str());
    push_unique(&mut keywords, intent.tone.as_str());

    for word in intent.intent.to_lowercase().split_whitespace() {
        if word.chars().count() > 3 {
            push_unique(&mut keywords, word);
        }
    }

    keywords
}

/// Pages the site should have: home, the category's pages, and any implied by features.
pub fn determine_page_structure(intent: &IntentAnalysis) -> Vec<String> {
    let category_pages: &[&str] = match intent.category.as_str() {
        "business" => &["about", "services", "contact"],
        "portfolio" => &["about", "projects", "contact"],
        "blog" => &["about", "blog", "contact"],
        "ecommerce" => &["products", "about", "contact"],
        "landing" => &["features", "pricing", "contact"],
        "personal" => &["about", "blog", "contact"],
        _ => &["about", "contact"],
    };

    let mut pages = vec!["home".to_string()];
    for page in category_pages {
        push_unique(&mut pages, *page);
    }

    let has = |feature: &str| intent.features.iter().any(|f| f == feature);
    if has("blog") {
        push_unique(&mut pages, "blog");
    }
    if has("shop") || has("store") {
        push_unique(&mut pages, "products");
    }
    if has("gallery") || has("portfolio") {
        push_unique(&mut pages, "gallery");
    }

    pages
}

/// Intent analysis through the AI router
#[derive(Clone)]
pub struct IntentParser {
    router: Arc<AiRouter>,
}

impl IntentParser {
    pub fn new(router: Arc<AiRouter>) -> Self {
        Self { router }
    }

    pub async fn parse_intent(&self, prompt: &str) -> Routed<IntentAnalysis> {
        debug!(prompt = %truncate_chars(prompt, 100), "Parsing intent");
        let routed = self.router.parse_intent(prompt).await;
        let routed = Routed {
            value: normalize(routed.value, prompt),
            provider: routed.provider,
        };

        info!(
            intent = %routed.value.intent,
            category = %routed.value.category,
            features = routed.value.features.len(),
            provider = %routed.provider,
            "Intent parsed"
        );
        routed
    }
}
