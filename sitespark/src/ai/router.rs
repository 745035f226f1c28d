//! Provider selection with ordered fallback.
//!
//! Each call tries the primary provider, then every fallback in order, and finally the mock. A
//! failure is logged and the next provider is tried; there is no retry or backoff. Because the
//! mock cannot fail, router calls are infallible.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use super::{AiError, AiProvider, ContentSection, DesignTokens, GeneratedContent, IntentAnalysis, KimiClient, MockProvider};
use crate::config::AiConfig;

/// A routed result and the provider that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Routed<T> {
    pub value: T,
    pub provider: String,
}

impl<T> Routed<T> {
    fn new(value: T, provider: &str) -> Self {
        Self {
            value,
            provider: provider.to_string(),
        }
    }

    pub fn is_mock(&self) -> bool {
        self.provider == MockProvider::NAME
    }
}

pub struct AiRouter {
    primary: Option<Arc<dyn AiProvider>>,
    fallbacks: Vec<Arc<dyn AiProvider>>,
    mock: MockProvider,
    force_mock: AtomicBool,
}

impl AiRouter {
    pub fn new(primary: Option<Arc<dyn AiProvider>>, fallbacks: Vec<Arc<dyn AiProvider>>) -> Self {
        Self {
            primary,
            fallbacks,
            mock: MockProvider,
            force_mock: AtomicBool::new(false),
        }
    }

    /// Router over the configured Kimi client. A missing or unusable key leaves only the mock.
    pub fn from_config(config: &AiConfig) -> Self {
        let primary: Option<Arc<dyn AiProvider>> = match KimiClient::from_config(config) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!("Primary AI provider unavailable, serving mock data: {e}");
                None
            }
        };

        let router = Self::new(primary, Vec::new());
        if config.force_mock {
            router.enable_fallback();
        }
        router
    }

    /// Serve mock data without calling any provider
    pub fn enable_fallback(&self) {
        self.force_mock.store(true, Ordering::Relaxed);
        info!("AI router forced onto mock data");
    }

    pub fn disable_fallback(&self) {
        self.force_mock.store(false, Ordering::Relaxed);
        info!("AI router using live providers");
    }

    pub fn is_using_fallback(&self) -> bool {
        self.force_mock.load(Ordering::Relaxed)
    }

    /// Name recorded when the primary provider answers
    pub fn primary_name(&self) -> &str {
        self.primary.as_deref().map_or(MockProvider::NAME, |p| p.name())
    }

    fn live_providers(&self) -> Vec<&dyn AiProvider> {
        if self.is_using_fallback() {
            return Vec::new();
        }
        self.primary.iter().chain(self.fallbacks.iter()).map(|p| p.as_ref()).collect()
    }

    fn log_failure(operation: &str, provider: &dyn AiProvider, error: &AiError) {
        warn!(operation, provider = provider.name(), "AI provider failed, trying next: {error}");
    }

    pub async fn parse_intent(&self, prompt: &str) -> Routed<IntentAnalysis> {
        for provider in self.live_providers() {
            match provider.parse_intent(prompt).await {
                Ok(value) => return Routed::new(value, provider.name()),
                Err(e) => Self::log_failure("intent", provider, &e),
            }
        }
        Routed::new(self.mock.intent(), MockProvider::NAME)
    }

    pub async fn generate_content(&self, intent: &IntentAnalysis, prompt: &str) -> Routed<GeneratedContent> {
        for provider in self.live_providers() {
            match provider.generate_content(intent, prompt).await {
                Ok(value) => return Routed::new(value, provider.name()),
                Err(e) => Self::log_failure("content", provider, &e),
            }
        }
        Routed::new(self.mock.content(intent), MockProvider::NAME)
    }

    pub async fn generate_design_tokens(&self, intent: &IntentAnalysis) -> Routed<DesignTokens> {
        for provider in self.live_providers() {
            match provider.generate_design_tokens(intent).await {
                Ok(value) => return Routed::new(value, provider.name()),
                Err(e) => Self::log_failure("design", provider, &e),
            }
        }
        Routed::new(self.mock.tokens(intent), MockProvider::NAME)
    }

    pub async fn regenerate_section(
        &self,
        intent: &IntentAnalysis,
        section: &ContentSection,
        instructions: &str,
    ) -> Routed<ContentSection> {
        for provider in self.live_providers() {
            match provider.regenerate_section(intent, section, instructions).await {
                Ok(value) => return Routed::new(value, provider.name()),
                Err(e) => Self::log_failure("section", provider, &e),
            }
        }
        Routed::new(section.clone(), MockProvider::NAME)
    }
}
