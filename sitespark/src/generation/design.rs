//! Design tokens, CSS and the single-page HTML layout.

use std::collections::BTreeMap;
use std::sync::Arc;

use minijinja::{Environment, Value, context};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ai::{
    AiRouter, ColorPalette, ContentSection, DesignTokens, GeneratedContent, IntentAnalysis, MockProvider, Routed, SizeScale,
    Spacing, Typography,
};
use crate::errors::Error;

const SYSTEM_FONT_STACK: &str = "system-ui, -apple-system, sans-serif";

/// Primary, secondary and accent colours per site category
fn category_colors(category: &str) -> (&'static str, &'static str, &'static str) {
    match category {
        "portfolio" => ("#7C3AED", "#A78BFA", "#EC4899"),
        "blog" => ("#059669", "#10B981", "#F97316"),
        "ecommerce" => ("#DC2626", "#EF4444", "#22C55E"),
        "landing" => ("#0891B2", "#06B6D4", "#8B5CF6"),
        "personal" => ("#4338CA", "#6366F1", "#14B8A6"),
        _ => ("#1E40AF", "#3B82F6", "#F59E0B"),
    }
}

/// Stock design system in the category's colour scheme.
pub fn default_tokens(intent: &IntentAnalysis) -> DesignTokens {
    let (primary, secondary, accent) = category_colors(&intent.category);

    DesignTokens {
        colors: ColorPalette {
            primary: primary.to_string(),
            secondary: secondary.to_string(),
            accent: accent.to_string(),
            background: "#FFFFFF".to_string(),
            surface: "#F9FAFB".to_string(),
            text: "#111827".to_string(),
            text_muted: "#6B7280".to_string(),
        },
        typography: Typography {
            heading_font: SYSTEM_FONT_STACK.to_string(),
            body_font: SYSTEM_FONT_STACK.to_string(),
            base_size: "16px".to_string(),
            scale: 1.25,
        },
        spacing: Spacing {
            unit: "1rem".to_string(),
            scale: vec![0.25, 0.5, 1.0, 1.5, 2.0, 3.0, 4.0, 6.0, 8.0],
        },
        border_radius: SizeScale {
            small: "0.25rem".to_string(),
            medium: "0.5rem".to_string(),
            large: "1rem".to_string(),
        },
        shadows: SizeScale {
            small: "0 1px 2px 0 rgba(0, 0, 0, 0.05)".to_string(),
            medium: "0 4px 6px -1px rgba(0, 0, 0, 0.1)".to_string(),
            large: "0 20px 25px -5px rgba(0, 0, 0, 0.1)".to_string(),
        },
    }
}

/// `:root` block exposing every token as a CSS custom property.
///
/// Fails if any token could escape its declaration; see [`validate_tokens`].
pub fn css_variables(tokens: &DesignTokens) -> Result<String, Error> {
    validate_tokens(tokens)?;
    let colors = &tokens.colors;
    let typography = &tokens.typography;

    let mut lines = vec![
        ":root {".to_string(),
        "  /* Colors */".to_string(),
        format!("  --color-primary: {};", colors.primary),
        format!("  --color-secondary: {};", colors.secondary),
        format!("  --color-accent: {};", colors.accent),
        format!("  --color-background: {};", colors.background),
        format!("  --color-surface: {};", colors.surface),
        format!("  --color-text: {};", colors.text),
        format!("  --color-text-muted: {};", colors.text_muted),
        String::new(),
        "  /* Typography */".to_string(),
        format!("  --font-heading: {};", typography.heading_font),
        format!("  --font-body: {};", typography.body_font),
        format!("  --font-size-base: {};", typography.base_size),
        format!("  --font-scale: {};", typography.scale),
        String::new(),
        "  /* Spacing */".to_string(),
        format!("  --spacing-unit: {};", tokens.spacing.unit),
    ];

    for (i, step) in tokens.spacing.scale.iter().enumerate() {
        lines.push(format!("  --spacing-{}: calc(var(--spacing-unit) * {step});", i + 1));
    }

    lines.extend([
        String::new(),
        "  /* Border Radius */".to_string(),
        format!("  --radius-small: {};", tokens.border_radius.small),
        format!("  --radius-medium: {};", tokens.border_radius.medium),
        format!("  --radius-large: {};", tokens.border_radius.large),
        String::new(),
        "  /* Shadows */".to_string(),
        format!("  --shadow-small: {};", tokens.shadows.small),
        format!("  --shadow-medium: {};", tokens.shadows.medium),
        format!("  --shadow-large: {};", tokens.shadows.large),
        "}".to_string(),
    ]);

    Ok(lines.join("\n"))
}

const BASE_STYLES: &str = r#"* {
  margin: 0;
  padding: 0;
  box-sizing: border-box;
}

body {
  font-family: var(--font-body);
  font-size: var(--font-size-base);
  line-height: 1.6;
  color: var(--color-text);
  background-color: var(--color-background);
}

h1, h2, h3, h4, h5, h6 {
  font-family: var(--font-heading);
  font-weight: 700;
  line-height: 1.2;
  margin-bottom: var(--spacing-3);
}

h1 { font-size: calc(var(--font-size-base) * pow(var(--font-scale), 4)); }
h2 { font-size: calc(var(--font-size-base) * pow(var(--font-scale), 3)); }
h3 { font-size: calc(var(--font-size-base) * pow(var(--font-scale), 2)); }
h4 { font-size: calc(var(--font-size-base) * var(--font-scale)); }

p {
  margin-bottom: var(--spacing-3);
}

a {
  color: var(--color-primary);
  text-decoration: none;
  transition: color 0.2s ease;
}

a:hover {
  color: var(--color-secondary);
}

.container {
  max-width: 1200px;
  margin: 0 auto;
  padding: 0 var(--spacing-4);
}

.btn {
  display: inline-flex;
  align-items: center;
  justify-content: center;
  padding: var(--spacing-2) var(--spacing-4);
  font-size: var(--font-size-base);
  font-weight: 500;
  border-radius: var(--radius-medium);
  border: none;
  cursor: pointer;
  transition: all 0.2s ease;
}

.btn-primary {
  background-color: var(--color-primary);
  color: white;
}

.btn-primary:hover {
  background-color: var(--color-secondary);
  color: white;
}

.btn-secondary {
  background-color: transparent;
  color: var(--color-primary);
  border: 2px solid var(--color-primary);
}

.btn-secondary:hover {
  background-color: var(--color-primary);
  color: white;
}"#;

const LAYOUT_STYLES: &str = r#"/* Header */
.header {
  position: sticky;
  top: 0;
  background: var(--color-background);
  border-bottom: 1px solid rgba(0,0,0,0.1);
  z-index: 100;
}

.header-content {
  display: flex;
  align-items: center;
  justify-content: space-between;
  padding: var(--spacing-3) var(--spacing-4);
}

.logo {
  font-size: 1.5rem;
  font-weight: 700;
  color: var(--color-primary);
}

.nav {
  display: flex;
  gap: var(--spacing-4);
}

.nav a {
  font-weight: 500;
}

/* Sections */
.section {
  padding: var(--spacing-8) 0;
}

.section-hero {
  background: linear-gradient(135deg, var(--color-primary) 0%, var(--color-secondary) 100%);
  color: white;
  text-align: center;
  padding: var(--spacing-8) 0;
}

.section-hero h1 {
  color: white;
  margin-bottom: var(--spacing-4);
}

.section-hero p {
  font-size: 1.25rem;
  opacity: 0.9;
  max-width: 600px;
  margin: 0 auto var(--spacing-6);
}

.section-features {
  background: var(--color-surface);
}

.features-grid {
  display: grid;
  grid-template-columns: repeat(auto-fit, minmax(280px, 1fr));
  gap: var(--spacing-6);
  margin-top: var(--spacing-6);
}

.feature-card {
  background: var(--color-background);
  padding: var(--spacing-6);
  border-radius: var(--radius-large);
  box-shadow: var(--shadow-medium);
}

.feature-card h3 {
  color: var(--color-primary);
  margin-bottom: var(--spacing-3);
}

.section-cta {
  text-align: center;
  background: var(--color-surface);
}

.section-cta .btn {
  margin-top: var(--spacing-4);
}

/* Footer */
.footer {
  background: var(--color-text);
  color: white;
  padding: var(--spacing-8) 0;
  text-align: center;
}

.footer-links {
  display: flex;
  justify-content: center;
  gap: var(--spacing-4);
  margin-bottom: var(--spacing-4);
}

.footer-links a {
  color: rgba(255,255,255,0.7);
}

.footer-links a:hover {
  color: white;
}"#;

const PAGE_TEMPLATE: &str = include_str!("../../templates/page.html");

/// Longest accepted non-colour token value
const MAX_TOKEN_LEN: usize = 200;

/// `#RGB`, `#RGBA`, `#RRGGBB`, `#RRGGBBAA`, `rgb(...)` or `rgba(...)` with numeric arguments.
pub fn is_css_color(value: &str) -> bool {
    if let Some(hex) = value.strip_prefix('#') {
        return matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit());
    }

    let lower = value.to_ascii_lowercase();
    let Some(args) = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    else {
        return false;
    };

    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    matches!(parts.len(), 3 | 4)
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '%'))
}

/// A declaration value that cannot end the declaration, the rule or the `<style>` element
fn is_safe_css_value(value: &str) -> bool {
    !value.trim().is_empty()
        && value.len() <= MAX_TOKEN_LEN
        && !value.contains("/*")
        && !value.chars().any(|c| c.is_control() || matches!(c, '<' | '>' | '{' | '}' | ';' | '\\'))
}

/// Check every token before it is written into CSS.
pub fn validate_tokens(tokens: &DesignTokens) -> Result<(), Error> {
    let colors = &tokens.colors;
    for (name, value) in [
        ("primary", &colors.primary),
        ("secondary", &colors.secondary),
        ("accent", &colors.accent),
        ("background", &colors.background),
        ("surface", &colors.surface),
        ("text", &colors.text),
        ("textMuted", &colors.text_muted),
    ] {
        if !is_css_color(value) {
            return Err(Error::bad_request(format!("Invalid colour value for '{name}'")));
        }
    }

    let typography = &tokens.typography;
    for (name, value) in [
        ("headingFont", &typography.heading_font),
        ("bodyFont", &typography.body_font),
        ("baseSize", &typography.base_size),
        ("spacing.unit", &tokens.spacing.unit),
        ("borderRadius.small", &tokens.border_radius.small),
        ("borderRadius.medium", &tokens.border_radius.medium),
        ("borderRadius.large", &tokens.border_radius.large),
        ("shadows.small", &tokens.shadows.small),
        ("shadows.medium", &tokens.shadows.medium),
        ("shadows.large", &tokens.shadows.large),
    ] {
        if !is_safe_css_value(value) {
            return Err(Error::bad_request(format!("Invalid design token '{name}'")));
        }
    }

    if !typography.scale.is_finite() || tokens.spacing.scale.iter().any(|step| !step.is_finite()) {
        return Err(Error::bad_request("Design scales must be finite numbers"));
    }
    Ok(())
}

/// The site stylesheet: custom properties followed by the reset, typography and buttons
pub fn global_styles(tokens: &DesignTokens) -> Result<String, Error> {
    Ok(format!("{}\n\n{BASE_STYLES}", css_variables(tokens)?))
}

/// One section as the page template sees it
#[derive(Debug, Serialize)]
struct SectionView<'a> {
    id: &'a str,
    kind: &'static str,
    heading: &'a str,
    content: &'a str,
    items: Vec<&'a str>,
}

impl<'a> From<&'a ContentSection> for SectionView<'a> {
    fn from(section: &'a ContentSection) -> Self {
        Self {
            id: &section.id,
            kind: section.kind.as_str(),
            heading: &section.heading,
            content: &section.content,
            items: section.items.iter().flatten().map(String::as_str).collect(),
        }
    }
}

fn template_error(e: minijinja::Error) -> Error {
    Error::Internal {
        operation: format!("render page template: {e}"),
    }
}

/// Render the complete page. The first four sections become the header navigation.
///
/// Text from the content is auto-escaped by the template; the stylesheet is inserted verbatim
/// once the tokens have passed [`validate_tokens`].
pub fn html_layout(content: &GeneratedContent, tokens: &DesignTokens, year: i32) -> Result<String, Error> {
    let styles = format!("{}\n\n{LAYOUT_STYLES}", global_styles(tokens)?);

    let mut env = Environment::new();
    env.add_template("page.html", PAGE_TEMPLATE).map_err(template_error)?;
    let page = env.get_template("page.html").map_err(template_error)?;

    page.render(context! {
        title => &content.title,
        seo_title => &content.seo.title,
        seo_description => &content.seo.description,
        styles => Value::from_safe_string(styles),
        sections => content.sections.iter().map(SectionView::from).collect::<Vec<_>>(),
        year => year,
    })
    .map_err(template_error)
}

/// Apply colour overrides keyed by palette field (`primary`, `textMuted`, ...).
///
/// Returns the updated tokens. Unknown keys and anything but a hex or `rgb()` colour are rejected.
pub fn update_design(tokens: &DesignTokens, changes: &BTreeMap<String, String>) -> Result<DesignTokens, Error> {
    let mut updated = tokens.clone();

    for (key, value) in changes {
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::bad_request(format!("Colour for '{key}' must not be empty")));
        }
        if !is_css_color(value) {
            return Err(Error::bad_request(format!("Invalid colour value for '{key}'")));
        }

        let slot = match key.as_str() {
            "primary" => &mut updated.colors.primary,
            "secondary" => &mut updated.colors.secondary,
            "accent" => &mut updated.colors.accent,
            "background" => &mut updated.colors.background,
            "surface" => &mut updated.colors.surface,
            "text" => &mut updated.colors.text,
            "textMuted" | "text-muted" => &mut updated.colors.text_muted,
            other => return Err(Error::bad_request(format!("Unknown design colour '{other}'"))),
        };
        *slot = value.to_string();
    }

    Ok(updated)
}

/// Design token generation through the AI router
#[derive(Clone)]
pub struct DesignGenerator {
    router: Arc<AiRouter>,
}

impl DesignGenerator {
    pub fn new(router: Arc<AiRouter>) -> Self {
        Self { router }
    }

    pub async fn generate_design_tokens(&self, intent: &IntentAnalysis) -> Routed<DesignTokens> {
        debug!(intent = %intent.intent, "Generating design tokens");
        let mut routed = self.router.generate_design_tokens(intent).await;
        if let Err(e) = validate_tokens(&routed.value) {
            warn!(provider = %routed.provider, "Discarding unusable design tokens: {e}");
            routed = Routed {
                value: default_tokens(intent),
                provider: MockProvider::NAME.to_string(),
            };
        }
        info!(primary = %routed.value.colors.primary, provider = %routed.provider, "Design tokens generated");
        routed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AiError, AiProvider, SectionKind};
    use crate::generation::content::default_content;

    fn intent(category: &str) -> IntentAnalysis {
        IntentAnalysis {
            category: category.to_string(),
            ..MockProvider.intent()
        }
    }

    #[test]
    fn test_category_colour_schemes() {
        assert_eq!(default_tokens(&intent("business")).colors.primary, "#1E40AF");
        assert_eq!(default_tokens(&intent("ecommerce")).colors.accent, "#22C55E");
        assert_eq!(default_tokens(&intent("landing")).colors.secondary, "#06B6D4");
        // Unknown categories get the business scheme
        assert_eq!(default_tokens(&intent("bakery")), default_tokens(&intent("business")));
    }

    #[test]
    fn test_css_variables() {
        let css = css_variables(&default_tokens(&intent("blog"))).unwrap();

        assert!(css.starts_with(":root {"));
        assert!(css.ends_with('}'));
        assert!(css.contains("--color-primary: #059669;"));
        assert!(css.contains("--color-text-muted: #6B7280;"));
        assert!(css.contains("--font-scale: 1.25;"));
        assert!(css.contains("--spacing-1: calc(var(--spacing-unit) * 0.25);"));
        assert!(css.contains("--spacing-3: calc(var(--spacing-unit) * 1);"));
        assert!(css.contains("--spacing-9: calc(var(--spacing-unit) * 8);"));
        assert!(css.contains("--shadow-large: 0 20px 25px -5px rgba(0, 0, 0, 0.1);"));
    }

    #[test]
    fn test_global_styles_start_with_variables() {
        let tokens = default_tokens(&intent("business"));
        let css = global_styles(&tokens).unwrap();
        assert!(css.starts_with(&css_variables(&tokens).unwrap()));
        assert!(css.contains(".btn-primary {"));
    }

    #[test]
    fn test_is_css_color() {
        for ok in ["#fff", "#1E40AF", "#1E40AF80", "rgb(30, 64, 175)", "RGBA(0,0,0,0.5)", "rgb(10%, 20%, 30%)"] {
            assert!(is_css_color(ok), "{ok}");
        }
        for bad in ["red", "#12345", "#GGGGGG", "rgb(1,2)", "rgb(1,2,3", "rgb(1,2,3);", "url(x)", ""] {
            assert!(!is_css_color(bad), "{bad}");
        }
    }

    #[test]
    fn test_tokens_that_escape_the_stylesheet_are_rejected() {
        let mut tokens = default_tokens(&intent("business"));
        tokens.colors.primary = "red</style><script>alert(1)</script><style>".to_string();
        assert!(matches!(css_variables(&tokens), Err(Error::BadRequest { .. })));

        let mut tokens = default_tokens(&intent("business"));
        tokens.typography.heading_font = "Inter</style><script>alert(1)</script>".to_string();
        assert!(matches!(global_styles(&tokens), Err(Error::BadRequest { .. })));
        let content = default_content(&intent("business"));
        assert!(html_layout(&content, &tokens, 2026).is_err());

        let mut tokens = default_tokens(&intent("business"));
        tokens.shadows.large = "none; } body { display: none".to_string();
        assert!(validate_tokens(&tokens).is_err());

        // Quoted font families are fine
        let mut tokens = default_tokens(&intent("business"));
        tokens.typography.body_font = "\"Inter\", sans-serif".to_string();
        assert!(validate_tokens(&tokens).is_ok());
    }

    #[test]
    fn test_html_layout_structure() {
        let intent = intent("portfolio");
        let content = default_content(&intent);
        let html = html_layout(&content, &default_tokens(&intent), 2026).unwrap();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.trim_end().ends_with("</html>"));
        assert!(html.contains("<section id=\"hero\" class=\"section section-hero\">"));
        assert!(html.contains("<h1>Showcasing Creative Excellence</h1>"));
        assert!(html.contains("<a href=\"#features\">Key Features</a>"));
        assert!(html.contains("class=\"btn btn-primary\">Get Started Now</a>"));
        assert!(html.contains("<h3>Home</h3>"));
        assert!(html.contains("Feature 3 description goes here."));
        assert!(html.contains("&copy; 2026 Business website. All rights reserved."));
        assert!(html.contains("--color-primary: #7C3AED;"));
        assert!(html.contains(".feature-card {"));
        // Stylesheet is not entity-encoded
        assert!(html.contains("--shadow-large: 0 20px 25px -5px rgba(0, 0, 0, 0.1);"));
    }

    #[test]
    fn test_html_layout_navigation_uses_first_four_sections() {
        let intent = intent("business");
        let mut content = default_content(&intent);
        content.sections.push(ContentSection {
            id: "contact".to_string(),
            kind: SectionKind::Contact,
            heading: "Reach Out".to_string(),
            content: "We answer fast".to_string(),
            items: None,
        });

        let html = html_layout(&content, &default_tokens(&intent), 2026).unwrap();
        assert!(!html.contains("<a href=\"#contact\">Reach Out</a>"));
        assert!(html.contains("<section id=\"contact\" class=\"section section-contact\">"));
    }

    #[test]
    fn test_html_layout_escapes_generated_text() {
        let intent = intent("business");
        let mut content = default_content(&intent);
        content.title = "<b>Acme</b>".to_string();
        content.sections[2].content = "Fish & <chips>".to_string();
        content.sections[0].heading = "<script>alert(1)</script>".to_string();

        let html = html_layout(&content, &default_tokens(&intent), 2026).unwrap();
        assert!(html.contains("&lt;b&gt;Acme&lt;"));
        assert!(html.contains("<p>Fish &amp; &lt;chips&gt;</p>"));
        assert!(!html.contains("<b>Acme</b>"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_update_design() {
        let tokens = default_tokens(&intent("business"));
        let changes = BTreeMap::from([
            ("primary".to_string(), "#000000".to_string()),
            ("textMuted".to_string(), " rgb(153, 153, 153) ".to_string()),
        ]);

        let updated = update_design(&tokens, &changes).unwrap();
        assert_eq!(updated.colors.primary, "#000000");
        assert_eq!(updated.colors.text_muted, "rgb(153, 153, 153)");
        assert_eq!(updated.colors.secondary, tokens.colors.secondary);
        assert_eq!(updated.typography, tokens.typography);
    }

    #[test]
    fn test_update_design_rejects_bad_input() {
        let tokens = default_tokens(&intent("business"));

        let unknown = BTreeMap::from([("border".to_string(), "#ffffff".to_string())]);
        assert!(matches!(update_design(&tokens, &unknown), Err(Error::BadRequest { .. })));

        let injection = BTreeMap::from([("primary".to_string(), "red; } body { display: none".to_string())]);
        assert!(matches!(update_design(&tokens, &injection), Err(Error::BadRequest { .. })));

        let breakout = BTreeMap::from([(
            "primary".to_string(),
            "red</style><script>alert(1)</script><style>".to_string(),
        )]);
        assert!(matches!(update_design(&tokens, &breakout), Err(Error::BadRequest { .. })));
    }

    #[tokio::test]
    async fn test_generator_uses_router() {
        let generator = DesignGenerator::new(crate::test_utils::create_mock_router());
        let routed = generator.generate_design_tokens(&intent("personal")).await;
        assert!(routed.is_mock());
        assert_eq!(routed.value.colors.primary, "#4338CA");
    }

    /// Provider whose design tokens try to break out of the stylesheet
    struct Hostile;

    #[async_trait::async_trait]
    impl AiProvider for Hostile {
        fn name(&self) -> &str {
            "hostile"
        }

        async fn parse_intent(&self, _prompt: &str) -> Result<IntentAnalysis, AiError> {
            Ok(MockProvider.intent())
        }

        async fn generate_content(&self, intent: &IntentAnalysis, _prompt: &str) -> Result<GeneratedContent, AiError> {
            Ok(MockProvider.content(intent))
        }

        async fn generate_design_tokens(&self, intent: &IntentAnalysis) -> Result<DesignTokens, AiError> {
            let mut tokens = default_tokens(intent);
            tokens.colors.accent = "#fff</style><script>alert(1)</script>".to_string();
            Ok(tokens)
        }

        async fn regenerate_section(
            &self,
            _intent: &IntentAnalysis,
            section: &ContentSection,
            _instructions: &str,
        ) -> Result<ContentSection, AiError> {
            Ok(section.clone())
        }
    }

    #[tokio::test]
    async fn test_generator_replaces_unsafe_tokens() {
        let router = Arc::new(AiRouter::new(Some(Arc::new(Hostile)), vec![]));
        let routed = DesignGenerator::new(router).generate_design_tokens(&intent("blog")).await;

        assert!(routed.is_mock());
        assert_eq!(routed.value, default_tokens(&intent("blog")));
    }
}
