//! Paid website generation.
//!
//! A generation either completes fully (site stored and tokens charged in one database
//! transaction) or leaves nothing behind: the subdomain placeholder is removed and the user is
//! not charged.

use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};

use super::pipeline::WebsitePipeline;
use super::{GenerationProgress, WebsiteConfig, WebsiteGenerationInput, WebsiteGenerationResult};
use crate::ai::ContentSection;
use crate::db::errors::DbError;
use crate::db::handlers::Websites;
use crate::db::models::websites::{
    WebsiteCreateDBRequest, WebsiteDBResponse, WebsiteGenerationDBRequest, WebsiteStatus, WebsiteUpdateDBRequest,
};
use crate::errors::{Error, Result};
use crate::ledger::TokenLedger;
use crate::sites::{owned_website, subdomain_conflict, validate_description, validate_name, validate_subdomain};
use crate::types::{UserId, WebsiteId, abbrev_uuid};

pub const PROMPT_MIN_LEN: usize = 10;
pub const PROMPT_MAX_LEN: usize = 2000;

fn validate_prompt(prompt: &str) -> Result<()> {
    let len = prompt.trim().chars().count();
    if !(PROMPT_MIN_LEN..=PROMPT_MAX_LEN).contains(&len) {
        return Err(Error::bad_request(format!(
            "Prompt must be between {PROMPT_MIN_LEN} and {PROMPT_MAX_LEN} characters"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedWebsite {
    pub website: WebsiteDBResponse,
    pub preview_url: String,
    pub tokens_used: i64,
    pub new_balance: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegeneratedWebsiteSection {
    pub website: WebsiteDBResponse,
    pub section: ContentSection,
    pub tokens_used: i64,
    pub new_balance: i64,
}

#[derive(Clone)]
pub struct GenerationService {
    db: SqlitePool,
    ledger: TokenLedger,
    pipeline: WebsitePipeline,
    preview_base_url: String,
}

impl GenerationService {
    pub fn new(db: SqlitePool, ledger: TokenLedger, pipeline: WebsitePipeline, preview_base_url: impl Into<String>) -> Self {
        Self {
            db,
            ledger,
            pipeline,
            preview_base_url: preview_base_url.into(),
        }
    }

    pub fn preview_url(&self, subdomain: &str) -> String {
        format!("{}/{subdomain}", self.preview_base_url.trim_end_matches('/'))
    }

    async fn ensure_balance(&self, user_id: UserId, required: i64) -> Result<()> {
        let available = self.ledger.get_balance(user_id).await?;
        if available < required {
            return Err(Error::InsufficientTokens { required, available });
        }
        Ok(())
    }

    /// Remove a placeholder website. Failure is logged; the caller already has an error to report.
    async fn release(&self, website_id: WebsiteId) {
        let result = match self.db.acquire().await {
            Ok(mut conn) => Websites::new(&mut conn).delete(website_id).await,
            Err(e) => Err(DbError::from(e)),
        };
        if let Err(e) = result {
            error!(website_id = %abbrev_uuid(&website_id), "Failed to release website placeholder: {e}");
        }
    }

    /// Charge for and store a finished generation in one transaction
    async fn persist(&self, user_id: UserId, website_id: WebsiteId, result: &WebsiteGenerationResult) -> Result<(WebsiteDBResponse, i64)> {
        let config = serde_json::to_value(&result.config).map_err(|e| Error::Internal {
            operation: format!("serialize website config: {e}"),
        })?;

        let mut tx = self.db.begin().await.map_err(DbError::from)?;
        let receipt = self.ledger.charge_for_website_generation_in(&mut tx, user_id, website_id).await?;
        let website = Websites::new(&mut tx)
            .store_generation(
                website_id,
                &WebsiteGenerationDBRequest {
                    html: result.html.clone(),
                    css: result.css.clone(),
                    config,
                    ai_model: result.ai_model.clone(),
                },
            )
            .await?;
        tx.commit().await.map_err(DbError::from)?;

        Ok((website, receipt.new_balance))
    }

    /// Generate a website from a prompt and charge the user for it.
    ///
    /// Fails with [`Error::InsufficientTokens`] before anything is written, and with
    /// [`Error::Conflict`] if the subdomain is taken.
    #[instrument(skip_all, fields(user_id = %abbrev_uuid(&input.user_id), subdomain = %input.subdomain), err)]
    pub async fn generate_website(
        &self,
        input: WebsiteGenerationInput,
        progress: Option<&mpsc::Sender<GenerationProgress>>,
    ) -> Result<GeneratedWebsite> {
        validate_name(&input.name)?;
        validate_subdomain(&input.subdomain)?;
        validate_description(input.description.as_deref())?;
        validate_prompt(&input.prompt)?;

        let cost = self.ledger.costs().website_generation;
        self.ensure_balance(input.user_id, cost).await?;

        let placeholder = {
            let mut conn = self.db.acquire().await.map_err(DbError::from)?;
            Websites::new(&mut conn)
                .create(&WebsiteCreateDBRequest {
                    user_id: input.user_id,
                    name: input.name.trim().to_string(),
                    subdomain: input.subdomain.clone(),
                    description: input.description.clone(),
                    status: WebsiteStatus::Generating,
                })
                .await
                .map_err(subdomain_conflict)?
        };

        let result = match self.pipeline.generate(&input, progress).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Generation failed, releasing subdomain");
                self.release(placeholder.id).await;
                return Err(e);
            }
        };

        let (website, new_balance) = match self.persist(input.user_id, placeholder.id, &result).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Storing generated website failed, releasing subdomain: {e}");
                self.release(placeholder.id).await;
                return Err(e);
            }
        };

        info!(website_id = %abbrev_uuid(&website.id), ai_model = %result.ai_model, new_balance, "Website generated");
        Ok(GeneratedWebsite {
            preview_url: self.preview_url(&website.subdomain),
            website,
            tokens_used: cost,
            new_balance,
        })
    }

    fn stored_config(website: &WebsiteDBResponse) -> Result<WebsiteConfig> {
        serde_json::from_value(website.config.0.clone())
            .map_err(|_| Error::bad_request("Website has no generated content to modify"))
    }

    /// Rewrite one section of a generated website, charging the content generation cost
    #[instrument(skip(self, instructions), fields(user_id = %abbrev_uuid(&user_id), website_id = %abbrev_uuid(&website_id)), err)]
    pub async fn regenerate_section(
        &self,
        user_id: UserId,
        website_id: WebsiteId,
        section_id: &str,
        instructions: &str,
    ) -> Result<RegeneratedWebsiteSection> {
        if instructions.trim().is_empty() {
            return Err(Error::bad_request("Instructions are required"));
        }

        let website = {
            let mut conn = self.db.acquire().await.map_err(DbError::from)?;
            owned_website(&mut conn, user_id, website_id).await?
        };
        let config = Self::stored_config(&website)?;

        let cost = self.ledger.costs().content_generation;
        self.ensure_balance(user_id, cost).await?;

        let regenerated = self.pipeline.regenerate_section(&config, section_id, instructions).await?;
        let new_config = serde_json::to_value(&regenerated.config).map_err(|e| Error::Internal {
            operation: format!("serialize website config: {e}"),
        })?;

        let mut tx = self.db.begin().await.map_err(DbError::from)?;
        let receipt = self.ledger.charge_for_content_generation_in(&mut tx, user_id, website_id).await?;
        let mut repo = Websites::new(&mut tx);
        repo.update(
            website_id,
            user_id,
            &WebsiteUpdateDBRequest {
                config: Some(new_config),
                ..Default::default()
            },
        )
        .await?
        .ok_or_else(|| Error::not_found("Website", website_id))?;
        let website = repo.store_artifacts(website_id, Some(&regenerated.html), None).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(section_id, ai_model = %regenerated.ai_model, "Section regenerated");
        Ok(RegeneratedWebsiteSection {
            website,
            section: regenerated.section,
            tokens_used: cost,
            new_balance: receipt.new_balance,
        })
    }

    /// Apply colour changes to a generated website. Free of charge.
    #[instrument(skip(self, changes), fields(user_id = %abbrev_uuid(&user_id), website_id = %abbrev_uuid(&website_id)), err)]
    pub async fn update_design(
        &self,
        user_id: UserId,
        website_id: WebsiteId,
        changes: &BTreeMap<String, String>,
    ) -> Result<WebsiteDBResponse> {
        if changes.is_empty() {
            return Err(Error::bad_request("No design changes given"));
        }

        let website = {
            let mut conn = self.db.acquire().await.map_err(DbError::from)?;
            owned_website(&mut conn, user_id, website_id).await?
        };
        let redesigned = self.pipeline.update_design(&Self::stored_config(&website)?, changes)?;
        let config = serde_json::to_value(&redesigned.config).map_err(|e| Error::Internal {
            operation: format!("serialize website config: {e}"),
        })?;

        let mut tx = self.db.begin().await.map_err(DbError::from)?;
        let mut repo = Websites::new(&mut tx);
        repo.update(
            website_id,
            user_id,
            &WebsiteUpdateDBRequest {
                config: Some(config),
                ..Default::default()
            },
        )
        .await?
        .ok_or_else(|| Error::not_found("Website", website_id))?;
        let website = repo
            .store_artifacts(website_id, Some(&redesigned.html), Some(&redesigned.css))
            .await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(changed = changes.len(), "Website design updated");
        Ok(website)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AiError, AiProvider, AiRouter, DesignTokens, GeneratedContent, IntentAnalysis, MockProvider};
    use crate::db::models::token_transactions::TokenTransactionType;
    use crate::pagination::Pagination;
    use crate::test_utils::{create_funded_user, create_mock_router, create_test_ledger};
    use std::sync::Arc;

    fn service(pool: &SqlitePool) -> GenerationService {
        GenerationService::new(
            pool.clone(),
            create_test_ledger(pool),
            WebsitePipeline::new(create_mock_router()),
            "http://localhost:3000/preview/",
        )
    }

    fn input(user_id: UserId, subdomain: &str) -> WebsiteGenerationInput {
        WebsiteGenerationInput {
            user_id,
            name: "Harbour Cafe".to_string(),
            subdomain: subdomain.to_string(),
            prompt: "A cosy harbour-side cafe with a menu and opening hours".to_string(),
            description: Some("Coffee by the sea".to_string()),
        }
    }

    async fn website_count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM websites")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_generate_website_charges_and_stores(pool: SqlitePool) {
        let service = service(&pool);
        let user = create_funded_user(&pool, 120).await;

        let generated = service.generate_website(input(user.id, "harbour-cafe"), None).await.unwrap();

        assert_eq!(generated.preview_url, "http://localhost:3000/preview/harbour-cafe");
        assert_eq!(generated.tokens_used, 50);
        assert_eq!(generated.new_balance, 70);
        assert_eq!(generated.website.status, WebsiteStatus::Draft);
        assert_eq!(generated.website.ai_model.as_deref(), Some("mock"));
        assert!(generated.website.generated_html.as_deref().unwrap().contains("<!DOCTYPE html>"));
        assert_eq!(generated.website.config.0["version"], "1.0.0");

        let ledger = create_test_ledger(&pool);
        let history = ledger.transaction_history(user.id, &Pagination::default()).await.unwrap();
        assert_eq!(history.data[0].transaction_type, TokenTransactionType::WebsiteGeneration);
        assert_eq!(history.data[0].related_website_id, Some(generated.website.id));
        assert!(ledger.audit_balance(user.id).await.unwrap().consistent);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_insufficient_tokens_writes_nothing(pool: SqlitePool) {
        let service = service(&pool);
        let user = create_funded_user(&pool, 49).await;

        let err = service.generate_website(input(user.id, "harbour-cafe"), None).await.unwrap_err();
        assert!(matches!(err, Error::InsufficientTokens { required: 50, available: 49 }));
        assert_eq!(website_count(&pool).await, 0);
        assert_eq!(create_test_ledger(&pool).get_balance(user.id).await.unwrap(), 49);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_taken_subdomain_is_a_conflict(pool: SqlitePool) {
        let service = service(&pool);
        let user = create_funded_user(&pool, 200).await;

        service.generate_website(input(user.id, "harbour-cafe"), None).await.unwrap();
        let err = service.generate_website(input(user.id, "harbour-cafe"), None).await.unwrap_err();

        assert!(matches!(err, Error::Conflict { .. }));
        assert_eq!(create_test_ledger(&pool).get_balance(user.id).await.unwrap(), 150);
    }

    #[sqlx::test]
    async fn test_invalid_input_rejected(pool: SqlitePool) {
        let service = service(&pool);
        let user = create_funded_user(&pool, 200).await;

        let mut short_prompt = input(user.id, "harbour-cafe");
        short_prompt.prompt = "cafe".to_string();
        assert!(matches!(
            service.generate_website(short_prompt, None).await,
            Err(Error::BadRequest { .. })
        ));
        assert!(matches!(
            service.generate_website(input(user.id, "Harbour Cafe"), None).await,
            Err(Error::BadRequest { .. })
        ));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_regenerate_section_and_update_design(pool: SqlitePool) {
        let service = service(&pool);
        let user = create_funded_user(&pool, 100).await;
        let generated = service.generate_website(input(user.id, "harbour-cafe"), None).await.unwrap();

        let regenerated = service
            .regenerate_section(user.id, generated.website.id, "about", "mention the sea view")
            .await
            .unwrap();
        assert_eq!(regenerated.section.id, "about");
        assert_eq!(regenerated.tokens_used, 10);
        assert_eq!(regenerated.new_balance, 40);

        let missing = service
            .regenerate_section(user.id, generated.website.id, "pricing", "anything")
            .await;
        assert!(matches!(missing, Err(Error::NotFound { .. })));
        assert_eq!(create_test_ledger(&pool).get_balance(user.id).await.unwrap(), 40);

        let changes = BTreeMap::from([("primary".to_string(), "#0F766E".to_string())]);
        let website = service.update_design(user.id, generated.website.id, &changes).await.unwrap();
        assert!(website.generated_css.as_deref().unwrap().contains("--color-primary: #0F766E;"));
        assert_eq!(website.config.0["design"]["colors"]["primary"], "#0F766E");
        // Design changes are free
        assert_eq!(create_test_ledger(&pool).get_balance(user.id).await.unwrap(), 40);
    }

    #[sqlx::test]
    async fn test_plain_website_cannot_be_modified(pool: SqlitePool) {
        let service = service(&pool);
        let user = create_funded_user(&pool, 100).await;
        let website = crate::test_utils::create_test_website(&pool, user.id).await;

        let err = service
            .regenerate_section(user.id, website.id, "hero", "bolder")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
        assert_eq!(create_test_ledger(&pool).get_balance(user.id).await.unwrap(), 100);
    }

    /// Provider whose answers do not survive HTML rendering checks
    struct Broken;

    #[async_trait::async_trait]
    impl AiProvider for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn parse_intent(&self, _prompt: &str) -> std::result::Result<IntentAnalysis, AiError> {
            Err(AiError::Timeout)
        }

        async fn generate_content(&self, _intent: &IntentAnalysis, _prompt: &str) -> std::result::Result<GeneratedContent, AiError> {
            Err(AiError::EmptyResponse)
        }

        async fn generate_design_tokens(&self, _intent: &IntentAnalysis) -> std::result::Result<DesignTokens, AiError> {
            Err(AiError::Timeout)
        }

        async fn regenerate_section(
            &self,
            _intent: &IntentAnalysis,
            _section: &ContentSection,
            _instructions: &str,
        ) -> std::result::Result<ContentSection, AiError> {
            Err(AiError::Timeout)
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_failing_provider_falls_back_to_mock(pool: SqlitePool) {
        let router = Arc::new(AiRouter::new(Some(Arc::new(Broken)), vec![]));
        let service = GenerationService::new(
            pool.clone(),
            create_test_ledger(&pool),
            WebsitePipeline::new(router),
            "http://localhost:3000/preview",
        );
        let user = create_funded_user(&pool, 50).await;

        let generated = service.generate_website(input(user.id, "harbour-cafe"), None).await.unwrap();
        assert_eq!(generated.website.ai_model.as_deref(), Some(MockProvider::NAME));
        assert_eq!(generated.new_balance, 0);
    }

    /// Provider that spends the user's whole balance while the intent is being parsed
    struct Draining {
        ledger: TokenLedger,
        user_id: UserId,
    }

    #[async_trait::async_trait]
    impl AiProvider for Draining {
        fn name(&self) -> &str {
            "draining"
        }

        async fn parse_intent(&self, prompt: &str) -> std::result::Result<IntentAnalysis, AiError> {
            let balance = self.ledger.get_balance(self.user_id).await.unwrap();
            self.ledger
                .debit(
                    crate::ledger::TokenChange::builder()
                        .user_id(self.user_id)
                        .amount(balance)
                        .transaction_type(TokenTransactionType::ContentGeneration)
                        .description("Spent elsewhere")
                        .build(),
                )
                .await
                .unwrap();
            MockProvider.parse_intent(prompt).await
        }

        async fn generate_content(&self, intent: &IntentAnalysis, prompt: &str) -> std::result::Result<GeneratedContent, AiError> {
            MockProvider.generate_content(intent, prompt).await
        }

        async fn generate_design_tokens(&self, intent: &IntentAnalysis) -> std::result::Result<DesignTokens, AiError> {
            MockProvider.generate_design_tokens(intent).await
        }

        async fn regenerate_section(
            &self,
            intent: &IntentAnalysis,
            section: &ContentSection,
            instructions: &str,
        ) -> std::result::Result<ContentSection, AiError> {
            MockProvider.regenerate_section(intent, section, instructions).await
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_failed_charge_releases_subdomain(pool: SqlitePool) {
        let user = create_funded_user(&pool, 60).await;
        let ledger = create_test_ledger(&pool);
        let router = Arc::new(AiRouter::new(
            Some(Arc::new(Draining {
                ledger: ledger.clone(),
                user_id: user.id,
            })),
            vec![],
        ));
        let service = GenerationService::new(pool.clone(), ledger.clone(), WebsitePipeline::new(router), "http://localhost:3000/preview");

        let err = service.generate_website(input(user.id, "harbour-cafe"), None).await.unwrap_err();
        assert!(matches!(err, Error::InsufficientTokens { required: 50, available: 0 }));
        assert_eq!(website_count(&pool).await, 0);
        assert!(ledger.audit_balance(user.id).await.unwrap().consistent);

        // The subdomain is free again
        ledger.grant(user.id, 50, None).await.unwrap();
        let plain = GenerationService::new(pool.clone(), ledger, WebsitePipeline::new(create_mock_router()), "http://localhost:3000/preview");
        plain.generate_website(input(user.id, "harbour-cafe"), None).await.unwrap();
    }
}
