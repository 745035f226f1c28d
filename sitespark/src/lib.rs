//! # sitespark: AI-assisted website builder
//!
//! `sitespark` turns a short natural-language brief into a complete single-page website
//! (HTML, CSS and a machine-readable site configuration), and keeps the bookkeeping that goes
//! with it: user accounts, a token ledger that pays for generation, and the blog posts and
//! contact-form submissions that hang off each site.
//!
//! ## Overview
//!
//! Every user holds a balance of tokens. Accounts receive a signup bonus and a once-per-day
//! login bonus, and spend tokens on generating websites and regenerating individual sections.
//! Each balance change is recorded as an immutable ledger entry in the same transaction as the
//! change itself, so the balance always equals the sum of the ledger.
//!
//! ### Generation
//!
//! Generating a website runs a four stage pipeline ([`generation`]):
//!
//! 1. **Intent** - the brief is classified into a business category, style, audience and page list
//! 2. **Design and content** - design tokens and section copy are produced concurrently
//! 3. **Assembly** - sections are rendered into an HTML document with matching CSS
//! 4. **Finalization** - a versioned site configuration is assembled from the pieces
//!
//! Each AI step goes through the [`ai::AiRouter`], which tries the configured LLM provider and
//! falls back to deterministic mock data when the provider is missing or failing. Generation
//! therefore never fails because of the model; it only fails on validation, balance or storage.
//!
//! ## Architecture
//!
//! ### Core Components
//!
//! The **service layer** ([`accounts`], [`ledger`], [`sites`], [`generation`]) holds the
//! business rules. Services own a [`sqlx::SqlitePool`] and open a transaction whenever two
//! writes must land together.
//!
//! The **database layer** ([`db`]) uses the repository pattern. Each table has a repository
//! borrowing a `&mut SqliteConnection`, so the same code runs on a pooled connection or inside
//! a transaction.
//!
//! The **AI layer** ([`ai`]) defines the [`ai::AiProvider`] trait, an OpenAI-compatible Kimi
//! client and the mock provider.
//!
//! The [`chat`] module holds the guided brief that collects answers before generation.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use sitespark::{AppState, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = sitespark::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     sitespark::telemetry::init_telemetry(config.log_format)?;
//!
//!     let pool = sitespark::db::connect(&config.database).await?;
//!     sitespark::migrator().run(&pool).await?;
//!
//!     let state = AppState::from_config(pool, config);
//!     println!("{} tokens per website", state.ledger.costs().website_generation);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod accounts;
pub mod ai;
pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod errors;
pub mod generation;
pub mod ledger;
pub mod pagination;
pub mod sites;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use bon::Builder;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::accounts::AccountService;
use crate::ai::AiRouter;
use crate::auth::password::Argon2Params;
use crate::generation::{GenerationService, WebsitePipeline};
use crate::ledger::TokenLedger;
use crate::sites::SiteService;

pub use config::Config;
pub use types::{BlogPostId, FormSubmissionId, TransactionId, UserId, WebsiteId};

/// Shared application state.
///
/// Holds the connection pool, configuration and the services built on top of them. Cloning is
/// cheap: the pool and router are reference counted and the services only hold handles.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool.clone())
///     .config(config.clone())
///     .router(router.clone())
///     .ledger(ledger.clone())
///     .accounts(accounts)
///     .sites(SiteService::new(pool.clone()))
///     .generation(generation)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    pub router: Arc<AiRouter>,
    pub ledger: TokenLedger,
    pub accounts: AccountService,
    pub sites: SiteService,
    pub generation: GenerationService,
}

impl AppState {
    /// Build every service from configuration, with the AI router chosen by `config.ai`.
    pub fn from_config(db: SqlitePool, config: Config) -> Self {
        let router = Arc::new(AiRouter::from_config(&config.ai));
        Self::with_router(db, config, router)
    }

    /// Build every service around an existing AI router.
    pub fn with_router(db: SqlitePool, config: Config, router: Arc<AiRouter>) -> Self {
        let ledger = TokenLedger::new(db.clone(), config.tokens.clone());
        let accounts = AccountService::new(db.clone(), ledger.clone(), Argon2Params::default());
        let sites = SiteService::new(db.clone());
        let generation = GenerationService::new(
            db.clone(),
            ledger.clone(),
            WebsitePipeline::new(router.clone()),
            config.sites.preview_base_url.clone(),
        );

        Self::builder()
            .db(db)
            .config(config)
            .router(router)
            .ledger(ledger)
            .accounts(accounts)
            .sites(sites)
            .generation(generation)
            .build()
    }
}

/// Get the sitespark database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}
