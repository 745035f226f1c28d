//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `SITESPARK_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `SITESPARK_` override YAML values
//! 3. **DATABASE_URL** - Special case: overrides `database.url` if set
//! 4. **KIMI_API_KEY** - Special case: overrides `ai.api_key` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `SITESPARK_TOKENS__SIGNUP_BONUS=250` sets the `tokens.signup_bonus` field.
//!
//! ## Configuration Structure
//!
//! - **Database**: `database.url`, `database.max_connections` - SQLite connection settings
//! - **AI**: `ai.api_url`, `ai.api_key`, `ai.model` - LLM provider; without a key every
//!   generation runs on built-in mock data
//! - **Tokens**: `tokens.signup_bonus`, `tokens.website_generation`, ... - token economy amounts
//! - **Sites**: `sites.preview_base_url` - where generated sites are previewed
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! DATABASE_URL="sqlite://sitespark.db?mode=rwc"
//! KIMI_API_KEY="sk-..."
//! SITESPARK_AI__FORCE_MOCK=true
//! SITESPARK_TOKENS__DAILY_LOGIN=25
//! ```

use clap::{Parser, Subcommand};
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use url::Url;
use uuid::Uuid;

use crate::errors::Error;

/// CLI args - config file plus an optional command to run
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "SITESPARK_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit.
    #[arg(long)]
    pub validate: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Apply database migrations
    Migrate,
    /// Create an account and award the signup bonus
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Sign in, awarding the daily login bonus once per day
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Show a user's token balance and generation costs
    Balance {
        #[arg(long)]
        user: Uuid,
    },
    /// Show a user's token transaction history
    History {
        #[arg(long)]
        user: Uuid,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Credit tokens to a user as a purchase
    Grant {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        amount: i64,
        #[arg(long)]
        description: Option<String>,
    },
    /// Generate a website from a prompt and write it to disk
    Generate {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        name: String,
        #[arg(long)]
        subdomain: String,
        #[arg(long)]
        prompt: String,
        #[arg(long)]
        description: Option<String>,
        /// Directory for index.html, styles.css and site.json
        #[arg(long, default_value = "site")]
        out: PathBuf,
    },
    /// Answer the guided questions on stdin, then generate a website from the answers
    Chat {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        subdomain: String,
        #[arg(long, default_value = "site")]
        out: PathBuf,
    },
    /// Publish a generated website
    Publish {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        website: Uuid,
    },
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have sensible defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Raw `DATABASE_URL` override, folded into `database.url` on load
    #[serde(skip_serializing)]
    pub database_url: Option<String>,
    /// Raw `KIMI_API_KEY` override, folded into `ai.api_key` on load
    #[serde(skip_serializing)]
    pub kimi_api_key: Option<String>,
    pub database: DatabaseConfig,
    pub ai: AiConfig,
    pub tokens: TokensConfig,
    pub sites: SitesConfig,
    /// Log output format
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            kimi_api_key: None,
            database: DatabaseConfig::default(),
            ai: AiConfig::default(),
            tokens: TokensConfig::default(),
            sites: SitesConfig::default(),
            log_format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// SQLite connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Duration,
    /// How long a writer waits on a locked database before failing
    #[serde(with = "humantime_serde")]
    pub busy_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://sitespark.db?mode=rwc".to_string(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// LLM provider settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AiConfig {
    /// OpenAI-compatible chat completions endpoint
    pub api_url: String,
    /// When unset the primary provider is skipped and mock data is served
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Serve mock data without calling any provider
    pub force_mock: bool,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.moonshot.ai/v1/chat/completions".to_string(),
            api_key: None,
            model: "kimi-k2".to_string(),
            request_timeout: Duration::from_secs(60),
            force_mock: false,
        }
    }
}

/// Token economy amounts
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokensConfig {
    pub signup_bonus: i64,
    pub daily_login: i64,
    pub website_generation: i64,
    pub content_generation: i64,
    /// Offset from UTC, in minutes, of the midnight that resets the daily login bonus
    pub day_boundary_utc_offset_minutes: i32,
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            signup_bonus: 100,
            daily_login: 10,
            website_generation: 50,
            content_generation: 10,
            day_boundary_utc_offset_minutes: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SitesConfig {
    pub preview_base_url: String,
}

impl Default for SitesConfig {
    fn default() -> Self {
        Self {
            preview_base_url: "http://localhost:3000/preview".to_string(),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        if let Some(url) = config.database_url.take() {
            config.database.url = url;
        }
        if let Some(key) = config.kimi_api_key.take() {
            config.ai.api_key = Some(key);
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        let tokens = &self.tokens;
        if tokens.signup_bonus < 0 || tokens.daily_login < 0 {
            return Err(Error::Internal {
                operation: "Config validation: tokens.signup_bonus and tokens.daily_login cannot be negative".to_string(),
            });
        }

        if tokens.website_generation <= 0 || tokens.content_generation <= 0 {
            return Err(Error::Internal {
                operation: "Config validation: generation costs must be positive".to_string(),
            });
        }

        if tokens.day_boundary_utc_offset_minutes.abs() > 14 * 60 {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: tokens.day_boundary_utc_offset_minutes ({}) must be within +/-840",
                    tokens.day_boundary_utc_offset_minutes
                ),
            });
        }

        if self.database.max_connections < 1 {
            return Err(Error::Internal {
                operation: "Config validation: database.max_connections must be at least 1".to_string(),
            });
        }

        if let Err(e) = Url::parse(&self.ai.api_url) {
            return Err(Error::Internal {
                operation: format!("Config validation: ai.api_url is not a valid URL: {e}"),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("SITESPARK_").split("__").ignore(&["CONFIG"]))
            .merge(Env::raw().only(&["DATABASE_URL", "KIMI_API_KEY"]))
    }
}
