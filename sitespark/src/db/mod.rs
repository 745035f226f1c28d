//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with SQLite.
//! It follows the Repository pattern to provide clean abstractions over database operations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Services   │  (ledger, generation, accounts)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - database records)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   SQLite    │
//! └─────────────┘
//! ```
//!
//! # Transactions
//!
//! Repositories borrow a `&mut SqliteConnection`, so they work the same on a pooled connection
//! or inside a transaction. Anything that must be atomic (a balance change and its ledger row,
//! a debit and the website it pays for) is done on one transaction:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let mut websites = Websites::new(&mut tx);
//! // ... operations ...
//! tx.commit().await?;
//! ```
//!
//! # Migrations
//!
//! Migrations live in `migrations/` and are embedded by [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

use crate::config::DatabaseConfig;

/// Open the connection pool described by `config`.
///
/// WAL mode lets readers proceed while a ledger transaction holds the write lock; writers queue
/// behind each other for up to `busy_timeout`.
pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(config.busy_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(options)
        .await?;

    info!(url = %config.url, "Connected to database");
    Ok(pool)
}
