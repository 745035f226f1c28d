//! Database repository for the token ledger.
//!
//! Balance mutations are conditional single-statement updates on `users.tokens_balance`, so the
//! first statement of a ledger transaction is always a write. Callers must pair every balance
//! mutation with exactly one [`TokenTransactions::insert`] on the same transaction.

use crate::db::{
    errors::Result,
    models::token_transactions::{TokenTransactionCreateDBRequest, TokenTransactionDBResponse, TokenTransactionType},
};
use crate::types::{UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use sqlx::types::Json;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing ledger entries
#[derive(Debug, Clone)]
pub struct TokenTransactionFilter {
    pub user_id: UserId,
    pub skip: i64,
    pub limit: i64,
}

impl TokenTransactionFilter {
    pub fn new(user_id: UserId, skip: i64, limit: i64) -> Self {
        Self { user_id, skip, limit }
    }
}

pub struct TokenTransactions<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> TokenTransactions<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Subtract `amount` from the user's balance if it covers it.
    ///
    /// Returns the new balance, or `None` when the user is missing or the balance is too low.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn try_decrement_balance(&mut self, user_id: UserId, amount: i64, at: DateTime<Utc>) -> Result<Option<i64>> {
        let balance = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE users
            SET tokens_balance = tokens_balance - $1, updated_at = $2
            WHERE id = $3 AND tokens_balance >= $1
            RETURNING tokens_balance
            "#,
        )
        .bind(amount)
        .bind(at)
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(balance)
    }

    /// Add `amount` to the user's balance. Returns the new balance, or `None` if the user is missing.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn increment_balance(&mut self, user_id: UserId, amount: i64, at: DateTime<Utc>) -> Result<Option<i64>> {
        let balance = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE users
            SET tokens_balance = tokens_balance + $1, updated_at = $2
            WHERE id = $3
            RETURNING tokens_balance
            "#,
        )
        .bind(amount)
        .bind(at)
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(balance)
    }

    /// Current stored balance, `None` if the user does not exist.
    pub async fn balance(&mut self, user_id: UserId) -> Result<Option<i64>> {
        let balance = sqlx::query_scalar::<_, i64>("SELECT tokens_balance FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(balance)
    }

    /// Append a ledger entry
    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), kind = %request.transaction_type), err)]
    pub async fn insert(&mut self, request: &TokenTransactionCreateDBRequest) -> Result<TokenTransactionDBResponse> {
        let transaction = sqlx::query_as::<_, TokenTransactionDBResponse>(
            r#"
            INSERT INTO token_transactions
                (id, user_id, amount, balance_after, transaction_type, description, metadata, related_website_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(request.amount)
        .bind(request.balance_after)
        .bind(request.transaction_type)
        .bind(&request.description)
        .bind(request.metadata.as_ref().map(Json))
        .bind(request.related_website_id)
        .bind(request.created_at)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(transaction)
    }

    /// List a user's ledger entries, newest first
    pub async fn list(&mut self, filter: &TokenTransactionFilter) -> Result<Vec<TokenTransactionDBResponse>> {
        let transactions = sqlx::query_as::<_, TokenTransactionDBResponse>(
            r#"
            SELECT * FROM token_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC, rowid DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(transactions)
    }

    pub async fn count(&mut self, user_id: UserId) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM token_transactions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }

    /// Sum of all signed amounts for a user
    pub async fn sum_amounts(&mut self, user_id: UserId) -> Result<i64> {
        let sum = sqlx::query_scalar::<_, i64>("SELECT COALESCE(SUM(amount), 0) FROM token_transactions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(sum)
    }

    /// Whether the user has an entry of `kind` created at or after `since`
    pub async fn exists_since(&mut self, user_id: UserId, kind: TokenTransactionType, since: DateTime<Utc>) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM token_transactions
                WHERE user_id = $1 AND transaction_type = $2 AND created_at >= $3
            )
            "#,
        )
        .bind(user_id)
        .bind(kind)
        .bind(since)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(exists)
    }
}
