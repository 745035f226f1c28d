//! Token ledger.
//!
//! Every balance mutation and its ledger entry are written in one database transaction. The
//! transaction opens with a conditional `UPDATE` of `users.tokens_balance`, so concurrent
//! mutations for one user are serialized by the database and a balance can never go negative.
//! No application-level locking is involved.
//!
//! The `*_in` methods run on a caller-supplied connection, typically an open transaction, so a
//! charge can commit together with the work it pays for.

use bon::Builder;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, instrument, warn};

use crate::config::TokensConfig;
use crate::db::errors::DbError;
use crate::db::handlers::TokenTransactions;
use crate::db::handlers::token_transactions::TokenTransactionFilter;
use crate::db::models::token_transactions::{TokenTransactionCreateDBRequest, TokenTransactionDBResponse, TokenTransactionType};
use crate::errors::{Error, Result};
use crate::pagination::{Page, Pagination};
use crate::types::{TransactionId, UserId, WebsiteId, abbrev_uuid};

/// A single balance change, before it is applied
#[derive(Debug, Clone, Builder)]
pub struct TokenChange {
    pub user_id: UserId,
    /// Always positive; the direction comes from debit or credit
    pub amount: i64,
    pub transaction_type: TokenTransactionType,
    #[builder(into)]
    pub description: String,
    pub metadata: Option<serde_json::Value>,
    pub related_website_id: Option<WebsiteId>,
}

/// Outcome of an applied balance change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenReceipt {
    pub new_balance: i64,
    pub transaction_id: TransactionId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyLoginAward {
    pub awarded: bool,
    pub amount: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenCosts {
    pub website_generation: i64,
    pub content_generation: i64,
}

/// Stored balance compared with the sum of the user's ledger entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BalanceAudit {
    pub stored_balance: i64,
    pub ledger_sum: i64,
    pub consistent: bool,
}

/// Start of the day containing `now`, for days that begin at midnight `offset_minutes` east of UTC.
pub fn day_start(now: DateTime<Utc>, offset_minutes: i32) -> DateTime<Utc> {
    let offset = Duration::minutes(i64::from(offset_minutes));
    let local_midnight = (now.naive_utc() + offset).date().and_time(NaiveTime::MIN);
    (local_midnight - offset).and_utc()
}

fn ensure_positive(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(Error::bad_request("Amount must be greater than zero"));
    }
    Ok(())
}

fn entry(change: &TokenChange, signed_amount: i64, balance_after: i64, at: DateTime<Utc>) -> TokenTransactionCreateDBRequest {
    TokenTransactionCreateDBRequest {
        user_id: change.user_id,
        amount: signed_amount,
        balance_after,
        transaction_type: change.transaction_type,
        description: change.description.clone(),
        metadata: change.metadata.clone(),
        related_website_id: change.related_website_id,
        created_at: at,
    }
}

#[derive(Clone)]
pub struct TokenLedger {
    db: SqlitePool,
    config: TokensConfig,
}

impl TokenLedger {
    pub fn new(db: SqlitePool, config: TokensConfig) -> Self {
        Self { db, config }
    }

    pub fn costs(&self) -> TokenCosts {
        TokenCosts {
            website_generation: self.config.website_generation,
            content_generation: self.config.content_generation,
        }
    }

    pub async fn get_balance(&self, user_id: UserId) -> Result<i64> {
        let mut conn = self.db.acquire().await.map_err(DbError::from)?;
        TokenTransactions::new(&mut conn)
            .balance(user_id)
            .await?
            .ok_or_else(|| Error::not_found("User", user_id))
    }

    pub async fn has_enough_tokens(&self, user_id: UserId, amount: i64) -> Result<bool> {
        Ok(self.get_balance(user_id).await? >= amount)
    }

    /// Remove tokens from a user's balance, failing with [`Error::InsufficientTokens`] if it is too low.
    pub async fn debit(&self, change: TokenChange) -> Result<TokenReceipt> {
        let mut tx = self.db.begin().await.map_err(DbError::from)?;
        let receipt = self.debit_in(&mut tx, &change).await?;
        tx.commit().await.map_err(DbError::from)?;
        Ok(receipt)
    }

    #[instrument(skip(self, conn, change), fields(user_id = %abbrev_uuid(&change.user_id), amount = change.amount, kind = %change.transaction_type), err)]
    pub async fn debit_in(&self, conn: &mut SqliteConnection, change: &TokenChange) -> Result<TokenReceipt> {
        ensure_positive(change.amount)?;
        let now = Utc::now();
        let mut repo = TokenTransactions::new(conn);

        let Some(balance_after) = repo.try_decrement_balance(change.user_id, change.amount, now).await? else {
            return match repo.balance(change.user_id).await? {
                Some(available) => {
                    debug!(available, "Debit refused");
                    Err(Error::InsufficientTokens {
                        required: change.amount,
                        available,
                    })
                }
                None => Err(Error::not_found("User", change.user_id)),
            };
        };

        let transaction = repo.insert(&entry(change, -change.amount, balance_after, now)).await?;
        info!(balance_after, "Tokens debited");

        Ok(TokenReceipt {
            new_balance: balance_after,
            transaction_id: transaction.id,
        })
    }

    /// Add tokens to a user's balance
    pub async fn credit(&self, change: TokenChange) -> Result<TokenReceipt> {
        let mut tx = self.db.begin().await.map_err(DbError::from)?;
        let receipt = self.credit_in(&mut tx, &change).await?;
        tx.commit().await.map_err(DbError::from)?;
        Ok(receipt)
    }

    #[instrument(skip(self, conn, change), fields(user_id = %abbrev_uuid(&change.user_id), amount = change.amount, kind = %change.transaction_type), err)]
    pub async fn credit_in(&self, conn: &mut SqliteConnection, change: &TokenChange) -> Result<TokenReceipt> {
        ensure_positive(change.amount)?;
        let now = Utc::now();
        let mut repo = TokenTransactions::new(conn);

        let balance_after = repo
            .increment_balance(change.user_id, change.amount, now)
            .await?
            .ok_or_else(|| Error::not_found("User", change.user_id))?;

        let transaction = repo.insert(&entry(change, change.amount, balance_after, now)).await?;
        info!(balance_after, "Tokens credited");

        Ok(TokenReceipt {
            new_balance: balance_after,
            transaction_id: transaction.id,
        })
    }

    /// Credit the configured welcome bonus. Returns `None` when the bonus is disabled.
    pub async fn award_signup_bonus(&self, user_id: UserId) -> Result<Option<TokenReceipt>> {
        let mut tx = self.db.begin().await.map_err(DbError::from)?;
        let receipt = self.award_signup_bonus_in(&mut tx, user_id).await?;
        tx.commit().await.map_err(DbError::from)?;
        Ok(receipt)
    }

    pub async fn award_signup_bonus_in(&self, conn: &mut SqliteConnection, user_id: UserId) -> Result<Option<TokenReceipt>> {
        let amount = self.config.signup_bonus;
        if amount == 0 {
            return Ok(None);
        }

        let change = TokenChange::builder()
            .user_id(user_id)
            .amount(amount)
            .transaction_type(TokenTransactionType::SignupBonus)
            .description(format!("Welcome bonus: {amount} tokens"))
            .build();
        self.credit_in(conn, &change).await.map(Some)
    }

    pub async fn award_daily_login(&self, user_id: UserId) -> Result<DailyLoginAward> {
        self.award_daily_login_at(user_id, Utc::now()).await
    }

    /// Credit the daily login bonus unless the user already had one since the start of `now`'s day.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn award_daily_login_at(&self, user_id: UserId, now: DateTime<Utc>) -> Result<DailyLoginAward> {
        let amount = self.config.daily_login;
        if amount == 0 {
            return Ok(DailyLoginAward { awarded: false, amount: 0 });
        }

        let since = day_start(now, self.config.day_boundary_utc_offset_minutes);
        let mut tx = self.db.begin().await.map_err(DbError::from)?;
        let mut repo = TokenTransactions::new(&mut tx);

        // Write first so concurrent awards queue on the user row before the check
        let balance_after = repo
            .increment_balance(user_id, amount, now)
            .await?
            .ok_or_else(|| Error::not_found("User", user_id))?;

        if repo.exists_since(user_id, TokenTransactionType::DailyLogin, since).await? {
            tx.rollback().await.map_err(DbError::from)?;
            debug!(%since, "Daily login bonus already awarded");
            return Ok(DailyLoginAward { awarded: false, amount: 0 });
        }

        let change = TokenChange::builder()
            .user_id(user_id)
            .amount(amount)
            .transaction_type(TokenTransactionType::DailyLogin)
            .description(format!("Daily login bonus: {amount} tokens"))
            .build();
        repo.insert(&entry(&change, amount, balance_after, now)).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(balance_after, "Daily login bonus awarded");
        Ok(DailyLoginAward { awarded: true, amount })
    }

    fn generation_charge(user_id: UserId, website_id: WebsiteId, amount: i64, kind: TokenTransactionType) -> TokenChange {
        let description = match kind {
            TokenTransactionType::WebsiteGeneration => format!("Website generation: {amount} tokens"),
            _ => format!("Content generation: {amount} tokens"),
        };

        TokenChange::builder()
            .user_id(user_id)
            .amount(amount)
            .transaction_type(kind)
            .description(description)
            .metadata(serde_json::json!({ "websiteId": website_id }))
            .related_website_id(website_id)
            .build()
    }

    pub async fn charge_for_website_generation(&self, user_id: UserId, website_id: WebsiteId) -> Result<TokenReceipt> {
        let mut tx = self.db.begin().await.map_err(DbError::from)?;
        let receipt = self.charge_for_website_generation_in(&mut tx, user_id, website_id).await?;
        tx.commit().await.map_err(DbError::from)?;
        Ok(receipt)
    }

    pub async fn charge_for_website_generation_in(
        &self,
        conn: &mut SqliteConnection,
        user_id: UserId,
        website_id: WebsiteId,
    ) -> Result<TokenReceipt> {
        let change = Self::generation_charge(
            user_id,
            website_id,
            self.config.website_generation,
            TokenTransactionType::WebsiteGeneration,
        );
        self.debit_in(conn, &change).await
    }

    pub async fn charge_for_content_generation(&self, user_id: UserId, website_id: WebsiteId) -> Result<TokenReceipt> {
        let mut tx = self.db.begin().await.map_err(DbError::from)?;
        let receipt = self.charge_for_content_generation_in(&mut tx, user_id, website_id).await?;
        tx.commit().await.map_err(DbError::from)?;
        Ok(receipt)
    }

    pub async fn charge_for_content_generation_in(
        &self,
        conn: &mut SqliteConnection,
        user_id: UserId,
        website_id: WebsiteId,
    ) -> Result<TokenReceipt> {
        let change = Self::generation_charge(
            user_id,
            website_id,
            self.config.content_generation,
            TokenTransactionType::ContentGeneration,
        );
        self.debit_in(conn, &change).await
    }

    /// Manually purchased tokens
    pub async fn grant(&self, user_id: UserId, amount: i64, description: Option<String>) -> Result<TokenReceipt> {
        let change = TokenChange::builder()
            .user_id(user_id)
            .amount(amount)
            .transaction_type(TokenTransactionType::Purchase)
            .description(description.unwrap_or_else(|| format!("Purchased {amount} tokens")))
            .build();
        self.credit(change).await
    }

    /// A user's ledger entries, newest first
    pub async fn transaction_history(&self, user_id: UserId, pagination: &Pagination) -> Result<Page<TokenTransactionDBResponse>> {
        let mut conn = self.db.acquire().await.map_err(DbError::from)?;
        let mut repo = TokenTransactions::new(&mut conn);

        if repo.balance(user_id).await?.is_none() {
            return Err(Error::not_found("User", user_id));
        }

        let (skip, limit) = pagination.params();
        let data = repo.list(&TokenTransactionFilter::new(user_id, skip, limit)).await?;
        let total = repo.count(user_id).await?;

        Ok(Page::new(data, total, pagination))
    }

    pub async fn audit_balance(&self, user_id: UserId) -> Result<BalanceAudit> {
        let mut tx = self.db.begin().await.map_err(DbError::from)?;
        let mut repo = TokenTransactions::new(&mut tx);

        let stored_balance = repo.balance(user_id).await?.ok_or_else(|| Error::not_found("User", user_id))?;
        let ledger_sum = repo.sum_amounts(user_id).await?;
        tx.commit().await.map_err(DbError::from)?;

        let consistent = stored_balance == ledger_sum;
        if !consistent {
            warn!(user_id = %abbrev_uuid(&user_id), stored_balance, ledger_sum, "Token balance disagrees with ledger");
        }

        Ok(BalanceAudit {
            stored_balance,
            ledger_sum,
            consistent,
        })
    }
}
