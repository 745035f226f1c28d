//! Database models for the token ledger.

use crate::types::{TransactionId, UserId, WebsiteId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use std::fmt;

/// Ledger entry type enum stored as TEXT in database
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TokenTransactionType {
    SignupBonus,
    DailyLogin,
    WebsiteGeneration,
    ContentGeneration,
    Purchase,
    AdminGrant,
    Referral,
    Refund,
}

impl TokenTransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignupBonus => "signup_bonus",
            Self::DailyLogin => "daily_login",
            Self::WebsiteGeneration => "website_generation",
            Self::ContentGeneration => "content_generation",
            Self::Purchase => "purchase",
            Self::AdminGrant => "admin_grant",
            Self::Referral => "referral",
            Self::Refund => "refund",
        }
    }
}

impl fmt::Display for TokenTransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database request for appending a ledger entry
#[derive(Debug, Clone)]
pub struct TokenTransactionCreateDBRequest {
    pub user_id: UserId,
    /// Signed: negative for debits
    pub amount: i64,
    pub balance_after: i64,
    pub transaction_type: TokenTransactionType,
    pub description: String,
    pub metadata: Option<serde_json::Value>,
    pub related_website_id: Option<WebsiteId>,
    pub created_at: DateTime<Utc>,
}

/// Database response for a ledger entry
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TokenTransactionDBResponse {
    pub id: TransactionId,
    pub user_id: UserId,
    pub amount: i64,
    pub balance_after: i64,
    pub transaction_type: TokenTransactionType,
    pub description: String,
    pub metadata: Option<Json<serde_json::Value>>,
    pub related_website_id: Option<WebsiteId>,
    pub created_at: DateTime<Utc>,
}
