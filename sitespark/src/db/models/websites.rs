//! Database models for websites.

use crate::types::{UserId, WebsiteId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

/// Website lifecycle status stored as TEXT in database
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WebsiteStatus {
    #[default]
    Draft,
    Generating,
    Published,
    Archived,
}

/// Database request for creating a website
#[derive(Debug, Clone)]
pub struct WebsiteCreateDBRequest {
    pub user_id: UserId,
    pub name: String,
    pub subdomain: String,
    pub description: Option<String>,
    pub status: WebsiteStatus,
}

/// Database request for updating a website; `None` leaves a column unchanged
#[derive(Debug, Clone, Default)]
pub struct WebsiteUpdateDBRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub config: Option<serde_json::Value>,
    pub status: Option<WebsiteStatus>,
}

/// Generated artifacts stored once the pipeline finishes
#[derive(Debug, Clone)]
pub struct WebsiteGenerationDBRequest {
    pub html: String,
    pub css: String,
    pub config: serde_json::Value,
    pub ai_model: String,
}

/// Database response for a website
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WebsiteDBResponse {
    pub id: WebsiteId,
    pub user_id: UserId,
    pub name: String,
    pub subdomain: String,
    pub description: Option<String>,
    pub status: WebsiteStatus,
    pub generated_html: Option<String>,
    pub generated_css: Option<String>,
    pub config: Json<serde_json::Value>,
    pub ai_model: Option<String>,
    pub view_count: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Website list entry with related record counts
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WebsiteSummaryDBResponse {
    pub id: WebsiteId,
    pub name: String,
    pub subdomain: String,
    pub description: Option<String>,
    pub status: WebsiteStatus,
    pub view_count: i64,
    pub blog_post_count: i64,
    pub form_submission_count: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
