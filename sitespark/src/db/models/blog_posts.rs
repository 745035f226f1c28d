//! Database models for blog posts.

use crate::types::{BlogPostId, WebsiteId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BlogPostStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

/// Database request for creating a blog post
#[derive(Debug, Clone)]
pub struct BlogPostCreateDBRequest {
    pub website_id: WebsiteId,
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub status: BlogPostStatus,
}

/// Database request for updating a blog post; `None` leaves a column unchanged
#[derive(Debug, Clone, Default)]
pub struct BlogPostUpdateDBRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub status: Option<BlogPostStatus>,
}

/// Database response for a blog post
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BlogPostDBResponse {
    pub id: BlogPostId,
    pub website_id: WebsiteId,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub status: BlogPostStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
