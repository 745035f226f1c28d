//! Database repository for websites.
//!
//! Every user-facing lookup is scoped by owner: a website that exists but belongs to someone
//! else is indistinguishable from one that does not exist.

use crate::db::{
    errors::Result,
    models::websites::{
        WebsiteCreateDBRequest, WebsiteDBResponse, WebsiteGenerationDBRequest, WebsiteStatus, WebsiteSummaryDBResponse,
        WebsiteUpdateDBRequest,
    },
};
use crate::types::{UserId, WebsiteId, abbrev_uuid};
use chrono::Utc;
use sqlx::SqliteConnection;
use sqlx::types::Json;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing a user's websites
#[derive(Debug, Clone)]
pub struct WebsiteFilter {
    pub user_id: UserId,
    pub skip: i64,
    pub limit: i64,
}

impl WebsiteFilter {
    pub fn new(user_id: UserId, skip: i64, limit: i64) -> Self {
        Self { user_id, skip, limit }
    }
}

pub struct Websites<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Websites<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Insert a website with an empty config. Fails with a unique violation on a taken subdomain.
    #[instrument(skip(self, request), fields(subdomain = %request.subdomain, user_id = %abbrev_uuid(&request.user_id)), err)]
    pub async fn create(&mut self, request: &WebsiteCreateDBRequest) -> Result<WebsiteDBResponse> {
        let now = Utc::now();
        let website = sqlx::query_as::<_, WebsiteDBResponse>(
            r#"
            INSERT INTO websites (id, user_id, name, subdomain, description, status, config, view_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, '{}', 0, $7, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(&request.name)
        .bind(&request.subdomain)
        .bind(&request.description)
        .bind(request.status)
        .bind(now)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(website)
    }

    #[instrument(skip(self), fields(website_id = %abbrev_uuid(&id)), err)]
    pub async fn get_owned(&mut self, id: WebsiteId, user_id: UserId) -> Result<Option<WebsiteDBResponse>> {
        let website = sqlx::query_as::<_, WebsiteDBResponse>("SELECT * FROM websites WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(website)
    }

    /// Unscoped lookup, for public traffic such as form posts
    pub async fn get_by_id(&mut self, id: WebsiteId) -> Result<Option<WebsiteDBResponse>> {
        let website = sqlx::query_as::<_, WebsiteDBResponse>("SELECT * FROM websites WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(website)
    }

    pub async fn get_by_subdomain(&mut self, subdomain: &str) -> Result<Option<WebsiteDBResponse>> {
        let website = sqlx::query_as::<_, WebsiteDBResponse>("SELECT * FROM websites WHERE subdomain = $1")
            .bind(subdomain)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(website)
    }

    /// List a user's websites, newest first, with blog post and form submission counts
    pub async fn list(&mut self, filter: &WebsiteFilter) -> Result<Vec<WebsiteSummaryDBResponse>> {
        let websites = sqlx::query_as::<_, WebsiteSummaryDBResponse>(
            r#"
            SELECT
                w.id, w.name, w.subdomain, w.description, w.status, w.view_count,
                w.published_at, w.created_at, w.updated_at,
                (SELECT COUNT(*) FROM blog_posts b WHERE b.website_id = w.id) AS blog_post_count,
                (SELECT COUNT(*) FROM form_submissions f WHERE f.website_id = w.id) AS form_submission_count
            FROM websites w
            WHERE w.user_id = $1
            ORDER BY w.created_at DESC, w.rowid DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(websites)
    }

    pub async fn count(&mut self, user_id: UserId) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM websites WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }

    /// Apply a partial update. Moving to `published` stamps `published_at`.
    ///
    /// Returns `None` when the website does not exist for this owner.
    #[instrument(skip(self, request), fields(website_id = %abbrev_uuid(&id)), err)]
    pub async fn update(
        &mut self,
        id: WebsiteId,
        user_id: UserId,
        request: &WebsiteUpdateDBRequest,
    ) -> Result<Option<WebsiteDBResponse>> {
        let now = Utc::now();
        let published_at = (request.status == Some(WebsiteStatus::Published)).then_some(now);

        let website = sqlx::query_as::<_, WebsiteDBResponse>(
            r#"
            UPDATE websites SET
                name = COALESCE($1, name),
                description = COALESCE($2, description),
                config = COALESCE($3, config),
                status = COALESCE($4, status),
                published_at = COALESCE($5, published_at),
                updated_at = $6
            WHERE id = $7 AND user_id = $8
            RETURNING *
            "#,
        )
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.config.as_ref().map(Json))
        .bind(request.status)
        .bind(published_at)
        .bind(now)
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(website)
    }

    /// Store pipeline output and move the site back to `draft`
    #[instrument(skip(self, request), fields(website_id = %abbrev_uuid(&id)), err)]
    pub async fn store_generation(&mut self, id: WebsiteId, request: &WebsiteGenerationDBRequest) -> Result<WebsiteDBResponse> {
        let website = sqlx::query_as::<_, WebsiteDBResponse>(
            r#"
            UPDATE websites SET
                generated_html = $1,
                generated_css = $2,
                config = $3,
                ai_model = $4,
                status = 'draft',
                updated_at = $5
            WHERE id = $6
            RETURNING *
            "#,
        )
        .bind(&request.html)
        .bind(&request.css)
        .bind(Json(&request.config))
        .bind(&request.ai_model)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(website)
    }

    /// Replace only the generated HTML and/or CSS
    pub async fn store_artifacts(&mut self, id: WebsiteId, html: Option<&str>, css: Option<&str>) -> Result<WebsiteDBResponse> {
        let website = sqlx::query_as::<_, WebsiteDBResponse>(
            r#"
            UPDATE websites SET
                generated_html = COALESCE($1, generated_html),
                generated_css = COALESCE($2, generated_css),
                updated_at = $3
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(html)
        .bind(css)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(website)
    }

    #[instrument(skip(self), fields(website_id = %abbrev_uuid(&id)), err)]
    pub async fn delete_owned(&mut self, id: WebsiteId, user_id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM websites WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete regardless of owner; used to release a reserved subdomain after a failed generation
    pub async fn delete(&mut self, id: WebsiteId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM websites WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count a page view on a published site
    pub async fn record_view(&mut self, subdomain: &str) -> Result<Option<WebsiteDBResponse>> {
        let website = sqlx::query_as::<_, WebsiteDBResponse>(
            r#"
            UPDATE websites SET view_count = view_count + 1
            WHERE subdomain = $1 AND status = 'published'
            RETURNING *
            "#,
        )
        .bind(subdomain)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(website)
    }
}
