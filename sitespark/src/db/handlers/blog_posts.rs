//! Database repository for blog posts.

use crate::db::{
    errors::Result,
    handlers::repository::Repository,
    models::blog_posts::{BlogPostCreateDBRequest, BlogPostDBResponse, BlogPostStatus, BlogPostUpdateDBRequest},
};
use crate::types::{BlogPostId, WebsiteId, abbrev_uuid, truncate_chars};
use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::instrument;
use uuid::Uuid;

const MAX_SLUG_LEN: usize = 100;
const EXCERPT_LEN: usize = 200;

/// URL slug for a post title: lower-case ASCII alphanumerics joined by single hyphens.
pub fn slugify(title: &str) -> String {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() || *c == '-')
        .collect();

    let slug = cleaned.split_whitespace().collect::<Vec<_>>().join("-");
    let mut collapsed = String::with_capacity(slug.len());
    for c in slug.chars() {
        if c == '-' && collapsed.ends_with('-') {
            continue;
        }
        collapsed.push(c);
    }

    truncate_chars(&collapsed, MAX_SLUG_LEN)
}

/// Filter for listing posts of one website
#[derive(Debug, Clone)]
pub struct BlogPostFilter {
    pub website_id: WebsiteId,
    pub status: Option<BlogPostStatus>,
    pub skip: i64,
    pub limit: i64,
}

impl BlogPostFilter {
    pub fn new(website_id: WebsiteId, skip: i64, limit: i64) -> Self {
        Self {
            website_id,
            status: None,
            skip,
            limit,
        }
    }

    pub fn with_status(mut self, status: BlogPostStatus) -> Self {
        self.status = Some(status);
        self
    }
}

pub struct BlogPosts<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> BlogPosts<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    pub async fn count(&mut self, filter: &BlogPostFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM blog_posts WHERE website_id = $1 AND ($2 IS NULL OR status = $2)",
        )
        .bind(filter.website_id)
        .bind(filter.status)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(count)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for BlogPosts<'c> {
    type CreateRequest = BlogPostCreateDBRequest;
    type UpdateRequest = BlogPostUpdateDBRequest;
    type Response = BlogPostDBResponse;
    type Id = BlogPostId;
    type Filter = BlogPostFilter;

    /// Slug comes from the title; the excerpt defaults to the start of the content.
    #[instrument(skip(self, request), fields(website_id = %abbrev_uuid(&request.website_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let now = Utc::now();
        let excerpt = request
            .excerpt
            .clone()
            .unwrap_or_else(|| truncate_chars(&request.content, EXCERPT_LEN));
        let published_at = (request.status == BlogPostStatus::Published).then_some(now);

        let post = sqlx::query_as::<_, BlogPostDBResponse>(
            r#"
            INSERT INTO blog_posts
                (id, website_id, title, slug, content, excerpt, cover_image, status, published_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.website_id)
        .bind(&request.title)
        .bind(slugify(&request.title))
        .bind(&request.content)
        .bind(excerpt)
        .bind(&request.cover_image)
        .bind(request.status)
        .bind(published_at)
        .bind(now)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(post)
    }

    #[instrument(skip(self), fields(post_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let post = sqlx::query_as::<_, BlogPostDBResponse>("SELECT * FROM blog_posts WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(post)
    }

    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let posts = sqlx::query_as::<_, BlogPostDBResponse>(
            r#"
            SELECT * FROM blog_posts
            WHERE website_id = $1 AND ($2 IS NULL OR status = $2)
            ORDER BY created_at DESC, rowid DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.website_id)
        .bind(filter.status)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(posts)
    }

    #[instrument(skip(self), fields(post_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM blog_posts WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// A new title regenerates the slug; the first move to `published` stamps `published_at`.
    #[instrument(skip(self, request), fields(post_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let now = Utc::now();
        let slug = request.title.as_deref().map(slugify);
        let published_at = (request.status == Some(BlogPostStatus::Published)).then_some(now);

        let post = sqlx::query_as::<_, BlogPostDBResponse>(
            r#"
            UPDATE blog_posts SET
                title = COALESCE($1, title),
                slug = COALESCE($2, slug),
                content = COALESCE($3, content),
                excerpt = COALESCE($4, excerpt),
                cover_image = COALESCE($5, cover_image),
                status = COALESCE($6, status),
                published_at = COALESCE(published_at, $7),
                updated_at = $8
            WHERE id = $9
            RETURNING *
            "#,
        )
        .bind(&request.title)
        .bind(slug)
        .bind(&request.content)
        .bind(&request.excerpt)
        .bind(&request.cover_image)
        .bind(request.status)
        .bind(published_at)
        .bind(now)
        .bind(id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::errors::DbError;
    use crate::test_utils::{create_test_user, create_test_website};
    use sqlx::SqlitePool;

    fn post(website_id: WebsiteId, title: &str) -> BlogPostCreateDBRequest {
        BlogPostCreateDBRequest {
            website_id,
            title: title.to_string(),
            content: "x".repeat(300),
            excerpt: None,
            cover_image: None,
            status: BlogPostStatus::Draft,
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  Rust   &  SQLite -- Notes "), "rust-sqlite-notes");
        assert_eq!(slugify("Crème brûlée"), "crme-brle");
        assert_eq!(slugify(&"a".repeat(150)).len(), 100);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_defaults(pool: SqlitePool) {
        let user = create_test_user(&pool).await;
        let site = create_test_website(&pool, user.id).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = BlogPosts::new(&mut conn);

        let created = repo.create(&post(site.id, "First Post")).await.unwrap();
        assert_eq!(created.slug, "first-post");
        assert_eq!(created.excerpt.as_deref().map(str::len), Some(200));
        assert!(created.published_at.is_none());

        let err = repo.create(&post(site.id, "first post")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_and_filter(pool: SqlitePool) {
        let user = create_test_user(&pool).await;
        let site = create_test_website(&pool, user.id).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = BlogPosts::new(&mut conn);

        let draft = repo.create(&post(site.id, "Draft")).await.unwrap();
        let other = repo.create(&post(site.id, "Other")).await.unwrap();

        let published = repo
            .update(
                draft.id,
                &BlogPostUpdateDBRequest {
                    title: Some("Now Live".to_string()),
                    status: Some(BlogPostStatus::Published),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(published.slug, "now-live");
        let first_published_at = published.published_at.unwrap();

        // Re-publishing keeps the original timestamp
        let again = repo
            .update(
                draft.id,
                &BlogPostUpdateDBRequest {
                    status: Some(BlogPostStatus::Published),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(again.published_at, Some(first_published_at));

        let filter = BlogPostFilter::new(site.id, 0, 10).with_status(BlogPostStatus::Published);
        let live = repo.list(&filter).await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, draft.id);
        assert_eq!(repo.count(&filter).await.unwrap(), 1);
        assert_eq!(repo.count(&BlogPostFilter::new(site.id, 0, 10)).await.unwrap(), 2);

        assert!(repo.delete(other.id).await.unwrap());
        assert!(repo.get_by_id(other.id).await.unwrap().is_none());
    }
}
