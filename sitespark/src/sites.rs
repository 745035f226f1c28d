//! Website, blog post and form submission management.
//!
//! Every operation on a website's content checks that the website belongs to the calling user.
//! A website owned by someone else is reported as not found.

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

use crate::db::errors::DbError;
use crate::db::handlers::blog_posts::BlogPostFilter;
use crate::db::handlers::form_submissions::FormSubmissionFilter;
use crate::db::handlers::websites::WebsiteFilter;
use crate::db::handlers::{BlogPosts, FormSubmissions, Repository, Websites};
use crate::db::models::blog_posts::{BlogPostCreateDBRequest, BlogPostDBResponse, BlogPostStatus, BlogPostUpdateDBRequest};
use crate::db::models::form_submissions::{FormStats, FormSubmissionCreateDBRequest, FormSubmissionDBResponse};
use crate::db::models::websites::{
    WebsiteCreateDBRequest, WebsiteDBResponse, WebsiteStatus, WebsiteSummaryDBResponse, WebsiteUpdateDBRequest,
};
use crate::errors::{Error, Result};
use crate::pagination::{Page, Pagination};
use crate::types::{BlogPostId, UserId, WebsiteId, abbrev_uuid};

pub const SUBDOMAIN_MIN_LEN: usize = 3;
pub const SUBDOMAIN_MAX_LEN: usize = 63;
pub const NAME_MAX_LEN: usize = 100;
pub const DESCRIPTION_MAX_LEN: usize = 500;
pub const POST_TITLE_MAX_LEN: usize = 200;
pub const FORM_NAME_MAX_LEN: usize = 100;

pub fn validate_subdomain(subdomain: &str) -> Result<()> {
    let len = subdomain.len();
    if !(SUBDOMAIN_MIN_LEN..=SUBDOMAIN_MAX_LEN).contains(&len) {
        return Err(Error::bad_request(format!(
            "Subdomain must be between {SUBDOMAIN_MIN_LEN} and {SUBDOMAIN_MAX_LEN} characters"
        )));
    }
    if !subdomain.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return Err(Error::bad_request(
            "Subdomain can only contain lowercase letters, numbers, and hyphens",
        ));
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<()> {
    let len = name.trim().chars().count();
    if len == 0 {
        return Err(Error::bad_request("Name is required"));
    }
    if len > NAME_MAX_LEN {
        return Err(Error::bad_request(format!("Name must be at most {NAME_MAX_LEN} characters")));
    }
    Ok(())
}

pub fn validate_description(description: Option<&str>) -> Result<()> {
    if description.is_some_and(|d| d.chars().count() > DESCRIPTION_MAX_LEN) {
        return Err(Error::bad_request(format!(
            "Description must be at most {DESCRIPTION_MAX_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_post_title(title: &str) -> Result<()> {
    let len = title.trim().chars().count();
    if len == 0 || len > POST_TITLE_MAX_LEN {
        return Err(Error::bad_request(format!(
            "Title must be between 1 and {POST_TITLE_MAX_LEN} characters"
        )));
    }
    Ok(())
}

/// Map a unique violation on `websites.subdomain` to a conflict
pub fn subdomain_conflict(error: DbError) -> Error {
    match &error {
        DbError::UniqueViolation { table, constraint, .. }
            if table.as_deref() == Some("websites") && constraint.as_deref() == Some("subdomain") =>
        {
            Error::Conflict {
                message: "Subdomain already taken".to_string(),
            }
        }
        _ => error.into(),
    }
}

fn slug_conflict(error: DbError) -> Error {
    match error {
        DbError::UniqueViolation { .. } => Error::Conflict {
            message: "A post with this title already exists".to_string(),
        },
        other => other.into(),
    }
}

/// Load a website, treating another user's website as missing
pub async fn owned_website(conn: &mut SqliteConnection, user_id: UserId, website_id: WebsiteId) -> Result<WebsiteDBResponse> {
    Websites::new(conn)
        .get_owned(website_id, user_id)
        .await?
        .ok_or_else(|| Error::not_found("Website", website_id))
}

/// Write a generated website's `index.html`, `styles.css` and `site.json` into `dir`.
pub async fn export_site(website: &WebsiteDBResponse, dir: &Path) -> Result<Vec<PathBuf>> {
    let (Some(html), Some(css)) = (&website.generated_html, &website.generated_css) else {
        return Err(Error::bad_request("Website has not been generated yet"));
    };
    let config = serde_json::to_string_pretty(&website.config.0).map_err(|e| Error::Internal {
        operation: format!("serialize config for {}: {e}", website.subdomain),
    })?;

    fs::create_dir_all(dir).await.map_err(|e| Error::Internal {
        operation: format!("create {}: {e}", dir.display()),
    })?;

    let mut written = Vec::with_capacity(3);
    for (file, contents) in [("index.html", html.as_str()), ("styles.css", css.as_str()), ("site.json", config.as_str())] {
        let path = dir.join(file);
        fs::write(&path, contents).await.map_err(|e| Error::Internal {
            operation: format!("write {}: {e}", path.display()),
        })?;
        written.push(path);
    }

    info!(subdomain = %website.subdomain, dir = %dir.display(), "Website exported");
    Ok(written)
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebsiteCreate {
    pub name: String,
    pub subdomain: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebsiteUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub config: Option<serde_json::Value>,
    pub status: Option<WebsiteStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlogPostCreate {
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    #[serde(default)]
    pub status: BlogPostStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlogPostUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub status: Option<BlogPostStatus>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSubmit {
    pub form_name: String,
    pub data: serde_json::Value,
    #[serde(default)]
    pub ip_address: Option<String>,
}

/// Returned to anonymous visitors after a form post
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSubmitted {
    pub message: String,
    pub submission_id: crate::types::FormSubmissionId,
}

#[derive(Clone)]
pub struct SiteService {
    db: SqlitePool,
}

impl SiteService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    async fn conn(&self) -> Result<sqlx::pool::PoolConnection<sqlx::Sqlite>> {
        Ok(self.db.acquire().await.map_err(DbError::from)?)
    }

    // Websites

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&user_id), subdomain = %request.subdomain), err)]
    pub async fn create_website(&self, user_id: UserId, request: WebsiteCreate) -> Result<WebsiteDBResponse> {
        validate_name(&request.name)?;
        validate_subdomain(&request.subdomain)?;
        validate_description(request.description.as_deref())?;

        let mut conn = self.conn().await?;
        let website = Websites::new(&mut conn)
            .create(&WebsiteCreateDBRequest {
                user_id,
                name: request.name.trim().to_string(),
                subdomain: request.subdomain,
                description: request.description,
                status: WebsiteStatus::Draft,
            })
            .await
            .map_err(subdomain_conflict)?;

        info!(website_id = %abbrev_uuid(&website.id), "Website created");
        Ok(website)
    }

    pub async fn get_website(&self, user_id: UserId, website_id: WebsiteId) -> Result<WebsiteDBResponse> {
        let mut conn = self.conn().await?;
        owned_website(&mut conn, user_id, website_id).await
    }

    /// The user's websites, newest first, with blog post and form submission counts
    pub async fn list_websites(&self, user_id: UserId, pagination: &Pagination) -> Result<Page<WebsiteSummaryDBResponse>> {
        let mut conn = self.conn().await?;
        let mut repo = Websites::new(&mut conn);
        let (skip, limit) = pagination.params();

        let data = repo.list(&WebsiteFilter::new(user_id, skip, limit)).await?;
        let total = repo.count(user_id).await?;
        Ok(Page::new(data, total, pagination))
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&user_id), website_id = %abbrev_uuid(&website_id)), err)]
    pub async fn update_website(&self, user_id: UserId, website_id: WebsiteId, request: WebsiteUpdate) -> Result<WebsiteDBResponse> {
        if let Some(name) = &request.name {
            validate_name(name)?;
        }
        validate_description(request.description.as_deref())?;
        match request.status {
            Some(WebsiteStatus::Generating) => {
                return Err(Error::bad_request("Status 'generating' is managed by website generation"));
            }
            Some(WebsiteStatus::Published) => {
                return Err(Error::bad_request("Use publish to make a website public"));
            }
            _ => {}
        }

        let mut conn = self.conn().await?;
        if request.status.is_some() && owned_website(&mut conn, user_id, website_id).await?.status == WebsiteStatus::Generating {
            return Err(Error::bad_request("Website status cannot change while it is being generated"));
        }

        Websites::new(&mut conn)
            .update(
                website_id,
                user_id,
                &WebsiteUpdateDBRequest {
                    name: request.name.map(|n| n.trim().to_string()),
                    description: request.description,
                    config: request.config,
                    status: request.status,
                },
            )
            .await?
            .ok_or_else(|| Error::not_found("Website", website_id))
    }

    /// Make a generated website publicly reachable at its subdomain
    pub async fn publish_website(&self, user_id: UserId, website_id: WebsiteId) -> Result<WebsiteDBResponse> {
        let mut conn = self.conn().await?;
        let website = owned_website(&mut conn, user_id, website_id).await?;

        if website.generated_html.is_none() || website.status == WebsiteStatus::Generating {
            return Err(Error::bad_request("Website has not been generated yet"));
        }

        let website = Websites::new(&mut conn)
            .update(
                website_id,
                user_id,
                &WebsiteUpdateDBRequest {
                    status: Some(WebsiteStatus::Published),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| Error::not_found("Website", website_id))?;

        info!(website_id = %abbrev_uuid(&website_id), subdomain = %website.subdomain, "Website published");
        Ok(website)
    }

    /// Delete a website with its blog posts and form submissions
    pub async fn delete_website(&self, user_id: UserId, website_id: WebsiteId) -> Result<()> {
        let mut conn = self.conn().await?;
        if !Websites::new(&mut conn).delete_owned(website_id, user_id).await? {
            return Err(Error::not_found("Website", website_id));
        }
        info!(website_id = %abbrev_uuid(&website_id), "Website deleted");
        Ok(())
    }

    /// Serve a published site by subdomain and count the view
    pub async fn view_published_site(&self, subdomain: &str) -> Result<WebsiteDBResponse> {
        let mut conn = self.conn().await?;
        Websites::new(&mut conn)
            .record_view(subdomain)
            .await?
            .ok_or_else(|| Error::not_found("Website", subdomain))
    }

    // Blog posts

    #[instrument(skip(self, request), fields(website_id = %abbrev_uuid(&website_id)), err)]
    pub async fn create_post(&self, user_id: UserId, website_id: WebsiteId, request: BlogPostCreate) -> Result<BlogPostDBResponse> {
        validate_post_title(&request.title)?;
        if request.content.trim().is_empty() {
            return Err(Error::bad_request("Content is required"));
        }

        let mut conn = self.conn().await?;
        owned_website(&mut conn, user_id, website_id).await?;

        let post = BlogPosts::new(&mut conn)
            .create(&BlogPostCreateDBRequest {
                website_id,
                title: request.title.trim().to_string(),
                content: request.content,
                excerpt: request.excerpt,
                cover_image: request.cover_image,
                status: request.status,
            })
            .await
            .map_err(slug_conflict)?;

        info!(post_id = %abbrev_uuid(&post.id), slug = %post.slug, "Blog post created");
        Ok(post)
    }

    async fn owned_post(
        conn: &mut SqliteConnection,
        user_id: UserId,
        website_id: WebsiteId,
        post_id: BlogPostId,
    ) -> Result<BlogPostDBResponse> {
        owned_website(conn, user_id, website_id).await?;
        BlogPosts::new(conn)
            .get_by_id(post_id)
            .await?
            .filter(|post| post.website_id == website_id)
            .ok_or_else(|| Error::not_found("Blog post", post_id))
    }

    pub async fn get_post(&self, user_id: UserId, website_id: WebsiteId, post_id: BlogPostId) -> Result<BlogPostDBResponse> {
        let mut conn = self.conn().await?;
        Self::owned_post(&mut conn, user_id, website_id, post_id).await
    }

    pub async fn list_posts(
        &self,
        user_id: UserId,
        website_id: WebsiteId,
        status: Option<BlogPostStatus>,
        pagination: &Pagination,
    ) -> Result<Page<BlogPostDBResponse>> {
        let mut conn = self.conn().await?;
        owned_website(&mut conn, user_id, website_id).await?;

        let (skip, limit) = pagination.params();
        let mut filter = BlogPostFilter::new(website_id, skip, limit);
        if let Some(status) = status {
            filter = filter.with_status(status);
        }

        let mut repo = BlogPosts::new(&mut conn);
        let data = repo.list(&filter).await?;
        let total = repo.count(&filter).await?;
        Ok(Page::new(data, total, pagination))
    }

    #[instrument(skip(self, request), fields(post_id = %abbrev_uuid(&post_id)), err)]
    pub async fn update_post(
        &self,
        user_id: UserId,
        website_id: WebsiteId,
        post_id: BlogPostId,
        request: BlogPostUpdate,
    ) -> Result<BlogPostDBResponse> {
        if let Some(title) = &request.title {
            validate_post_title(title)?;
        }

        let mut conn = self.conn().await?;
        Self::owned_post(&mut conn, user_id, website_id, post_id).await?;

        BlogPosts::new(&mut conn)
            .update(
                post_id,
                &BlogPostUpdateDBRequest {
                    title: request.title.map(|t| t.trim().to_string()),
                    content: request.content,
                    excerpt: request.excerpt,
                    cover_image: request.cover_image,
                    status: request.status,
                },
            )
            .await
            .map_err(slug_conflict)
    }

    pub async fn delete_post(&self, user_id: UserId, website_id: WebsiteId, post_id: BlogPostId) -> Result<()> {
        let mut conn = self.conn().await?;
        Self::owned_post(&mut conn, user_id, website_id, post_id).await?;
        BlogPosts::new(&mut conn).delete(post_id).await?;
        Ok(())
    }

    // Forms

    /// Record a visitor's form post. The website only has to exist.
    #[instrument(skip(self, request), fields(website_id = %abbrev_uuid(&website_id), form_name = %request.form_name), err)]
    pub async fn submit_form(&self, website_id: WebsiteId, request: FormSubmit) -> Result<FormSubmitted> {
        let form_name = request.form_name.trim();
        if form_name.is_empty() || form_name.chars().count() > FORM_NAME_MAX_LEN {
            return Err(Error::bad_request(format!(
                "Form name must be between 1 and {FORM_NAME_MAX_LEN} characters"
            )));
        }
        if !request.data.is_object() {
            return Err(Error::bad_request("Form data must be an object"));
        }

        let mut conn = self.conn().await?;
        if Websites::new(&mut conn).get_by_id(website_id).await?.is_none() {
            return Err(Error::not_found("Website", website_id));
        }

        let submission = FormSubmissions::new(&mut conn)
            .create(
                website_id,
                &FormSubmissionCreateDBRequest {
                    form_name: form_name.to_string(),
                    data: request.data,
                    ip_address: request.ip_address,
                },
            )
            .await?;

        info!("Form submitted");
        Ok(FormSubmitted {
            message: "Form submitted successfully".to_string(),
            submission_id: submission.id,
        })
    }

    pub async fn list_submissions(
        &self,
        user_id: UserId,
        website_id: WebsiteId,
        form_name: Option<String>,
        pagination: &Pagination,
    ) -> Result<Page<FormSubmissionDBResponse>> {
        let mut conn = self.conn().await?;
        owned_website(&mut conn, user_id, website_id).await?;

        let (skip, limit) = pagination.params();
        let filter = FormSubmissionFilter::new(website_id, form_name, skip, limit);
        let mut repo = FormSubmissions::new(&mut conn);
        let data = repo.list(&filter).await?;
        let total = repo.count(&filter).await?;
        Ok(Page::new(data, total, pagination))
    }

    pub async fn form_stats(&self, user_id: UserId, website_id: WebsiteId) -> Result<FormStats> {
        let mut conn = self.conn().await?;
        owned_website(&mut conn, user_id, website_id).await?;
        Ok(FormSubmissions::new(&mut conn).stats(website_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::Websites;
    use crate::db::models::websites::WebsiteGenerationDBRequest;
    use crate::test_utils::{create_test_user, create_test_website};
    use serde_json::json;
    use uuid::Uuid;

    fn site(subdomain: &str) -> WebsiteCreate {
        WebsiteCreate {
            name: "  Corner Bakery ".to_string(),
            subdomain: subdomain.to_string(),
            description: Some("Fresh bread daily".to_string()),
        }
    }

    fn post(title: &str) -> BlogPostCreate {
        BlogPostCreate {
            title: title.to_string(),
            content: "Our sourdough starter is twelve years old.".to_string(),
            excerpt: None,
            cover_image: None,
            status: BlogPostStatus::Draft,
        }
    }

    #[test]
    fn test_validate_subdomain() {
        assert!(validate_subdomain("my-site-01").is_ok());
        assert!(validate_subdomain("ab").is_err());
        assert!(validate_subdomain(&"a".repeat(64)).is_err());
        assert!(validate_subdomain("My-Site").is_err());
        assert!(validate_subdomain("my_site").is_err());
    }

    #[test]
    fn test_validate_name_and_description() {
        assert!(validate_name("Bakery").is_ok());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"n".repeat(101)).is_err());
        assert!(validate_description(None).is_ok());
        assert!(validate_description(Some(&"d".repeat(500))).is_ok());
        assert!(validate_description(Some(&"d".repeat(501))).is_err());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_website_lifecycle(pool: SqlitePool) {
        let service = SiteService::new(pool.clone());
        let user = create_test_user(&pool).await;

        let website = service.create_website(user.id, site("corner-bakery")).await.unwrap();
        assert_eq!(website.name, "Corner Bakery");
        assert_eq!(website.status, WebsiteStatus::Draft);

        let err = service.create_website(user.id, site("corner-bakery")).await.unwrap_err();
        assert!(matches!(&err, Error::Conflict { message } if message == "Subdomain already taken"));

        let updated = service
            .update_website(
                user.id,
                website.id,
                WebsiteUpdate {
                    name: Some("Bakery on the Corner".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Bakery on the Corner");
        assert_eq!(updated.description.as_deref(), Some("Fresh bread daily"));

        let page = service.list_websites(user.id, &Pagination::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].subdomain, "corner-bakery");

        service.delete_website(user.id, website.id).await.unwrap();
        assert!(matches!(
            service.get_website(user.id, website.id).await,
            Err(Error::NotFound { .. })
        ));
    }

    #[sqlx::test]
    async fn test_other_users_website_is_not_found(pool: SqlitePool) {
        let service = SiteService::new(pool.clone());
        let owner = create_test_user(&pool).await;
        let stranger = create_test_user(&pool).await;
        let website = create_test_website(&pool, owner.id).await;

        assert!(matches!(
            service.get_website(stranger.id, website.id).await,
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            service.create_post(stranger.id, website.id, post("Hello")).await,
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            service.delete_website(stranger.id, website.id).await,
            Err(Error::NotFound { .. })
        ));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_publish_requires_generated_site(pool: SqlitePool) {
        let service = SiteService::new(pool.clone());
        let user = create_test_user(&pool).await;
        let website = create_test_website(&pool, user.id).await;

        assert!(matches!(
            service.publish_website(user.id, website.id).await,
            Err(Error::BadRequest { .. })
        ));
        assert!(matches!(
            service.view_published_site(&website.subdomain).await,
            Err(Error::NotFound { .. })
        ));

        let mut conn = pool.acquire().await.unwrap();
        Websites::new(&mut conn)
            .store_generation(
                website.id,
                &WebsiteGenerationDBRequest {
                    html: "<html></html>".to_string(),
                    css: ":root {}".to_string(),
                    config: json!({}),
                    ai_model: "mock".to_string(),
                },
            )
            .await
            .unwrap();

        let published = service.publish_website(user.id, website.id).await.unwrap();
        assert_eq!(published.status, WebsiteStatus::Published);
        assert!(published.published_at.is_some());

        service.view_published_site(&website.subdomain).await.unwrap();
        let viewed = service.view_published_site(&website.subdomain).await.unwrap();
        assert_eq!(viewed.view_count, 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_cannot_publish_or_interrupt_generation(pool: SqlitePool) {
        let service = SiteService::new(pool.clone());
        let user = create_test_user(&pool).await;
        let website = create_test_website(&pool, user.id).await;

        let status = |status| WebsiteUpdate {
            status: Some(status),
            ..Default::default()
        };

        // An ungenerated draft must not become public through a plain update
        let err = service
            .update_website(user.id, website.id, status(WebsiteStatus::Published))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
        assert!(matches!(
            service.view_published_site(&website.subdomain).await,
            Err(Error::NotFound { .. })
        ));
        assert_eq!(service.get_website(user.id, website.id).await.unwrap().status, WebsiteStatus::Draft);

        let mut conn = pool.acquire().await.unwrap();
        Websites::new(&mut conn)
            .update(
                website.id,
                user.id,
                &WebsiteUpdateDBRequest {
                    status: Some(WebsiteStatus::Generating),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        drop(conn);

        for target in [WebsiteStatus::Draft, WebsiteStatus::Archived] {
            let err = service.update_website(user.id, website.id, status(target)).await.unwrap_err();
            assert!(matches!(err, Error::BadRequest { .. }));
        }

        // Renaming does not touch the status and stays allowed
        let renamed = service
            .update_website(
                user.id,
                website.id,
                WebsiteUpdate {
                    name: Some("Still Baking".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Still Baking");
        assert_eq!(renamed.status, WebsiteStatus::Generating);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_blog_posts(pool: SqlitePool) {
        let service = SiteService::new(pool.clone());
        let user = create_test_user(&pool).await;
        let website = create_test_website(&pool, user.id).await;

        let first = service.create_post(user.id, website.id, post("Hello, World!")).await.unwrap();
        assert_eq!(first.slug, "hello-world");

        let err = service.create_post(user.id, website.id, post("Hello World")).await.unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));

        let second = service.create_post(user.id, website.id, post("Second post")).await.unwrap();
        let published = service
            .update_post(
                user.id,
                website.id,
                second.id,
                BlogPostUpdate {
                    status: Some(BlogPostStatus::Published),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(published.published_at.is_some());

        let all = service
            .list_posts(user.id, website.id, None, &Pagination::default())
            .await
            .unwrap();
        assert_eq!(all.total, 2);
        let live = service
            .list_posts(user.id, website.id, Some(BlogPostStatus::Published), &Pagination::default())
            .await
            .unwrap();
        assert_eq!(live.total, 1);
        assert_eq!(live.data[0].id, second.id);

        // A post is only reachable through its own website
        let other_site = create_test_website(&pool, user.id).await;
        assert!(matches!(
            service.get_post(user.id, other_site.id, first.id).await,
            Err(Error::NotFound { .. })
        ));

        service.delete_post(user.id, website.id, first.id).await.unwrap();
        assert!(matches!(
            service.get_post(user.id, website.id, first.id).await,
            Err(Error::NotFound { .. })
        ));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_forms(pool: SqlitePool) {
        let service = SiteService::new(pool.clone());
        let user = create_test_user(&pool).await;
        let website = create_test_website(&pool, user.id).await;

        for form in ["contact", "contact", "newsletter"] {
            service
                .submit_form(
                    website.id,
                    FormSubmit {
                        form_name: form.to_string(),
                        data: json!({ "email": "visitor@example.com" }),
                        ip_address: Some("203.0.113.7".to_string()),
                    },
                )
                .await
                .unwrap();
        }

        let missing = service
            .submit_form(
                Uuid::new_v4(),
                FormSubmit {
                    form_name: "contact".to_string(),
                    data: json!({}),
                    ip_address: None,
                },
            )
            .await;
        assert!(matches!(missing, Err(Error::NotFound { .. })));

        let not_object = service
            .submit_form(
                website.id,
                FormSubmit {
                    form_name: "contact".to_string(),
                    data: json!(["x"]),
                    ip_address: None,
                },
            )
            .await;
        assert!(matches!(not_object, Err(Error::BadRequest { .. })));

        let contact = service
            .list_submissions(user.id, website.id, Some("contact".to_string()), &Pagination::default())
            .await
            .unwrap();
        assert_eq!(contact.total, 2);

        let stats = service.form_stats(user.id, website.id).await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_form.len(), 2);
    }

    #[sqlx::test]
    async fn test_export_site(pool: SqlitePool) {
        let user = create_test_user(&pool).await;
        let website = create_test_website(&pool, user.id).await;
        let dir = tempfile::tempdir().unwrap();

        let err = export_site(&website, dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));

        let mut conn = pool.acquire().await.unwrap();
        let website = Websites::new(&mut conn)
            .store_generation(
                website.id,
                &WebsiteGenerationDBRequest {
                    html: "<html></html>".to_string(),
                    css: "body {}".to_string(),
                    config: json!({"name": "Test Site"}),
                    ai_model: "mock".to_string(),
                },
            )
            .await
            .unwrap();

        let out = dir.path().join("nested");
        let written = export_site(&website, &out).await.unwrap();
        assert_eq!(written.len(), 3);
        assert_eq!(std::fs::read_to_string(out.join("index.html")).unwrap(), "<html></html>");
        assert_eq!(std::fs::read_to_string(out.join("styles.css")).unwrap(), "body {}");
        let config: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(out.join("site.json")).unwrap()).unwrap();
        assert_eq!(config["name"], "Test Site");
    }
}
