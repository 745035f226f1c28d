//! Database repository for form submissions.

use crate::db::{
    errors::Result,
    models::form_submissions::{FormCount, FormStats, FormSubmissionCreateDBRequest, FormSubmissionDBResponse},
};
use crate::types::{WebsiteId, abbrev_uuid};
use chrono::Utc;
use sqlx::SqliteConnection;
use sqlx::types::Json;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing submissions of one website
#[derive(Debug, Clone)]
pub struct FormSubmissionFilter {
    pub website_id: WebsiteId,
    pub form_name: Option<String>,
    pub skip: i64,
    pub limit: i64,
}

impl FormSubmissionFilter {
    pub fn new(website_id: WebsiteId, form_name: Option<String>, skip: i64, limit: i64) -> Self {
        Self {
            website_id,
            form_name,
            skip,
            limit,
        }
    }
}

pub struct FormSubmissions<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> FormSubmissions<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(website_id = %abbrev_uuid(&website_id), form = %request.form_name), err)]
    pub async fn create(&mut self, website_id: WebsiteId, request: &FormSubmissionCreateDBRequest) -> Result<FormSubmissionDBResponse> {
        let submission = sqlx::query_as::<_, FormSubmissionDBResponse>(
            r#"
            INSERT INTO form_submissions (id, website_id, form_name, data, ip_address, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(website_id)
        .bind(&request.form_name)
        .bind(Json(&request.data))
        .bind(&request.ip_address)
        .bind(Utc::now())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(submission)
    }

    pub async fn list(&mut self, filter: &FormSubmissionFilter) -> Result<Vec<FormSubmissionDBResponse>> {
        let submissions = sqlx::query_as::<_, FormSubmissionDBResponse>(
            r#"
            SELECT * FROM form_submissions
            WHERE website_id = $1 AND ($2 IS NULL OR form_name = $2)
            ORDER BY created_at DESC, rowid DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.website_id)
        .bind(&filter.form_name)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(submissions)
    }

    pub async fn count(&mut self, filter: &FormSubmissionFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM form_submissions WHERE website_id = $1 AND ($2 IS NULL OR form_name = $2)",
        )
        .bind(filter.website_id)
        .bind(&filter.form_name)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(count)
    }

    /// Total submissions plus a per-form breakdown, busiest form first
    pub async fn stats(&mut self, website_id: WebsiteId) -> Result<FormStats> {
        let by_form = sqlx::query_as::<_, FormCount>(
            r#"
            SELECT form_name, COUNT(*) AS count
            FROM form_submissions
            WHERE website_id = $1
            GROUP BY form_name
            ORDER BY count DESC, form_name ASC
            "#,
        )
        .bind(website_id)
        .fetch_all(&mut *self.db)
        .await?;

        let total = by_form.iter().map(|f| f.count).sum();
        Ok(FormStats { total, by_form })
    }
}
