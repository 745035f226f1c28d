//! Database models for form submissions.

use crate::types::{FormSubmissionId, WebsiteId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use sqlx::types::Json;

/// Database request for storing a submission from a published site
#[derive(Debug, Clone)]
pub struct FormSubmissionCreateDBRequest {
    pub form_name: String,
    pub data: serde_json::Value,
    pub ip_address: Option<String>,
}

/// Database response for a form submission
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FormSubmissionDBResponse {
    pub id: FormSubmissionId,
    pub website_id: WebsiteId,
    pub form_name: String,
    pub data: Json<serde_json::Value>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-form submission count
#[derive(Debug, Clone, Serialize, FromRow, PartialEq, Eq)]
pub struct FormCount {
    pub form_name: String,
    pub count: i64,
}

/// Submission totals for one website
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FormStats {
    pub total: i64,
    pub by_form: Vec<FormCount>,
}
