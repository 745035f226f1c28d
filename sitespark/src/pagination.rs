//! Shared pagination types.
//!
//! Listings are page-based: `page` starts at 1 and `limit` is clamped to 1..=100, so callers can
//! pass raw user input straight through.

use serde::{Deserialize, Serialize};

/// Default number of items to return per page.
pub const DEFAULT_LIMIT: i64 = 20;

/// Maximum number of items that can be requested per page.
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    /// 1-based page number (default: 1)
    pub page: Option<i64>,
    /// Maximum number of items to return (default: 20, max: 100)
    pub limit: Option<i64>,
}

impl Pagination {
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    /// Get the page, never below 1.
    #[inline]
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Get the limit value, clamped between 1 and MAX_LIMIT.
    /// Defaults to DEFAULT_LIMIT if not specified.
    #[inline]
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// Number of rows to skip for this page
    #[inline]
    pub fn skip(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }

    /// Get both skip and limit as a tuple, useful for destructuring.
    #[inline]
    pub fn params(&self) -> (i64, i64) {
        (self.skip(), self.limit())
    }
}

/// One page of results with the metadata needed to render pagination controls.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: i64, pagination: &Pagination) -> Self {
        let limit = pagination.limit();
        Self {
            data,
            page: pagination.page(),
            limit,
            total,
            total_pages: (total + limit - 1) / limit,
        }
    }
}
