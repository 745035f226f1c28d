use thiserror::Error;

/// Unified error type for database operations that application code can handle
#[derive(Error, Debug)]
pub enum DbError {
    /// Entity not found by the given identifier
    #[error("Entity not found")]
    NotFound,

    /// Unique constraint violation
    #[error("Unique constraint violation")]
    UniqueViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    /// Foreign key constraint violation
    #[error("Foreign key constraint violation")]
    ForeignKeyViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    /// Check constraint violation
    #[error("Check constraint violation")]
    CheckViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convert from sqlx::Error using proper sqlx error categorization
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DbError::NotFound,
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                // SQLite reports neither table nor constraint name, only "UNIQUE constraint failed: users.email"
                let (table, column) = constraint_target(&message);
                let constraint = db_err.constraint().map(|s| s.to_string()).or(column);
                let table = db_err.table().map(|s| s.to_string()).or(table);

                if db_err.is_unique_violation() {
                    DbError::UniqueViolation { constraint, table, message }
                } else if db_err.is_foreign_key_violation() {
                    DbError::ForeignKeyViolation { constraint, table, message }
                } else if db_err.is_check_violation() {
                    DbError::CheckViolation { constraint, table, message }
                } else {
                    // All other database errors are non-recoverable - convert to anyhow
                    DbError::Other(anyhow::Error::from(err))
                }
            }
            // All other sqlx errors are non-recoverable - convert to anyhow with context
            _ => DbError::Other(anyhow::Error::from(err)),
        }
    }
}

/// Extract `(table, column)` from SQLite constraint messages such as
/// "UNIQUE constraint failed: websites.subdomain".
fn constraint_target(message: &str) -> (Option<String>, Option<String>) {
    let Some((_, target)) = message.split_once("failed: ") else {
        return (None, None);
    };
    // Composite keys are reported as "blog_posts.website_id, blog_posts.slug"
    let last = target.split(',').next_back().unwrap_or(target).trim();
    match last.split_once('.') {
        Some((table, column)) => (Some(table.to_string()), Some(column.to_string())),
        None => (None, None),
    }
}

/// Type alias for database operation results
pub type Result<T> = std::result::Result<T, DbError>;
