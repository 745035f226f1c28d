use crate::ai::AiError;
use crate::db::errors::DbError;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Email/password pair did not match a user
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The user's token balance cannot cover the operation
    #[error("Insufficient tokens. Required: {required}, Available: {available}")]
    InsufficientTokens { required: i64, available: i64 },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// LLM provider error that was not absorbed by a fallback
    #[error(transparent)]
    Ai(#[from] AiError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// Conflict error, e.g., for unique constraint violations
    #[error("Conflict: {message}")]
    Conflict { message: String },
}

impl Error {
    pub fn not_found(resource: &str, id: impl ToString) -> Self {
        Error::NotFound {
            resource: resource.to_string(),
            id: id.to_string(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest { message: message.into() }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidCredentials => "AUTHENTICATION_ERROR",
            Error::InsufficientTokens { .. } => "INSUFFICIENT_TOKENS",
            Error::BadRequest { .. } => "VALIDATION_ERROR",
            Error::NotFound { .. } => "NOT_FOUND",
            Error::Conflict { .. } => "CONFLICT",
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "NOT_FOUND",
                DbError::UniqueViolation { .. } => "CONFLICT",
                DbError::ForeignKeyViolation { .. } | DbError::CheckViolation { .. } => "VALIDATION_ERROR",
                DbError::Other(_) => "INTERNAL_ERROR",
            },
            Error::Ai(_) => "AI_SERVICE_ERROR",
            Error::Internal { .. } | Error::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::InvalidCredentials => "Invalid credentials".to_string(),
            Error::InsufficientTokens { .. } => self.to_string(),
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => {
                format!("{resource} with ID {id} not found")
            }
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { constraint, table, .. } => match (table.as_deref(), constraint.as_deref()) {
                    (Some("users"), Some("email")) => "Email already registered".to_string(),
                    (Some("websites"), Some("subdomain")) => "Subdomain already taken".to_string(),
                    (Some("blog_posts"), Some("slug")) => "A post with this slug already exists".to_string(),
                    _ => "Resource already exists".to_string(),
                },
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::CheckViolation { .. } => "Invalid data provided".to_string(),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Ai(_) => "AI service unavailable".to_string(),
            Error::Other(_) => "Internal server error".to_string(),
            Error::Conflict { message } => message.clone(),
        }
    }

    /// Log the error at a level matching its severity
    pub fn log(&self) {
        match self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Ai(_) => {
                tracing::warn!("AI provider error: {}", self);
            }
            Error::InvalidCredentials => {
                tracing::info!("Authentication error: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } | Error::InsufficientTokens { .. } => {
                tracing::debug!("Client error: {}", self);
            }
            Error::Conflict { .. } => {
                tracing::warn!("Conflict error: {}", self);
            }
        }
    }
}

/// Convert from String errors (e.g., from external functions)
impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Internal { operation: msg }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
