//! Database record models matching table schemas.
//!
//! Each model derives `sqlx::FromRow` and matches one table. Request structs (`*CreateDBRequest`,
//! `*UpdateDBRequest`) carry the writable columns; IDs and timestamps are assigned by the
//! repositories.

pub mod blog_posts;
pub mod form_submissions;
pub mod token_transactions;
pub mod users;
pub mod websites;
