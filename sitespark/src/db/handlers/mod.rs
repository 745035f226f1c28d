//! Repository implementations for database access.
//!
//! Each repository:
//! - Wraps a SQLx connection or transaction
//! - Provides strongly-typed queries for one table
//! - Returns domain models from [`crate::db::models`]
//!
//! # Available Repositories
//!
//! - [`Users`]: User accounts
//! - [`TokenTransactions`]: Token balance mutations and the append-only ledger
//! - [`Websites`]: Owner-scoped website records and generated artifacts
//! - [`BlogPosts`]: Blog posts; implements the [`Repository`] trait
//! - [`FormSubmissions`]: Submissions from published sites and per-form stats

pub mod blog_posts;
pub mod form_submissions;
pub mod repository;
pub mod token_transactions;
pub mod users;
pub mod websites;

pub use blog_posts::BlogPosts;
pub use form_submissions::FormSubmissions;
pub use repository::Repository;
pub use token_transactions::TokenTransactions;
pub use users::Users;
pub use websites::Websites;
