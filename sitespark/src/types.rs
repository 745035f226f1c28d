//! Common type definitions.
//!
//! All entity IDs are UUIDs wrapped in type aliases:
//!
//! - [`UserId`]: User account identifier
//! - [`WebsiteId`]: Website identifier
//! - [`BlogPostId`]: Blog post identifier
//! - [`FormSubmissionId`]: Form submission identifier
//! - [`TransactionId`]: Token ledger entry identifier
//!
//! [`abbrev_uuid`] abbreviates UUIDs to their first 8 chars for logging.

use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type WebsiteId = Uuid;
pub type BlogPostId = Uuid;
pub type FormSubmissionId = Uuid;
pub type TransactionId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// Truncate a string to at most `max` characters, respecting char boundaries.
pub fn truncate_chars(input: &str, max: usize) -> String {
    input.chars().take(max).collect()
}

/// Upper-case the first character of a word ("about" -> "About").
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
