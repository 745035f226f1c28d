//! Credential handling.
//!
//! Session and token issuance live outside this crate; this module only hashes and verifies
//! passwords for [`crate::accounts`].

pub mod password;
