//! User registration and sign-in.
//!
//! Sign-in checks credentials and credits the daily login bonus. Session and token issuance
//! belong to whatever fronts this crate.

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, instrument};

use crate::auth::password::{self, Argon2Params};
use crate::db::errors::DbError;
use crate::db::handlers::Users;
use crate::db::models::users::{UserCreateDBRequest, UserDBResponse};
use crate::errors::{Error, Result};
use crate::ledger::{DailyLoginAward, TokenLedger};
use crate::types::abbrev_uuid;

pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 128;

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'),
        None => false,
    };
    if !valid || email.contains(char::is_whitespace) {
        return Err(Error::bad_request("Invalid email address"));
    }
    Ok(email)
}

fn validate_password(password: &str) -> Result<()> {
    let len = password.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        return Err(Error::bad_request(format!(
            "Password must be between {PASSWORD_MIN_LEN} and {PASSWORD_MAX_LEN} characters"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct SignedIn {
    pub user: UserDBResponse,
    pub daily_bonus: DailyLoginAward,
}

#[derive(Clone)]
pub struct AccountService {
    db: SqlitePool,
    ledger: TokenLedger,
    password_params: Argon2Params,
}

impl AccountService {
    pub fn new(db: SqlitePool, ledger: TokenLedger, password_params: Argon2Params) -> Self {
        Self {
            db,
            ledger,
            password_params,
        }
    }

    /// Create an account and credit the signup bonus, atomically.
    #[instrument(skip(self, password, name), err)]
    pub async fn register(&self, email: &str, password: &str, name: Option<String>) -> Result<UserDBResponse> {
        let email = normalize_email(email)?;
        validate_password(password)?;
        let name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

        let password_hash = password::hash_password(password, self.password_params)?;

        let mut tx = self.db.begin().await.map_err(DbError::from)?;
        let user = Users::new(&mut tx)
            .create(&UserCreateDBRequest {
                email,
                password_hash,
                name,
            })
            .await
            .map_err(|e| match e {
                DbError::UniqueViolation { .. } => Error::Conflict {
                    message: "Email already registered".to_string(),
                },
                other => other.into(),
            })?;

        let balance = match self.ledger.award_signup_bonus_in(&mut tx, user.id).await? {
            Some(receipt) => receipt.new_balance,
            None => user.tokens_balance,
        };
        tx.commit().await.map_err(DbError::from)?;

        info!(user_id = %abbrev_uuid(&user.id), balance, "User registered");
        Ok(UserDBResponse {
            tokens_balance: balance,
            ..user
        })
    }

    /// Check credentials, stamp the login and credit the daily bonus if it is due.
    #[instrument(skip(self, password), err)]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn> {
        let email = email.trim().to_lowercase();
        let mut conn = self.db.acquire().await.map_err(DbError::from)?;

        let user = Users::new(&mut conn)
            .get_by_email(&email)
            .await?
            .ok_or(Error::InvalidCredentials)?;
        if !password::verify_password(password, &user.password_hash)? {
            return Err(Error::InvalidCredentials);
        }
        Users::new(&mut conn).record_login(user.id, chrono::Utc::now()).await?;

        // The award takes its own connection from the pool; hold none while it runs
        drop(conn);
        let daily_bonus = self.ledger.award_daily_login(user.id).await?;

        let mut conn = self.db.acquire().await.map_err(DbError::from)?;
        let user = Users::new(&mut conn)
            .get_by_id(user.id)
            .await?
            .ok_or_else(|| Error::not_found("User", user.id))?;

        info!(user_id = %abbrev_uuid(&user.id), bonus = daily_bonus.awarded, "User signed in");
        Ok(SignedIn { user, daily_bonus })
    }
}
