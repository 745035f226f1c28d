//! Database repository for users.

use crate::db::{
    errors::Result,
    models::users::{UserCreateDBRequest, UserDBResponse},
};
use crate::types::{UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::instrument;
use uuid::Uuid;

pub struct Users<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Insert a user with a zero balance. Bonuses are credited through the ledger.
    #[instrument(skip(self, request), fields(email = %request.email), err)]
    pub async fn create(&mut self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let now = Utc::now();
        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            INSERT INTO users (id, email, password_hash, name, tier, tokens_balance, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'free', 0, $5, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.email)
        .bind(&request.password_hash)
        .bind(&request.name)
        .bind(now)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: UserId) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }

    /// Stamp `last_login_at`. Returns false if the user does not exist.
    ///
    /// This is a write, so calling it first in a transaction takes SQLite's write lock before
    /// any ledger reads happen.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn record_login(&mut self, id: UserId, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET last_login_at = $1, updated_at = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::errors::DbError;
    use crate::db::models::users::UserTier;
    use sqlx::SqlitePool;

    fn request(email: &str) -> UserCreateDBRequest {
        UserCreateDBRequest {
            email: email.to_string(),
            password_hash: "$argon2id$v=19$m=1024,t=1,p=1$c2FsdA$aGFzaA".to_string(),
            name: Some("Test User".to_string()),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_and_lookup(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let user = repo.create(&request("ada@example.com")).await.unwrap();
        assert_eq!(user.tokens_balance, 0);
        assert_eq!(user.tier, UserTier::Free);
        assert!(user.last_login_at.is_none());

        let by_id = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "ada@example.com");

        let by_email = repo.get_by_email("ada@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);

        assert!(repo.get_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_email_is_unique_violation(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        repo.create(&request("dup@example.com")).await.unwrap();
        let err = repo.create(&request("dup@example.com")).await.unwrap_err();

        match err {
            DbError::UniqueViolation { table, constraint, .. } => {
                assert_eq!(table.as_deref(), Some("users"));
                assert_eq!(constraint.as_deref(), Some("email"));
            }
            other => panic!("expected unique violation, got {other:?}"),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_record_login(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let user = repo.create(&request("login@example.com")).await.unwrap();
        let at = Utc::now();
        assert!(repo.record_login(user.id, at).await.unwrap());

        let user = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.last_login_at, Some(at));

        assert!(!repo.record_login(Uuid::new_v4(), at).await.unwrap());
    }
}
