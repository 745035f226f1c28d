//! Fixtures shared by the unit tests.

use crate::ai::AiRouter;
use crate::config::Config;
use crate::db::handlers::{Users, Websites};
use crate::db::models::users::{UserCreateDBRequest, UserDBResponse};
use crate::db::models::websites::{WebsiteCreateDBRequest, WebsiteDBResponse, WebsiteStatus};
use crate::ledger::TokenLedger;
use crate::types::UserId;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

pub fn create_test_config() -> Config {
    Config::default()
}

pub fn create_test_ledger(pool: &SqlitePool) -> TokenLedger {
    TokenLedger::new(pool.clone(), create_test_config().tokens)
}

/// Router that only ever serves mock data
pub fn create_mock_router() -> Arc<AiRouter> {
    Arc::new(AiRouter::new(None, vec![]))
}

/// Insert a user with a zero balance
pub async fn create_test_user(pool: &SqlitePool) -> UserDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let email = format!("testuser_{}@example.com", Uuid::new_v4().simple());

    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            email,
            password_hash: "$argon2id$v=19$m=1024,t=1,p=1$c2FsdA$aGFzaA".to_string(),
            name: Some("Test User".to_string()),
        })
        .await
        .expect("Failed to create test user")
}

/// Insert a user and fund them through the ledger
pub async fn create_funded_user(pool: &SqlitePool, tokens: i64) -> UserDBResponse {
    let user = create_test_user(pool).await;
    create_test_ledger(pool)
        .grant(user.id, tokens, Some("Test funding".to_string()))
        .await
        .expect("Failed to fund test user");
    user
}

pub async fn create_test_website(pool: &SqlitePool, user_id: UserId) -> WebsiteDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let subdomain = format!("site-{}", &Uuid::new_v4().simple().to_string()[..8]);

    Websites::new(&mut conn)
        .create(&WebsiteCreateDBRequest {
            user_id,
            name: "Test Site".to_string(),
            subdomain,
            description: None,
            status: WebsiteStatus::Draft,
        })
        .await
        .expect("Failed to create test website")
}
