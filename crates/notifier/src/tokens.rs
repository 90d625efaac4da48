//! Device-token registry.
//!
//! `DeviceTokenService` is the CRUD surface behind the token routes;
//! `TokenStore` is the read-only seam the dispatcher resolves recipients through.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use pushgate_common::error::AppError;
use pushgate_common::types::DeviceToken;

use crate::error::LookupError;

/// Resolves a user to the device tokens currently registered for them.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Snapshot of the user's tokens, oldest registration first. May be empty.
    async fn tokens_for(&self, user_id: Uuid) -> Result<Vec<String>, LookupError>;
}

/// Service layer for device-token CRUD operations.
pub struct DeviceTokenService;

impl DeviceTokenService {
    /// Register a token for a user. Re-registering an existing token is a no-op
    /// that returns the original row.
    pub async fn add(pool: &PgPool, user_id: Uuid, fcm_token: &str) -> Result<DeviceToken, AppError> {
        let fcm_token = Self::validate(fcm_token)?;

        let token: DeviceToken = sqlx::query_as(
            r#"
            INSERT INTO fcm_tokens (id, user_id, fcm_token)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, fcm_token) DO UPDATE SET fcm_token = EXCLUDED.fcm_token
            RETURNING id, user_id, fcm_token, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(fcm_token)
        .fetch_one(pool)
        .await?;

        tracing::info!(user_id = %user_id, token_id = %token.id, "FCM token registered");

        Ok(token)
    }

    /// List all tokens registered for a user.
    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<DeviceToken>, AppError> {
        let tokens: Vec<DeviceToken> = sqlx::query_as(
            r#"
            SELECT id, user_id, fcm_token, created_at
            FROM fcm_tokens
            WHERE user_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(tokens)
    }

    /// Remove a token from a user. Returns true if it was registered.
    pub async fn delete(pool: &PgPool, user_id: Uuid, fcm_token: &str) -> Result<bool, AppError> {
        let fcm_token = Self::validate(fcm_token)?;

        let result = sqlx::query("DELETE FROM fcm_tokens WHERE user_id = $1 AND fcm_token = $2")
            .bind(user_id)
            .bind(fcm_token)
            .execute(pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::info!(user_id = %user_id, "FCM token removed");
        }

        Ok(deleted)
    }

    fn validate(fcm_token: &str) -> Result<&str, AppError> {
        let trimmed = fcm_token.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation("Missing fcmToken".to_string()));
        }
        Ok(trimmed)
    }
}

/// `TokenStore` over the `fcm_tokens` table.
#[derive(Clone)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn tokens_for(&self, user_id: Uuid) -> Result<Vec<String>, LookupError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT fcm_token FROM fcm_tokens WHERE user_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(token,)| token).collect())
    }
}
