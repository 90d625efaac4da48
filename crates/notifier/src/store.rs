//! Notification rows: enqueueing new ones and recording dispatch results.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use pushgate_common::error::AppError;
use pushgate_common::types::NotificationRecord;

use crate::error::PersistenceError;
use crate::summary::ResultSummary;

/// Where a dispatch writes its outcome.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Mark the record completed at `completed_at` with `summary` as its result.
    ///
    /// Replaces any previous result; nothing is merged.
    async fn complete(
        &self,
        record_id: Uuid,
        completed_at: DateTime<Utc>,
        summary: &ResultSummary,
    ) -> Result<(), PersistenceError>;
}

/// Service layer for `fcm_notifications` rows.
pub struct NotificationService;

impl NotificationService {
    /// Queue a push for a user. Inserting the row is what fires the database
    /// webhook that reaches the dispatcher.
    pub async fn enqueue(
        pool: &PgPool,
        user_id: Uuid,
        title: Option<&str>,
        body: Option<&str>,
    ) -> Result<NotificationRecord, AppError> {
        let title = title.map(str::trim).filter(|s| !s.is_empty());
        let body = body.map(str::trim).filter(|s| !s.is_empty());

        let record: NotificationRecord = sqlx::query_as(
            r#"
            INSERT INTO fcm_notifications (id, user_id, title, body)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, title, body, created_at, completed_at, result
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(title)
        .bind(body)
        .fetch_one(pool)
        .await?;

        tracing::info!(record_id = %record.id, user_id = %user_id, "Push notification enqueued");

        Ok(record)
    }

    /// Get a single notification by ID.
    pub async fn get(pool: &PgPool, record_id: Uuid) -> Result<NotificationRecord, AppError> {
        let record: NotificationRecord = sqlx::query_as(
            r#"
            SELECT id, user_id, title, body, created_at, completed_at, result
            FROM fcm_notifications
            WHERE id = $1
            "#,
        )
        .bind(record_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", record_id)))?;

        Ok(record)
    }
}

/// `NotificationStore` over the `fcm_notifications` table.
#[derive(Clone)]
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn complete(
        &self,
        record_id: Uuid,
        completed_at: DateTime<Utc>,
        summary: &ResultSummary,
    ) -> Result<(), PersistenceError> {
        let result = sqlx::query(
            "UPDATE fcm_notifications SET completed_at = $1, result = $2 WHERE id = $3",
        )
        .bind(completed_at)
        .bind(summary.to_json())
        .bind(record_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::RecordNotFound(record_id));
        }

        Ok(())
    }
}
