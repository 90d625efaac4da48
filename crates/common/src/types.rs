use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A row of `fcm_notifications`: one push notification addressed to a user.
///
/// Inserted with `completed_at`/`result` unset; the dispatcher fills both in
/// once delivery to every registered device has been attempted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationRecord {
    pub id: Uuid,
    /// Recipient user
    pub user_id: Uuid,
    pub title: Option<String>,
    pub body: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Tokens grouped by delivery classification, see `ResultSummary`
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

impl NotificationRecord {
    /// A freshly enqueued record that has not been dispatched yet.
    pub fn pending(user_id: Uuid, title: Option<String>, body: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            title,
            body,
            created_at: Some(Utc::now()),
            completed_at: None,
            result: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// A row of `fcm_tokens`: one device registered to receive pushes for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeviceToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub fcm_token: String,
    pub created_at: DateTime<Utc>,
}
