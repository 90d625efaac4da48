//! Database webhook that triggers a dispatch.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use pushgate_common::error::AppError;
use pushgate_common::types::NotificationRecord;
use pushgate_notifier::{DeliveryOutcome, DispatchStatus};

use crate::middleware::webhook::WebhookAuth;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/push", post(push_notification))
}

/// Body the database sends when a row lands in `fcm_notifications`.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(rename = "type")]
    pub event_type: String,
    pub table: String,
    pub schema: String,
    pub record: NotificationRecord,
}

#[derive(Debug, Serialize)]
pub struct PushResponse {
    pub results: Vec<DeliveryOutcome>,
    pub persisted: bool,
    pub persistence_error: Option<String>,
}

/// POST /push: send the inserted notification to every device of its recipient.
async fn push_notification(
    State(state): State<AppState>,
    _auth: WebhookAuth,
    payload: Result<Json<WebhookPayload>, JsonRejection>,
) -> Result<Json<PushResponse>, AppError> {
    let Json(payload) = payload.map_err(|rejection| {
        tracing::warn!(error = %rejection.body_text(), "Malformed webhook payload");
        AppError::Validation(rejection.body_text())
    })?;

    if payload.event_type != "INSERT" {
        tracing::debug!(
            event_type = %payload.event_type,
            table = %payload.table,
            schema = %payload.schema,
            "Dispatching for non-insert webhook event"
        );
    }

    let report = state.dispatcher.dispatch(&payload.record).await;

    match report.status {
        DispatchStatus::Delivered => Ok(Json(PushResponse {
            persisted: report.persisted(),
            persistence_error: report.persistence_error.as_ref().map(ToString::to_string),
            results: report.outcomes,
        })),
        DispatchStatus::NoTokens => Err(AppError::NotFound(
            "No FCM tokens found for the user".to_string(),
        )),
        DispatchStatus::CredentialFailed => {
            Err(AppError::Internal("Failed to send FCM messages".to_string()))
        }
    }
}
