//! Shared-secret guard for the database webhook.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use pushgate_common::error::AppError;

use crate::state::AppState;

/// Header the database webhook is configured to send.
pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// Proof that a request came from the configured webhook.
///
/// When `WEBHOOK_SECRET` is unset every request passes.
#[derive(Debug, Clone, Copy)]
pub struct WebhookAuth;

impl FromRequestParts<AppState> for WebhookAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let Some(expected) = state.config.webhook_secret.as_deref() else {
            return Ok(WebhookAuth);
        };

        let presented = parts
            .headers
            .get(WEBHOOK_SECRET_HEADER)
            .and_then(|v| v.to_str().ok());

        match presented {
            Some(secret) if constant_time_eq(secret.as_bytes(), expected.as_bytes()) => {
                Ok(WebhookAuth)
            }
            _ => {
                tracing::warn!("Webhook call rejected: missing or wrong secret");
                Err(AppError::Auth("Unauthorized".to_string()))
            }
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
