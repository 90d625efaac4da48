//! Device-token registration routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use pushgate_common::error::AppError;
use pushgate_common::types::DeviceToken;
use pushgate_notifier::DeviceTokenService;

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/users/v1/fcmToken",
        post(register_token).get(list_tokens).delete(delete_token),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FcmTokenRequest {
    #[serde(default)]
    pub fcm_token: String,
}

/// Response envelope shared by the token routes.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub code: u16,
    pub message: String,
    pub result: T,
}

impl<T> Envelope<T> {
    fn ok(message: &str, result: T) -> Json<Self> {
        Json(Self {
            code: StatusCode::OK.as_u16(),
            message: message.to_string(),
            result,
        })
    }
}

/// POST /api/users/v1/fcmToken: register a device for the caller.
async fn register_token(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<FcmTokenRequest>,
) -> Result<Json<Envelope<DeviceToken>>, AppError> {
    let token = DeviceTokenService::add(&state.pool, auth.user_id, &req.fcm_token).await?;
    Ok(Envelope::ok("FCM token registered", token))
}

/// GET /api/users/v1/fcmToken: the caller's devices, oldest first.
async fn list_tokens(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Envelope<Vec<DeviceToken>>>, AppError> {
    let tokens = DeviceTokenService::list_by_user(&state.pool, auth.user_id).await?;
    Ok(Envelope::ok("OK", tokens))
}

/// DELETE /api/users/v1/fcmToken
async fn delete_token(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<FcmTokenRequest>,
) -> Result<Json<Envelope<bool>>, AppError> {
    let deleted = DeviceTokenService::delete(&state.pool, auth.user_id, &req.fcm_token).await?;
    if deleted {
        Ok(Envelope::ok("FCM token deleted", true))
    } else {
        Err(AppError::NotFound("FCM token not found".to_string()))
    }
}
