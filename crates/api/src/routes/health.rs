//! Health check endpoint.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let credential_cached = state.dispatcher.credentials().current().is_some();
    Json(json!({
        "status": "ok",
        "service": "pushgate-api",
        "version": env!("CARGO_PKG_VERSION"),
        "credential_cached": credential_cached
    }))
}
