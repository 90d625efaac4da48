pub mod health;
pub mod push;
pub mod tokens;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(push::router())
        .merge(tokens::router())
        .with_state(state)
}
