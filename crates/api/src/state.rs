//! Shared application state for the Axum API server.

use std::sync::Arc;

use pushgate_common::config::AppConfig;
use pushgate_notifier::Dispatcher;
use sqlx::PgPool;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub dispatcher: Arc<Dispatcher>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(pool: PgPool, dispatcher: Arc<Dispatcher>, config: AppConfig) -> Self {
        Self {
            pool,
            dispatcher,
            config,
        }
    }
}
