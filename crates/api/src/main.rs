//! Pushgate API server binary entrypoint.

use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use pushgate_common::config::AppConfig;
use pushgate_common::db::{create_pool, run_migrations};
use pushgate_notifier::{
    CredentialCache, Dispatcher, FanOut, FcmGateway, PgNotificationStore, PgTokenStore,
    ServiceAccountIssuer,
};

use pushgate_api::routes::create_router;
use pushgate_api::state::AppState;

const MAX_BODY_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("pushgate_api=debug,pushgate_notifier=debug,tower_http=debug")
        }))
        .init();

    tracing::info!("Starting Pushgate API server...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Create database connection pool
    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    run_migrations(&pool).await?;

    // Build the dispatcher and its collaborators
    let timeout = Duration::from_secs(config.fcm_http_timeout_secs);
    let issuer = ServiceAccountIssuer::new(
        config.firebase_client_email.clone(),
        &config.firebase_private_key,
        config.google_token_uri.clone(),
        timeout,
    )?;
    let gateway = FcmGateway::new(&config.fcm_base_url, &config.firebase_project_id, timeout)?;
    tracing::info!(
        send_url = %gateway.send_url(),
        fanout_limit = ?config.fanout_concurrency,
        "FCM gateway configured"
    );

    let dispatcher = Dispatcher::new(
        Arc::new(PgTokenStore::new(pool.clone())),
        Arc::new(CredentialCache::new(Arc::new(issuer))),
        Arc::new(gateway),
        Arc::new(PgNotificationStore::new(pool.clone())),
    )
    .with_fanout(FanOut::from_limit(config.fanout_concurrency));

    // Build application state
    let addr = config.bind_addr;
    let state = AppState::new(pool, Arc::new(dispatcher), config);

    // Build router
    let app = create_router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections");
}
