mod api;
mod app;
mod auth;
mod config;
mod db;
mod domain;
mod error;
mod logging;
mod middleware;
mod routes;
mod services;

use anyhow::Result;

use services::{EmailService, OpenAiClient, StorageClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = config::Settings::from_env()?;

    // Initialize logging
    logging::init_logging(&settings.env);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        "Starting insurance tracker backend"
    );

    // Create database pool and apply migrations
    let pool = db::create_pool(&settings).await?;
    db::run_migrations(&pool).await?;

    // Shared HTTP client for storage and email calls
    let http_client = reqwest::Client::new();

    // OpenAI client (vision extraction + assistant)
    let openai = OpenAiClient::new(
        &settings.openai_api_key,
        &settings.openai_model,
        settings.openai_timeout_seconds,
    )?;

    // Optionally check model API reachability (non-blocking)
    tokio::spawn({
        let openai = openai.clone();
        async move {
            match openai.health_check().await {
                Ok(()) => tracing::info!("OpenAI API is reachable"),
                Err(e) => {
                    tracing::warn!(error = %e, "OpenAI health check failed - will retry on first request")
                }
            }
        }
    });

    // Supabase Storage client
    let storage = StorageClient::new(
        http_client.clone(),
        &settings.supabase_url,
        &settings.supabase_service_role_key,
        &settings.storage_bucket,
    );

    // Outbound email
    let email = EmailService::new(
        http_client,
        settings.resend_api_key.clone(),
        &settings.resend_from_email,
        &settings.app_url,
    );

    // Create JWKS cache for JWT verification
    let jwks_cache = auth::JwksCache::new(
        settings.supabase_jwt_jwks_url.clone(),
        settings.supabase_jwt_issuer.clone(),
        settings.supabase_jwt_audience.clone(),
        settings.jwks_cache_ttl_seconds,
    );

    // Optionally warm the JWKS cache
    if let Err(e) = jwks_cache.warm_cache().await {
        tracing::warn!(error = %e, "Failed to warm JWKS cache - will fetch on first request");
    }

    // Create application state
    let state = app::AppState::new(pool, settings.clone(), jwks_cache, openai, storage, email);

    // Build application
    let app = app::create_app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
