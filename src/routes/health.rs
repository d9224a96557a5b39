use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub services: ServiceHealth,
}

#[derive(Serialize)]
pub struct ServiceHealth {
    pub database: String,
    pub openai: String,
}

/// Health check endpoint - public
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    // Check services in parallel
    let (db_result, openai_result) = tokio::join!(
        sqlx::query("SELECT 1").fetch_one(&state.db),
        state.openai.health_check(),
    );

    let db_status = if db_result.is_ok() { "ok" } else { "error" };
    let openai_status = if openai_result.is_ok() { "ok" } else { "error" };

    // The database is critical; the model API is degraded-only
    let status = if db_result.is_ok() && openai_result.is_ok() {
        "healthy"
    } else if db_result.is_ok() {
        "degraded"
    } else {
        "unhealthy"
    };

    let status_code = if status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            services: ServiceHealth {
                database: db_status.to_string(),
                openai: openai_status.to_string(),
            },
        }),
    )
}
