pub mod chat;
pub mod duplicates;
pub mod health;
pub mod invoices;
pub mod jobs;
pub mod ocr;
pub mod upload;

use axum::{extract::DefaultBodyLimit, routing::get, routing::post, Router};
use std::sync::Arc;

use crate::app::AppState;

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Public routes
        .route("/health", get(health::health_check))
        // File upload + orchestrated pipeline; the raised body limit leaves
        // headroom over the 10 MB file cap for multipart framing
        .route(
            "/upload",
            post(upload::upload_file).layer(DefaultBodyLimit::max(upload::UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/upload/process",
            post(upload::process_upload).layer(DefaultBodyLimit::max(upload::UPLOAD_BODY_LIMIT)),
        )
        // OCR extraction
        .route("/ocr", post(ocr::extract))
        // Duplicate check
        .route("/duplicates", post(duplicates::check_duplicates))
        // Invoices
        .route("/invoices", get(invoices::list_invoices))
        .route("/invoices", post(invoices::create_invoice))
        // Background jobs
        .route("/jobs", post(jobs::create_job))
        .route("/process-jobs", post(jobs::process_jobs))
        .route("/cron/process-jobs", get(jobs::cron_process_jobs))
        // Conversational assistant
        .route("/chat", post(chat::chat))
}
