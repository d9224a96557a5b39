//! Background job endpoints: enqueueing and the polling-triggered runner.
//!
//! The runner claims each job with a conditional status update so that
//! concurrent invocations never process the same job twice; a job whose
//! claim update matches zero rows was taken by another runner and is
//! skipped. Jobs are not retried automatically.

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::invoices::Invoice;
use crate::domain::jobs::{CreateJobRequest, JobType, ProcessingJob};
use crate::error::{ApiError, ApiResult};
use crate::services::email::CompletionDetails;

/// How many pending jobs one runner pass picks up
const BATCH_SIZE: i64 = 5;

/// POST /jobs
///
/// Enqueue a background job for one of the caller's invoices.
pub async fn create_job(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateJobRequest>,
) -> ApiResult<impl IntoResponse> {
    // The invoice must exist and belong to the caller
    let invoice_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM invoices WHERE id = $1 AND user_id = $2)",
    )
    .bind(req.invoice_id)
    .bind(auth.user_id)
    .fetch_one(&state.db)
    .await?;

    if !invoice_exists {
        return Err(ApiError::not_found("Invoice not found"));
    }

    let job = sqlx::query_as::<_, ProcessingJob>(
        r#"
        INSERT INTO processing_jobs (user_id, invoice_id, job_type, status, job_data)
        VALUES ($1, $2, $3, 'pending', $4)
        RETURNING *
        "#,
    )
    .bind(auth.user_id)
    .bind(req.invoice_id)
    .bind(req.job_type)
    .bind(req.job_data.clone().unwrap_or_else(|| serde_json::json!({})))
    .fetch_one(&state.db)
    .await?;

    tracing::info!(
        user_id = %auth.user_id,
        job_id = %job.id,
        invoice_id = %req.invoice_id,
        job_type = %req.job_type,
        "Processing job enqueued"
    );

    Ok((StatusCode::CREATED, Json(DataResponse::new(job))))
}

#[derive(Debug, Serialize)]
pub struct ProcessJobsResponse {
    pub processed: u32,
}

/// POST /process-jobs
///
/// Run one processing pass over pending jobs.
pub async fn process_jobs(
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let processed = run_processing_pass(&state).await?;
    Ok(Json(ProcessJobsResponse { processed }))
}

/// GET /cron/process-jobs
///
/// Scheduler-triggered processing pass, guarded by the shared cron secret.
pub async fn cron_process_jobs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let provided = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    if !cron_authorized(provided, &state.settings.cron_secret) {
        return Err(ApiError::unauthorized("Unauthorized"));
    }

    let processed = run_processing_pass(&state).await?;
    Ok(Json(ProcessJobsResponse { processed }))
}

/// The scheduler must present exactly `Bearer {secret}`.
fn cron_authorized(header: Option<&str>, secret: &str) -> bool {
    header == Some(format!("Bearer {}", secret).as_str())
}

/// Fetch up to [`BATCH_SIZE`] pending jobs in creation order, claim each,
/// and run it synchronously. Returns how many jobs completed.
async fn run_processing_pass(state: &AppState) -> ApiResult<u32> {
    let jobs = sqlx::query_as::<_, ProcessingJob>(
        "SELECT * FROM processing_jobs WHERE status = 'pending' ORDER BY created_at ASC LIMIT $1",
    )
    .bind(BATCH_SIZE)
    .fetch_all(&state.db)
    .await?;

    let mut processed = 0;

    for job in jobs {
        // Atomic claim: only one runner can flip pending -> processing
        let claimed = sqlx::query(
            "UPDATE processing_jobs SET status = 'processing', updated_at = NOW() \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(job.id)
        .execute(&state.db)
        .await?
        .rows_affected();

        if claimed == 0 {
            tracing::debug!(job_id = %job.id, "Job already claimed, skipping");
            continue;
        }

        match run_job(state, &job).await {
            Ok(()) => {
                processed += 1;
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(job_id = %job.id, error = %message, "Job failed");

                sqlx::query(
                    "UPDATE processing_jobs SET status = 'failed', error_message = $2, \
                     updated_at = NOW() WHERE id = $1",
                )
                .bind(job.id)
                .bind(&message)
                .execute(&state.db)
                .await?;

                notify_failure(state, &job, &message).await;
            }
        }
    }

    tracing::info!(processed = processed, "Processing pass finished");
    Ok(processed)
}

async fn run_job(state: &AppState, job: &ProcessingJob) -> anyhow::Result<()> {
    match job.job_type {
        JobType::OcrProcessing => run_ocr_job(state, job).await,
    }
}

/// Download the stored document, re-run extraction, update the invoice, and
/// mark the job completed. The invoice update and the job update are two
/// independent writes; there is no transaction spanning them.
async fn run_ocr_job(state: &AppState, job: &ProcessingJob) -> anyhow::Result<()> {
    let invoice = sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1")
        .bind(job.invoice_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Invoice not found"))?;

    let file_path = object_path(job, &invoice).ok_or_else(|| anyhow::anyhow!("Invalid file path"))?;

    let bytes = state.storage.download(&file_path).await?;
    let image_base64 = BASE64.encode(&bytes);

    let extraction = state
        .openai
        .extract_invoice(&image_base64, invoice.file_name.as_deref())
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let result_data = serde_json::to_value(&extraction)?;

    sqlx::query(
        r#"
        UPDATE invoices
        SET ocr_data = $2, amount = $3, invoice_date = $4, invoice_number = $5,
            provider_name = $6, provider_address = $7, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(invoice.id)
    .bind(&result_data)
    .bind(extraction.amount)
    .bind(extraction.invoice_date())
    .bind(&extraction.invoice_number)
    .bind(&extraction.provider_name)
    .bind(&extraction.provider_address)
    .execute(&state.db)
    .await?;

    sqlx::query(
        "UPDATE processing_jobs SET status = 'completed', result_data = $2, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(job.id)
    .bind(&result_data)
    .execute(&state.db)
    .await?;

    tracing::info!(
        job_id = %job.id,
        invoice_id = %invoice.id,
        confidence = extraction.confidence_score,
        "OCR job completed"
    );

    if let Some(email) = user_email(state, job.user_id).await {
        let file_name = invoice.file_name.as_deref().unwrap_or("Unknown file");
        let result = state
            .email
            .send_processing_complete(
                &email,
                CompletionDetails {
                    file_name,
                    provider_name: extraction.provider_name.as_deref(),
                    amount: extraction.amount,
                    invoice_number: extraction.invoice_number.as_deref(),
                },
            )
            .await;
        if let Err(e) = result {
            tracing::warn!(job_id = %job.id, error = %e, "Completion email failed");
        }
    }

    Ok(())
}

/// Storage object path for a job's document: the enqueuer records it in
/// job_data; older rows fall back to the last segment of the file URL.
fn object_path(job: &ProcessingJob, invoice: &Invoice) -> Option<String> {
    if let Some(path) = job.job_data.get("file_path").and_then(|v| v.as_str()) {
        if !path.is_empty() {
            return Some(path.to_string());
        }
    }

    invoice
        .file_url
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

async fn notify_failure(state: &AppState, job: &ProcessingJob, message: &str) {
    let Some(email) = user_email(state, job.user_id).await else {
        return;
    };

    let file_name: Option<String> =
        sqlx::query_scalar("SELECT file_name FROM invoices WHERE id = $1")
            .bind(job.invoice_id)
            .fetch_optional(&state.db)
            .await
            .ok()
            .flatten()
            .flatten();

    let result = state
        .email
        .send_processing_failed(
            &email,
            file_name.as_deref().unwrap_or("Unknown file"),
            message,
        )
        .await;

    if let Err(e) = result {
        tracing::warn!(job_id = %job.id, error = %e, "Failure email failed");
    }
}

async fn user_email(state: &AppState, user_id: Uuid) -> Option<String> {
    sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await
        .ok()
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::jobs::JobStatus;
    use chrono::Utc;

    fn job_with(data: serde_json::Value, file_url: &str) -> (ProcessingJob, Invoice) {
        let user_id = Uuid::new_v4();
        let invoice_id = Uuid::new_v4();
        let job = ProcessingJob {
            id: Uuid::new_v4(),
            user_id,
            invoice_id,
            job_type: JobType::OcrProcessing,
            status: JobStatus::Pending,
            job_data: data,
            result_data: None,
            error_message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let invoice = Invoice {
            id: invoice_id,
            user_id,
            file_url: file_url.to_string(),
            file_name: Some("scan.pdf".to_string()),
            file_size: Some(2048),
            ocr_data: serde_json::json!({}),
            amount: None,
            invoice_date: None,
            invoice_number: None,
            provider_name: None,
            provider_address: None,
            status: crate::domain::invoices::InvoiceStatus::Pending,
            document_hash: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        (job, invoice)
    }

    #[test]
    fn cron_secret_must_match_the_bearer_header_exactly() {
        assert!(cron_authorized(Some("Bearer s3cret"), "s3cret"));

        assert!(!cron_authorized(Some("Bearer wrong"), "s3cret"));
        assert!(!cron_authorized(Some("s3cret"), "s3cret"));
        assert!(!cron_authorized(Some("bearer s3cret"), "s3cret"));
        assert!(!cron_authorized(Some("Bearer s3cret "), "s3cret"));
        assert!(!cron_authorized(None, "s3cret"));
    }

    #[test]
    fn job_data_path_wins_over_file_url() {
        let (job, invoice) = job_with(
            serde_json::json!({"file_path": "user-1/17000_ab.pdf"}),
            "https://storage/sign/invoices/xyz.pdf",
        );
        assert_eq!(object_path(&job, &invoice).as_deref(), Some("user-1/17000_ab.pdf"));
    }

    #[test]
    fn falls_back_to_last_url_segment() {
        let (job, invoice) = job_with(
            serde_json::json!({}),
            "https://storage/sign/invoices/xyz.pdf",
        );
        assert_eq!(object_path(&job, &invoice).as_deref(), Some("xyz.pdf"));
    }
}
