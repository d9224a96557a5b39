//! File upload and the orchestrated upload pipeline.
//!
//! `/upload` stores a single document and returns its metadata; the caller
//! then drives OCR, duplicate check, and invoice creation itself.
//! `/upload/process` runs the whole sequence server-side: validate, store,
//! extract, duplicate-check, reporting discrete progress checkpoints.
//! Failures after the store step do not undo earlier side effects.

use axum::{
    extract::{Multipart, State},
    response::IntoResponse,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::api::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::duplicates::{DuplicateCheckResult, DuplicateQuery};
use crate::domain::extraction::ExtractionResult;
use crate::domain::files::{
    format_file_size, sha256_hex, unique_object_path, validate_file, MAX_FILE_SIZE,
};
use crate::error::{ApiError, ApiResult};
use crate::routes::duplicates::find_duplicates;

/// Request-body limit for the upload routes: the file cap plus headroom
/// for multipart boundaries and headers.
pub const UPLOAD_BODY_LIMIT: usize = MAX_FILE_SIZE + 1024 * 1024;

/// Metadata returned for a stored document
#[derive(Debug, Serialize)]
pub struct UploadResult {
    pub file_url: String,
    pub file_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub file_size_display: String,
    pub file_type: String,
    pub document_hash: String,
    pub uploaded_at: DateTime<Utc>,
}

/// One discrete pipeline checkpoint
#[derive(Debug, Serialize)]
pub struct ProgressCheckpoint {
    pub step: &'static str,
    pub progress: u8,
    pub message: String,
}

/// Full pipeline output
#[derive(Debug, Serialize)]
pub struct ProcessedUpload {
    pub upload: UploadResult,
    pub extraction: ExtractionResult,
    pub duplicates: DuplicateCheckResult,
    pub progress: Vec<ProgressCheckpoint>,
}

fn checkpoint(step: &'static str, progress: u8, message: &str) -> ProgressCheckpoint {
    ProgressCheckpoint {
        step,
        progress,
        message: message.to_string(),
    }
}

struct UploadedFile {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

/// Pull the `file` part out of the multipart body.
async fn read_file_field(multipart: &mut Multipart) -> ApiResult<UploadedFile> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read file: {}", e)))?
            .to_vec();

        return Ok(UploadedFile {
            file_name,
            content_type,
            bytes,
        });
    }

    Err(ApiError::bad_request("No file provided"))
}

/// Validate and store one document, returning its metadata.
async fn store_file(state: &AppState, auth: &RequireAuth, file: &UploadedFile) -> ApiResult<UploadResult> {
    validate_file(&file.content_type, file.bytes.len()).map_err(ApiError::BadRequest)?;

    let document_hash = sha256_hex(&file.bytes);
    let file_path = unique_object_path(auth.user_id, &file.file_name);

    state
        .storage
        .upload(&file_path, file.bytes.clone(), &file.content_type)
        .await?;

    let file_url = state
        .storage
        .create_signed_url(&file_path, state.settings.signed_url_ttl_seconds)
        .await?;

    tracing::info!(
        user_id = %auth.user_id,
        file_path = %file_path,
        file_size = file.bytes.len(),
        "File stored"
    );

    Ok(UploadResult {
        file_url,
        file_path,
        file_name: file.file_name.clone(),
        file_size: file.bytes.len() as i64,
        file_size_display: format_file_size(file.bytes.len() as u64),
        file_type: file.content_type.clone(),
        document_hash,
        uploaded_at: Utc::now(),
    })
}

/// POST /upload
///
/// Validate and store a single invoice document.
pub async fn upload_file(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let file = read_file_field(&mut multipart).await?;
    let upload = store_file(&state, &auth, &file).await?;
    Ok(DataResponse::new(upload))
}

/// POST /upload/process
///
/// The full pipeline in one call: validate, store, extract, duplicate-check.
/// Extraction and duplicate-check failures degrade instead of aborting; the
/// stored file is never cleaned up on later failures.
pub async fn process_upload(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut progress = Vec::new();

    let file = read_file_field(&mut multipart).await?;
    progress.push(checkpoint("validating", 10, "Validating file..."));

    // Keep a base64 copy for the extraction call before the bytes move on
    let image_base64 = BASE64.encode(&file.bytes);

    progress.push(checkpoint("uploading", 30, "Uploading to secure storage..."));
    let upload = store_file(&state, &auth, &file).await?;

    progress.push(checkpoint("processing", 50, "Extracting text with AI..."));
    let extraction = match state
        .openai
        .extract_invoice(&image_base64, Some(&upload.file_name))
        .await
    {
        Ok(extraction) => extraction,
        Err(e) => {
            tracing::warn!(error = %e, "Extraction failed, continuing with empty result");
            ExtractionResult::failed(Some(&upload.file_name), "OCR processing failed")
        }
    };

    progress.push(checkpoint("checking", 80, "Checking for duplicates..."));
    let query = DuplicateQuery {
        document_hash: Some(upload.document_hash.clone()),
        invoice_number: extraction.invoice_number.clone(),
        amount: extraction.amount,
        provider_name: extraction.provider_name.clone(),
        invoice_date: extraction.invoice_date(),
    };
    let duplicates = match find_duplicates(&state.db, auth.user_id, &query).await {
        Ok(candidates) => DuplicateCheckResult::ranked(candidates),
        Err(e) => {
            tracing::warn!(error = %e, "Duplicate check failed, reporting no candidates");
            DuplicateCheckResult::ranked(Vec::new())
        }
    };

    progress.push(checkpoint("complete", 100, "Processing complete!"));

    Ok(DataResponse::new(ProcessedUpload {
        upload,
        extraction,
        duplicates,
        progress,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        routing::post,
        Router,
    };
    use tower::ServiceExt;

    async fn receive(mut multipart: Multipart) -> Result<StatusCode, ApiError> {
        read_file_field(&mut multipart).await?;
        Ok(StatusCode::OK)
    }

    fn upload_router() -> Router {
        Router::new().route(
            "/upload",
            post(receive).layer(axum::extract::DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
    }

    fn multipart_upload(file_size: usize) -> Request<Body> {
        let boundary = "invoice-upload-boundary";
        let mut body = Vec::with_capacity(file_size + 256);
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
                 filename=\"scan.pdf\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.resize(body.len() + file_size, 0);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn accepts_files_between_two_and_ten_megabytes() {
        let response = upload_router()
            .oneshot(multipart_upload(5 * 1024 * 1024))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn bodies_over_the_limit_are_rejected() {
        let response = upload_router()
            .oneshot(multipart_upload(12 * 1024 * 1024))
            .await
            .unwrap();
        assert!(
            response.status().is_client_error(),
            "oversized body got {}",
            response.status()
        );
    }
}
