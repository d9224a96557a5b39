//! OCR extraction endpoint.

use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrRequest {
    #[serde(default)]
    pub image_base64: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

/// POST /ocr
///
/// Extract structured invoice fields from a base64-encoded document image.
pub async fn extract(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<OcrRequest>,
) -> ApiResult<impl IntoResponse> {
    let image_base64 = req
        .image_base64
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("No image provided"))?;

    tracing::info!(
        user_id = %auth.user_id,
        file_name = ?req.file_name,
        "Running invoice extraction"
    );

    let extraction = state
        .openai
        .extract_invoice(image_base64, req.file_name.as_deref())
        .await?;

    Ok(DataResponse::new(extraction))
}
