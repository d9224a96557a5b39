//! Conversational assistant endpoint.

use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::chat::{build_system_prompt, ChatRequest, ChatResponse};
use crate::error::{ApiError, ApiResult};

/// POST /chat
///
/// Answer a question about the caller's (mocked) insurance data. The server
/// holds no conversation state; the caller resends history each turn.
pub async fn chat(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<impl IntoResponse> {
    let message = req
        .message
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("No message provided"))?;

    tracing::info!(
        user_id = %auth.user_id,
        history_len = req.history.len(),
        "Chat request"
    );

    let system_prompt = build_system_prompt();
    let response = state
        .openai
        .answer(&system_prompt, &req.history, message)
        .await?;

    Ok(Json(ChatResponse {
        success: true,
        response,
    }))
}
