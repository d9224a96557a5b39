//! OpenAI chat-completions client.
//!
//! Used for two things: vision extraction of invoice fields from an
//! uploaded document image, and the conversational assistant. Upstream
//! failures are mapped to the API error taxonomy (missing credentials to a
//! configuration error, rate/quota limits to 429); there are no retries.

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, instrument};

use crate::domain::chat::{history_window, ChatRole, ChatTurn};
use crate::domain::extraction::{extract_json_block, ExtractionResult};
use crate::error::ApiError;

/// Prompt for the German health-insurance invoice extraction call.
const EXTRACTION_PROMPT: &str = r#"Analyze this German health insurance invoice and extract the following information in JSON format:
{
  "invoice_number": "string (invoice number/reference)",
  "amount": "number (total amount in EUR)",
  "date": "string (invoice date in YYYY-MM-DD format)",
  "provider_name": "string (healthcare provider name)",
  "provider_address": "string (provider address)",
  "services": [
    {
      "description": "string (service description)",
      "amount": "number (service amount in EUR)",
      "date": "string (service date if different from invoice date)"
    }
  ],
  "patient_name": "string (patient name if visible)",
  "confidence_score": "number (your confidence in extraction accuracy 0-100)"
}

Important:
- Extract all monetary amounts as numbers (no currency symbols)
- Use German date format if needed but convert to YYYY-MM-DD
- Include all services/treatments listed
- Be precise with medical terminology
- If information is unclear, use null for that field
- Provide confidence score based on image quality and text clarity"#;

/// Client for the OpenAI completion API.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Value>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Error body from the OpenAI API.
#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

impl OpenAiClient {
    pub fn new(api_key: &str, model: &str, timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        tracing::info!(model = model, "OpenAI client initialized");

        Ok(Self {
            client,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    /// Run the vision extraction call for one invoice document.
    #[instrument(skip(self, image_base64))]
    pub async fn extract_invoice(
        &self,
        image_base64: &str,
        file_name: Option<&str>,
    ) -> Result<ExtractionResult, ApiError> {
        let messages = vec![json!({
            "role": "user",
            "content": [
                {
                    "type": "text",
                    "text": EXTRACTION_PROMPT
                },
                {
                    "type": "image_url",
                    "image_url": {
                        "url": format!("data:image/jpeg;base64,{}", image_base64),
                        "detail": "high"
                    }
                }
            ]
        })];

        let reply = self.complete(messages, 1000, 0.1).await?;

        let json_block = extract_json_block(&reply)
            .ok_or_else(|| ApiError::upstream("Failed to parse extracted data"))?;
        let data: Value = serde_json::from_str(json_block).map_err(|e| {
            error!(error = %e, "Model reply was not valid JSON");
            ApiError::upstream("Failed to parse extracted data")
        })?;

        Ok(ExtractionResult::from_model_json(&data, &reply, file_name))
    }

    /// Answer a user message with the assistant system prompt and a bounded
    /// window of prior turns.
    #[instrument(skip(self, system_prompt, history, message))]
    pub async fn answer(
        &self,
        system_prompt: &str,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<String, ApiError> {
        let mut messages = vec![json!({
            "role": "system",
            "content": system_prompt
        })];

        for turn in history_window(history) {
            let role = match turn.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            };
            messages.push(json!({ "role": role, "content": turn.content }));
        }

        messages.push(json!({ "role": "user", "content": message }));

        self.complete(messages, 500, 0.7).await
    }

    /// Check API reachability (used by the health endpoint).
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/models", self.base_url);

        self.client
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .context("OpenAI health check failed")?
            .error_for_status()
            .context("OpenAI API unreachable")?;

        Ok(())
    }

    async fn complete(
        &self,
        messages: Vec<Value>,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, ApiError> {
        if self.api_key.is_empty() {
            return Err(ApiError::upstream("OpenAI API key not configured"));
        }

        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, model = %self.model, "OpenAI request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&ChatCompletionRequest {
                model: &self.model,
                messages,
                max_tokens,
                temperature,
            })
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "OpenAI request failed");
                ApiError::upstream(format!("OpenAI API unavailable: {}", e))
            })?;

        let status = response.status();

        if !status.is_success() {
            let detail = response.json::<OpenAiErrorResponse>().await.ok();
            let message = detail
                .as_ref()
                .map(|e| e.error.message.clone())
                .unwrap_or_else(|| format!("OpenAI API error: {}", status));
            let code = detail.and_then(|e| e.error.code);

            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => {
                    ApiError::rate_limited("Rate limit exceeded. Please try again later.")
                }
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    error!(message = %message, "OpenAI authentication failed");
                    ApiError::upstream("OpenAI API key not configured")
                }
                _ if code.as_deref() == Some("insufficient_quota") => {
                    ApiError::rate_limited("Rate limit exceeded. Please try again later.")
                }
                _ => {
                    error!(status = %status, message = %message, "OpenAI error");
                    ApiError::upstream(message)
                }
            });
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse OpenAI response");
            ApiError::upstream(format!("Invalid OpenAI response: {}", e))
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ApiError::upstream("Failed to generate response"))
    }
}
