//! Outbound email via the Resend API.
//!
//! Job-completion and job-failure notices. Notification failures are logged
//! and swallowed by callers; they never fail the job itself. When no API key
//! is configured, sends are skipped.

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info};

const RESEND_API_URL: &str = "https://api.resend.com/emails";

#[derive(Clone)]
pub struct EmailService {
    client: Client,
    api_key: Option<String>,
    from_email: String,
    app_url: String,
}

/// Invoice details embedded in the completion notice
pub struct CompletionDetails<'a> {
    pub file_name: &'a str,
    pub provider_name: Option<&'a str>,
    pub amount: Option<f64>,
    pub invoice_number: Option<&'a str>,
}

impl EmailService {
    pub fn new(
        client: Client,
        api_key: Option<String>,
        from_email: &str,
        app_url: &str,
    ) -> Self {
        if api_key.is_none() {
            info!("RESEND_API_KEY not set - email notifications disabled");
        }

        Self {
            client,
            api_key,
            from_email: from_email.to_string(),
            app_url: app_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn send_processing_complete(
        &self,
        to: &str,
        details: CompletionDetails<'_>,
    ) -> Result<()> {
        let mut rows = format!("<p><strong>File:</strong> {}</p>", details.file_name);
        if let Some(provider) = details.provider_name {
            rows.push_str(&format!("<p><strong>Provider:</strong> {}</p>", provider));
        }
        if let Some(amount) = details.amount {
            rows.push_str(&format!("<p><strong>Amount:</strong> €{}</p>", amount));
        }
        if let Some(number) = details.invoice_number {
            rows.push_str(&format!(
                "<p><strong>Invoice Number:</strong> {}</p>",
                number
            ));
        }

        let html = format!(
            r#"<h2>Your invoice has been processed successfully!</h2>
<p>We've finished processing your invoice and it's now available in your dashboard.</p>
<div style="background: #f5f5f5; padding: 16px; border-radius: 8px; margin: 16px 0;">
  <h3>Invoice Details:</h3>
  {rows}
</div>
<p><a href="{app_url}/dashboard" style="background: #3b82f6; color: white; padding: 12px 24px; text-decoration: none; border-radius: 6px;">View Dashboard</a></p>"#,
            rows = rows,
            app_url = self.app_url,
        );

        self.send(to, "Invoice Processing Complete", &html).await
    }

    pub async fn send_processing_failed(
        &self,
        to: &str,
        file_name: &str,
        error_message: &str,
    ) -> Result<()> {
        let html = format!(
            r#"<h2>There was an issue processing your invoice</h2>
<p>We encountered an error while processing your invoice: <strong>{file_name}</strong></p>
<div style="background: #fef2f2; border: 1px solid #fecaca; padding: 16px; border-radius: 8px; margin: 16px 0;">
  <p><strong>Error:</strong> {error_message}</p>
</div>
<p>Please try uploading the invoice again, or contact support if the issue persists.</p>
<p><a href="{app_url}/dashboard/upload" style="background: #3b82f6; color: white; padding: 12px 24px; text-decoration: none; border-radius: 6px;">Try Again</a></p>"#,
            file_name = file_name,
            error_message = error_message,
            app_url = self.app_url,
        );

        self.send(to, "Invoice Processing Failed", &html).await
    }

    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        let Some(api_key) = &self.api_key else {
            debug!(to = to, subject = subject, "Email disabled, skipping send");
            return Ok(());
        };

        let response = self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(api_key)
            .json(&json!({
                "from": self.from_email,
                "to": to,
                "subject": subject,
                "html": html,
            }))
            .send()
            .await
            .context("Email send request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Email send rejected ({})", response.status());
        }

        debug!(to = to, subject = subject, "Email sent");
        Ok(())
    }
}
