//! Invoice domain types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Invoice lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Submitted,
    Paid,
    Rejected,
}

impl Default for InvoiceStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvoiceStatus::Pending => write!(f, "pending"),
            InvoiceStatus::Submitted => write!(f, "submitted"),
            InvoiceStatus::Paid => write!(f, "paid"),
            InvoiceStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Invoice entity as stored in the `invoices` table
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_url: String,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub ocr_data: serde_json::Value,
    pub amount: Option<f64>,
    pub invoice_date: Option<NaiveDate>,
    pub invoice_number: Option<String>,
    pub provider_name: Option<String>,
    pub provider_address: Option<String>,
    pub status: InvoiceStatus,
    pub document_hash: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request DTO for creating an invoice after a successful upload
#[derive(Debug, Clone, Deserialize)]
pub struct CreateInvoiceRequest {
    pub file_url: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
    #[serde(default)]
    pub ocr_data: Option<serde_json::Value>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub invoice_date: Option<NaiveDate>,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub provider_name: Option<String>,
    #[serde(default)]
    pub provider_address: Option<String>,
    #[serde(default)]
    pub status: Option<InvoiceStatus>,
    #[serde(default)]
    pub document_hash: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}
