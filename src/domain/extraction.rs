//! Structured invoice extraction results from the vision model.
//!
//! The model is asked for strict JSON but its replies are treated as
//! untrusted: every field is taken only if present and well-typed, else
//! null/default (parse-with-defaults).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single service/treatment line on the invoice
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceLine {
    pub description: String,
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// Structured fields extracted from one invoice document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub invoice_number: Option<String>,
    pub amount: Option<f64>,
    pub date: Option<String>,
    pub provider_name: Option<String>,
    pub provider_address: Option<String>,
    pub services: Vec<ServiceLine>,
    pub patient_name: Option<String>,
    pub confidence_score: f64,
    pub raw_text: Option<String>,
    pub extracted_at: DateTime<Utc>,
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionResult {
    /// Confidence assumed when the model omits its own score
    pub const DEFAULT_CONFIDENCE: f64 = 75.0;

    /// Build a result from the model's (loosely validated) JSON reply.
    pub fn from_model_json(data: &Value, raw_text: &str, file_name: Option<&str>) -> Self {
        Self {
            invoice_number: string_field(data, "invoice_number"),
            amount: number_field(data, "amount"),
            date: string_field(data, "date"),
            provider_name: string_field(data, "provider_name"),
            provider_address: string_field(data, "provider_address"),
            services: service_lines(data),
            patient_name: string_field(data, "patient_name"),
            confidence_score: number_field(data, "confidence_score")
                .unwrap_or(Self::DEFAULT_CONFIDENCE),
            raw_text: Some(raw_text.to_string()),
            extracted_at: Utc::now(),
            file_name: file_name.map(|s| s.to_string()),
            error: None,
        }
    }

    /// Placeholder result used when extraction fails mid-pipeline: the
    /// upload still succeeds, with zero confidence and the error recorded.
    pub fn failed(file_name: Option<&str>, error: impl Into<String>) -> Self {
        Self {
            invoice_number: None,
            amount: None,
            date: None,
            provider_name: None,
            provider_address: None,
            services: Vec::new(),
            patient_name: None,
            confidence_score: 0.0,
            raw_text: None,
            extracted_at: Utc::now(),
            file_name: file_name.map(|s| s.to_string()),
            error: Some(error.into()),
        }
    }

    /// Invoice date parsed to a calendar date, when the model produced a
    /// well-formed YYYY-MM-DD string.
    pub fn invoice_date(&self) -> Option<chrono::NaiveDate> {
        self.date
            .as_deref()
            .and_then(|d| chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    }
}

/// Locate the first JSON object embedded in the model's reply. Models
/// sometimes wrap the requested JSON in explanatory prose.
pub fn extract_json_block(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

fn string_field(data: &Value, key: &str) -> Option<String> {
    data.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn number_field(data: &Value, key: &str) -> Option<f64> {
    data.get(key).and_then(|v| v.as_f64())
}

fn service_lines(data: &Value) -> Vec<ServiceLine> {
    let Some(items) = data.get("services").and_then(|v| v.as_array()) else {
        return Vec::new();
    };

    items
        .iter()
        .map(|item| ServiceLine {
            description: item
                .get("description")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            amount: item.get("amount").and_then(|v| v.as_f64()),
            date: item
                .get("date")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finds_json_inside_prose() {
        let reply = "Sure, here is the extraction:\n{\"amount\": 125.5}\nLet me know!";
        assert_eq!(extract_json_block(reply), Some("{\"amount\": 125.5}"));

        assert_eq!(extract_json_block("no json here"), None);
    }

    #[test]
    fn json_block_is_greedy_across_nested_objects() {
        let reply = r#"{"a": {"b": 1}, "c": 2} trailing"#;
        assert_eq!(
            extract_json_block(reply),
            Some(r#"{"a": {"b": 1}, "c": 2}"#)
        );
    }

    #[test]
    fn parses_a_complete_reply() {
        let data = json!({
            "invoice_number": "RE-2024-042",
            "amount": 125.50,
            "date": "2024-01-15",
            "provider_name": "Dr. Mueller Praxis",
            "provider_address": "Hauptstr. 1, Berlin",
            "services": [
                {"description": "General examination", "amount": 80.0},
                {"description": "Blood test", "amount": 45.5, "date": "2024-01-14"}
            ],
            "patient_name": "Max Mustermann",
            "confidence_score": 92
        });

        let result = ExtractionResult::from_model_json(&data, "raw", Some("scan.pdf"));
        assert_eq!(result.invoice_number.as_deref(), Some("RE-2024-042"));
        assert_eq!(result.amount, Some(125.50));
        assert_eq!(result.confidence_score, 92.0);
        assert_eq!(result.services.len(), 2);
        assert_eq!(result.services[1].date.as_deref(), Some("2024-01-14"));
        assert_eq!(
            result.invoice_date(),
            chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
        );
    }

    #[test]
    fn tolerates_missing_and_wrong_typed_fields() {
        let data = json!({
            "invoice_number": null,
            "amount": "125.50",
            "services": "not a list",
            "confidence_score": "high"
        });

        let result = ExtractionResult::from_model_json(&data, "raw", None);
        assert_eq!(result.invoice_number, None);
        assert_eq!(result.amount, None, "string amounts are not trusted");
        assert!(result.services.is_empty());
        assert_eq!(
            result.confidence_score,
            ExtractionResult::DEFAULT_CONFIDENCE
        );
    }

    #[test]
    fn malformed_dates_do_not_parse() {
        let data = json!({"date": "15.01.2024"});
        let result = ExtractionResult::from_model_json(&data, "", None);
        assert_eq!(result.date.as_deref(), Some("15.01.2024"));
        assert_eq!(result.invoice_date(), None);
    }

    #[test]
    fn failed_result_has_zero_confidence() {
        let result = ExtractionResult::failed(Some("scan.pdf"), "OCR processing failed");
        assert_eq!(result.confidence_score, 0.0);
        assert_eq!(result.error.as_deref(), Some("OCR processing failed"));
        assert!(result.services.is_empty());
    }
}
