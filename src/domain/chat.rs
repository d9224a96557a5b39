//! Conversational assistant: request types, the mock insurance snapshot,
//! and system-prompt assembly.
//!
//! The server keeps no conversation state; callers resend their history
//! each turn and only the last [`HISTORY_WINDOW`] turns are forwarded.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Maximum prior turns forwarded to the model
pub const HISTORY_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One prior conversation turn, supplied by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub response: String,
}

/// The bounded window of most recent turns.
pub fn history_window(history: &[ChatTurn]) -> &[ChatTurn] {
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    &history[start..]
}

/// Fixed snapshot of policy/invoice data the assistant answers from.
pub fn mock_snapshot() -> Value {
    json!({
        "policies": [
            {
                "company": "Allianz Private Krankenversicherung",
                "policyNumber": "POL-2024-001",
                "coverageType": "Comprehensive Health Insurance",
                "annualDeductible": 500,
                "coveragePercentage": 80,
                "maxAnnualBenefit": 50000,
                "policyStartDate": "2024-01-01",
                "policyEndDate": "2024-12-31"
            }
        ],
        "invoices": [
            {
                "id": "INV-2024-001",
                "amount": 125.50,
                "date": "2024-01-15",
                "provider": "Dr. Mueller Praxis",
                "status": "paid",
                "services": ["General examination", "Blood test"],
                "reimbursementAmount": 100.40
            },
            {
                "id": "INV-2024-002",
                "amount": 89.75,
                "date": "2024-02-03",
                "provider": "Zahnarzt Dr. Schmidt",
                "status": "pending",
                "services": ["Dental cleaning", "X-ray"],
                "reimbursementAmount": null
            },
            {
                "id": "INV-2024-003",
                "amount": 245.00,
                "date": "2024-02-20",
                "provider": "Physiotherapie Berlin",
                "status": "submitted",
                "services": ["Physical therapy session"],
                "reimbursementAmount": null
            }
        ],
        "reimbursements": {
            "totalPaid": 2450.75,
            "totalPending": 890.25,
            "totalSubmitted": 3341.00,
            "averageProcessingTime": "14 days",
            "thisYearTotal": 3341.00,
            "remainingDeductible": 245.60
        },
        "statistics": {
            "totalInvoices": 15,
            "paidInvoices": 8,
            "pendingInvoices": 4,
            "rejectedInvoices": 1,
            "averageInvoiceAmount": 156.30
        }
    })
}

/// Assemble the system prompt from the mock snapshot.
pub fn build_system_prompt() -> String {
    let snapshot = mock_snapshot();
    let pretty = |key: &str| {
        serde_json::to_string_pretty(&snapshot[key]).unwrap_or_else(|_| "[]".to_string())
    };

    format!(
        "You are an AI assistant for a German private health insurance tracker application. \
You help users understand their insurance policies, track reimbursements, and manage their healthcare invoices.

Here is the user's current insurance data:

INSURANCE POLICIES:
{policies}

RECENT INVOICES:
{invoices}

REIMBURSEMENT SUMMARY:
{reimbursements}

STATISTICS:
{statistics}

IMPORTANT INSTRUCTIONS:
- Only answer questions based on the provided data above
- If information is not available in the data, clearly state that you don't have that information
- Be helpful and conversational, but stay focused on insurance-related topics
- Provide specific numbers and details when available
- Help users understand their reimbursement status and policy details
- If asked about invoices, refer to the specific invoice IDs and amounts
- Convert amounts to EUR when discussing money
- Be concise but informative in your responses

Answer the user's question based only on the provided insurance data.",
        policies = pretty("policies"),
        invoices = pretty("invoices"),
        reimbursements = pretty("reimbursements"),
        statistics = pretty("statistics"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(i: usize) -> ChatTurn {
        ChatTurn {
            role: if i % 2 == 0 {
                ChatRole::User
            } else {
                ChatRole::Assistant
            },
            content: format!("turn {}", i),
        }
    }

    #[test]
    fn history_window_keeps_the_last_ten_turns() {
        let history: Vec<ChatTurn> = (0..25).map(turn).collect();
        let window = history_window(&history);
        assert_eq!(window.len(), HISTORY_WINDOW);
        assert_eq!(window[0].content, "turn 15");
        assert_eq!(window.last().unwrap().content, "turn 24");
    }

    #[test]
    fn short_histories_pass_through_unchanged() {
        let history: Vec<ChatTurn> = (0..3).map(turn).collect();
        assert_eq!(history_window(&history).len(), 3);
        assert!(history_window(&[]).is_empty());
    }

    #[test]
    fn system_prompt_embeds_the_snapshot() {
        let prompt = build_system_prompt();
        assert!(prompt.contains("Allianz Private Krankenversicherung"));
        assert!(prompt.contains("INV-2024-003"));
        assert!(prompt.contains("REIMBURSEMENT SUMMARY:"));
        assert!(prompt.contains("based only on the provided insurance data"));
    }
}
