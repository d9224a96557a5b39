//! Duplicate-detection scoring.
//!
//! Three tiers of decreasing confidence, evaluated in order with
//! short-circuiting (see the route handler): exact document hash (100),
//! matching invoice number (95), and a heuristic similarity score in
//! [60, 90] over provider name, amount, and date.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::invoices::{Invoice, InvoiceStatus};

/// Relative amount tolerance for the heuristic tier (±5%)
pub const AMOUNT_TOLERANCE: f64 = 0.05;

/// Date window for the heuristic tier (±30 days)
pub const DATE_WINDOW_DAYS: i64 = 30;

/// Maximum candidates reported per check
pub const MAX_CANDIDATES: usize = 5;

/// How a prior invoice matched the incoming one
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    ExactDocument,
    InvoiceNumber,
    SimilarInvoice,
}

/// A prior invoice considered a possible re-submission
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateCandidate {
    pub id: Uuid,
    pub file_name: Option<String>,
    pub amount: Option<f64>,
    pub invoice_date: Option<NaiveDate>,
    pub invoice_number: Option<String>,
    pub provider_name: Option<String>,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
    pub similarity: u8,
    pub match_type: MatchType,
}

impl DuplicateCandidate {
    pub fn from_invoice(invoice: Invoice, similarity: u8, match_type: MatchType) -> Self {
        Self {
            id: invoice.id,
            file_name: invoice.file_name,
            amount: invoice.amount,
            invoice_date: invoice.invoice_date,
            invoice_number: invoice.invoice_number,
            provider_name: invoice.provider_name,
            status: invoice.status,
            created_at: invoice.created_at,
            similarity,
            match_type,
        }
    }
}

/// Fields of the incoming invoice used for matching
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateQuery {
    pub document_hash: Option<String>,
    pub invoice_number: Option<String>,
    pub amount: Option<f64>,
    pub provider_name: Option<String>,
    pub invoice_date: Option<NaiveDate>,
}

/// Ranked duplicate-check result
#[derive(Debug, Serialize)]
pub struct DuplicateCheckResult {
    pub duplicates: Vec<DuplicateCandidate>,
    pub count: usize,
    pub has_exact_duplicate: bool,
}

impl DuplicateCheckResult {
    pub fn ranked(candidates: Vec<DuplicateCandidate>) -> Self {
        let duplicates = rank_candidates(candidates);
        let count = duplicates.len();
        let has_exact_duplicate = duplicates.iter().any(|d| d.similarity == 100);
        Self {
            duplicates,
            count,
            has_exact_duplicate,
        }
    }
}

/// Heuristic similarity for a tier-3 candidate, given the incoming invoice's
/// provider name, amount, and date. Candidates reach this function only after
/// passing the coarse query filters (provider substring, ±5% amount, ±30 days).
pub fn similar_invoice_score(
    candidate: &Invoice,
    provider_name: &str,
    amount: f64,
    invoice_date: NaiveDate,
) -> u8 {
    let mut similarity: u32 = 60;

    // Exact provider name match, case-insensitive including umlauts
    if candidate
        .provider_name
        .as_deref()
        .map(|p| p.to_lowercase() == provider_name.to_lowercase())
        .unwrap_or(false)
    {
        similarity += 15;
    }

    // Exact amount match
    if (candidate.amount.unwrap_or(0.0) - amount).abs() < 0.01 {
        similarity += 15;
    }

    // Exact date match
    if candidate.invoice_date == Some(invoice_date) {
        similarity += 10;
    }

    similarity.min(90) as u8
}

/// Dedupe by invoice id (first occurrence wins), sort by similarity
/// descending, keep the top 5.
pub fn rank_candidates(candidates: Vec<DuplicateCandidate>) -> Vec<DuplicateCandidate> {
    let mut seen = std::collections::HashSet::new();
    let mut unique: Vec<DuplicateCandidate> = candidates
        .into_iter()
        .filter(|c| seen.insert(c.id))
        .collect();

    unique.sort_by(|a, b| b.similarity.cmp(&a.similarity));
    unique.truncate(MAX_CANDIDATES);
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn invoice(
        provider: Option<&str>,
        amount: Option<f64>,
        date: Option<NaiveDate>,
    ) -> Invoice {
        Invoice {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            file_url: "https://storage/invoices/x.pdf".to_string(),
            file_name: Some("x.pdf".to_string()),
            file_size: Some(1024),
            ocr_data: serde_json::json!({}),
            amount,
            invoice_date: date,
            invoice_number: None,
            provider_name: provider.map(|s| s.to_string()),
            provider_address: None,
            status: InvoiceStatus::Pending,
            document_hash: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn candidate(similarity: u8) -> DuplicateCandidate {
        DuplicateCandidate::from_invoice(
            invoice(None, None, None),
            similarity,
            MatchType::SimilarInvoice,
        )
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn heuristic_scores_stay_between_60_and_90() {
        // Nothing matches exactly: base score only
        let inv = invoice(Some("Praxis Dr. Weber"), Some(130.0), Some(date(2024, 2, 1)));
        let score = similar_invoice_score(&inv, "Weber", 125.50, date(2024, 1, 15));
        assert_eq!(score, 60);

        // All three bonuses would give 100, but similar matches cap at 90
        let inv = invoice(
            Some("Dr. Mueller Praxis"),
            Some(125.50),
            Some(date(2024, 1, 15)),
        );
        let score = similar_invoice_score(&inv, "dr. mueller praxis", 125.50, date(2024, 1, 15));
        assert_eq!(score, 90);
    }

    #[test]
    fn individual_bonuses_add_up() {
        let day = date(2024, 1, 15);

        // Exact provider only: 60 + 15
        let inv = invoice(Some("Zahnarzt Dr. Schmidt"), Some(92.0), Some(date(2024, 1, 20)));
        assert_eq!(
            similar_invoice_score(&inv, "zahnarzt dr. schmidt", 89.75, day),
            75
        );

        // Exact amount only: 60 + 15
        let inv = invoice(Some("Zahnarzt Dr. Schmidt Berlin"), Some(89.75), Some(date(2024, 1, 20)));
        assert_eq!(similar_invoice_score(&inv, "Schmidt", 89.75, day), 75);

        // Exact date only: 60 + 10
        let inv = invoice(Some("Zahnarzt Dr. Schmidt Berlin"), Some(91.0), Some(day));
        assert_eq!(similar_invoice_score(&inv, "Schmidt", 89.75, day), 70);
    }

    #[test]
    fn provider_match_survives_umlauts_in_either_case() {
        let day = date(2024, 1, 15);
        let inv = invoice(Some("Praxis Müller"), Some(130.0), Some(date(2024, 1, 20)));
        assert_eq!(
            similar_invoice_score(&inv, "PRAXIS MÜLLER", 89.75, day),
            75
        );
    }

    #[test]
    fn amount_bonus_uses_a_cent_tolerance() {
        let day = date(2024, 1, 15);
        let inv = invoice(Some("Praxis X"), Some(125.505), Some(date(2024, 2, 1)));
        assert_eq!(similar_invoice_score(&inv, "Y", 125.50, day), 75);

        let inv = invoice(Some("Praxis X"), Some(125.52), Some(date(2024, 2, 1)));
        assert_eq!(similar_invoice_score(&inv, "Y", 125.50, day), 60);
    }

    #[test]
    fn ranking_dedupes_sorts_and_truncates() {
        let repeated = candidate(80);
        let mut same_id = candidate(70);
        same_id.id = repeated.id;

        let candidates = vec![
            candidate(60),
            repeated.clone(),
            same_id, // dropped: same id as `repeated`
            candidate(95),
            candidate(90),
            candidate(65),
            candidate(75),
        ];

        let ranked = rank_candidates(candidates);
        assert_eq!(ranked.len(), MAX_CANDIDATES);
        let scores: Vec<u8> = ranked.iter().map(|c| c.similarity).collect();
        assert_eq!(scores, vec![95, 90, 80, 75, 65]);
        assert_eq!(
            ranked.iter().filter(|c| c.id == repeated.id).count(),
            1,
            "duplicate ids collapse to the first occurrence"
        );
    }

    #[test]
    fn exact_duplicate_flag_requires_similarity_100() {
        let result = DuplicateCheckResult::ranked(vec![candidate(95), candidate(90)]);
        assert!(!result.has_exact_duplicate);
        assert_eq!(result.count, 2);

        let exact = DuplicateCandidate::from_invoice(
            invoice(None, None, None),
            100,
            MatchType::ExactDocument,
        );
        let result = DuplicateCheckResult::ranked(vec![candidate(95), exact]);
        assert!(result.has_exact_duplicate);
    }
}
