//! Duplicate detection endpoint.
//!
//! Three tiers evaluated in decreasing confidence, short-circuiting once a
//! tier yields rows: exact document hash, matching invoice number, then the
//! provider/amount/date heuristic. The tiers are intentionally mutually
//! exclusive, matching the submission flow this backs.

use axum::{extract::State, response::IntoResponse, Json};
use chrono::Duration;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::duplicates::{
    similar_invoice_score, DuplicateCandidate, DuplicateCheckResult, DuplicateQuery, MatchType,
    AMOUNT_TOLERANCE, DATE_WINDOW_DAYS,
};
use crate::domain::invoices::Invoice;
use crate::error::ApiResult;

/// POST /duplicates
///
/// Rank prior invoices of the caller that look like re-submissions of the
/// described one.
pub async fn check_duplicates(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(query): Json<DuplicateQuery>,
) -> ApiResult<impl IntoResponse> {
    let candidates = find_duplicates(&state.db, auth.user_id, &query).await?;
    let result = DuplicateCheckResult::ranked(candidates);

    tracing::info!(
        user_id = %auth.user_id,
        count = result.count,
        has_exact = result.has_exact_duplicate,
        "Duplicate check complete"
    );

    Ok(DataResponse::new(result))
}

/// Run the tiered duplicate search for one user.
pub async fn find_duplicates(
    db: &PgPool,
    user_id: Uuid,
    query: &DuplicateQuery,
) -> Result<Vec<DuplicateCandidate>, sqlx::Error> {
    // Tier 1: exact document hash
    if let Some(hash) = query.document_hash.as_deref().filter(|h| !h.is_empty()) {
        let matches = sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE user_id = $1 AND document_hash = $2",
        )
        .bind(user_id)
        .bind(hash)
        .fetch_all(db)
        .await?;

        if !matches.is_empty() {
            return Ok(matches
                .into_iter()
                .map(|inv| DuplicateCandidate::from_invoice(inv, 100, MatchType::ExactDocument))
                .collect());
        }
    }

    // Tier 2: matching invoice number
    if let Some(number) = query.invoice_number.as_deref().filter(|n| !n.is_empty()) {
        let matches = sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE user_id = $1 AND invoice_number = $2",
        )
        .bind(user_id)
        .bind(number)
        .fetch_all(db)
        .await?;

        if !matches.is_empty() {
            return Ok(matches
                .into_iter()
                .map(|inv| DuplicateCandidate::from_invoice(inv, 95, MatchType::InvoiceNumber))
                .collect());
        }
    }

    // Tier 3: heuristic similarity; needs provider, amount, and date
    let (Some(provider_name), Some(amount), Some(invoice_date)) = (
        query.provider_name.as_deref().filter(|p| !p.is_empty()),
        query.amount,
        query.invoice_date,
    ) else {
        return Ok(Vec::new());
    };

    let tolerance = amount * AMOUNT_TOLERANCE;
    let window = Duration::days(DATE_WINDOW_DAYS);

    let matches = sqlx::query_as::<_, Invoice>(
        r#"
        SELECT * FROM invoices
        WHERE user_id = $1
          AND provider_name ILIKE $2
          AND amount BETWEEN $3 AND $4
          AND invoice_date BETWEEN $5 AND $6
        "#,
    )
    .bind(user_id)
    .bind(format!("%{}%", provider_name))
    .bind(amount - tolerance)
    .bind(amount + tolerance)
    .bind(invoice_date - window)
    .bind(invoice_date + window)
    .fetch_all(db)
    .await?;

    Ok(matches
        .into_iter()
        .map(|inv| {
            let similarity = similar_invoice_score(&inv, provider_name, amount, invoice_date);
            DuplicateCandidate::from_invoice(inv, similarity, MatchType::SimilarInvoice)
        })
        .collect())
}
