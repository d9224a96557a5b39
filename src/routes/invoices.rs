//! Invoice list/create endpoints.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::{DataResponse, PaginationMeta, PaginationParams};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::invoices::{CreateInvoiceRequest, Invoice};
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize, Default)]
pub struct InvoiceListQuery {
    #[serde(flatten)]
    pub pagination: PaginationParams,
    pub status: Option<String>,
    pub provider: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InvoiceListData {
    pub invoices: Vec<Invoice>,
    pub pagination: PaginationMeta,
}

/// GET /invoices
///
/// List the caller's invoices, newest first, with status/provider/search
/// filters and page/limit pagination.
pub async fn list_invoices(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(query): Query<InvoiceListQuery>,
) -> ApiResult<impl IntoResponse> {
    let mut count_qb = sqlx::QueryBuilder::new("SELECT COUNT(*) FROM invoices WHERE user_id = ");
    count_qb.push_bind(auth.user_id);
    push_filters(&mut count_qb, &query);

    let total: i64 = count_qb.build_query_scalar().fetch_one(&state.db).await?;

    let mut qb = sqlx::QueryBuilder::new("SELECT * FROM invoices WHERE user_id = ");
    qb.push_bind(auth.user_id);
    push_filters(&mut qb, &query);
    qb.push(" ORDER BY created_at DESC LIMIT ");
    qb.push_bind(query.pagination.limit() as i64);
    qb.push(" OFFSET ");
    qb.push_bind(query.pagination.offset() as i64);

    let invoices: Vec<Invoice> = qb.build_query_as().fetch_all(&state.db).await?;

    Ok(DataResponse::new(InvoiceListData {
        invoices,
        pagination: PaginationMeta::new(&query.pagination, total as u64),
    }))
}

fn push_filters<'a>(
    qb: &mut sqlx::QueryBuilder<'a, sqlx::Postgres>,
    query: &'a InvoiceListQuery,
) {
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        qb.push(" AND status = ");
        qb.push_bind(status);
    }

    if let Some(provider) = query.provider.as_deref().filter(|p| !p.is_empty()) {
        qb.push(" AND provider_name ILIKE ");
        qb.push_bind(format!("%{}%", provider));
    }

    if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        qb.push(" AND (invoice_number ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR provider_name ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR notes ILIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }
}

/// POST /invoices
///
/// Persist an invoice after a successful upload. A unique-violation on the
/// per-user document hash means the same document was already submitted.
pub async fn create_invoice(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateInvoiceRequest>,
) -> ApiResult<impl IntoResponse> {
    let file_url = req
        .file_url
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::bad_request("File URL is required"))?;

    let invoice = sqlx::query_as::<_, Invoice>(
        r#"
        INSERT INTO invoices (
            user_id, file_url, file_name, file_size, ocr_data, amount,
            invoice_date, invoice_number, provider_name, provider_address,
            status, document_hash, notes
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(auth.user_id)
    .bind(file_url)
    .bind(&req.file_name)
    .bind(req.file_size)
    .bind(req.ocr_data.clone().unwrap_or_else(|| serde_json::json!({})))
    .bind(req.amount)
    .bind(req.invoice_date)
    .bind(&req.invoice_number)
    .bind(&req.provider_name)
    .bind(&req.provider_address)
    .bind(req.status.unwrap_or_default())
    .bind(&req.document_hash)
    .bind(&req.notes)
    .fetch_one(&state.db)
    .await
    .map_err(map_insert_error)?;

    tracing::info!(
        user_id = %auth.user_id,
        invoice_id = %invoice.id,
        status = %invoice.status,
        "Invoice created"
    );

    Ok((StatusCode::CREATED, Json(DataResponse::new(invoice))))
}

/// Map a duplicate document hash to 409; everything else passes through.
fn map_insert_error(err: sqlx::Error) -> ApiError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") && db_err.message().contains("document_hash")
        {
            return ApiError::conflict("This invoice has already been uploaded");
        }
    }
    ApiError::Database(err)
}
