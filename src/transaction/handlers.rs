//! REST handlers for the transaction CRUD routes.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::{Date, OffsetDateTime};

use crate::{
    AppState, Error,
    analytics::engine::{self, DateRange},
    auth::Claims,
    pagination::Pagination,
};

use super::{
    core::{
        Transaction, TransactionId, TransactionKind, TransactionUpdate, create_transaction,
        delete_transaction, get_transaction, update_transaction,
    },
    query::{
        SortBy, SortOrder, TransactionFilter, count_matching_transactions,
        get_all_transactions_for_user, get_transactions_page,
    },
};

/// Query parameters for the transaction listing route.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    /// Only return transactions of this kind.
    #[serde(rename = "type")]
    pub kind: Option<TransactionKind>,
    /// Only return transactions with this exact category label.
    pub category: Option<String>,
    /// Only return transactions on or after this date.
    pub start_date: Option<Date>,
    /// Only return transactions on or before this date.
    pub end_date: Option<Date>,
    /// The 1-based page number to return.
    pub page: Option<u64>,
    /// The number of transactions per page.
    pub limit: Option<u64>,
    /// The column to sort by, defaulting to the transaction date.
    pub sort_by: Option<SortBy>,
    /// The sort direction, defaulting to newest first.
    pub sort_order: Option<SortOrder>,
}

/// A page of transactions plus pagination metadata.
#[derive(Debug, Serialize)]
pub(crate) struct ListResponse {
    transactions: Vec<Transaction>,
    pagination: Pagination,
}

fn validate_range(start_date: Option<Date>, end_date: Option<Date>) -> Result<(), Error> {
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if start > end {
            return Err(Error::InvalidQuery(format!(
                "startDate {start} is after endDate {end}"
            )));
        }
    }

    Ok(())
}

/// Get a filtered, sorted page of the authenticated user's transactions.
pub async fn get_transactions_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Query(params): Query<ListQuery>,
) -> Result<Json<ListResponse>, Error> {
    validate_range(params.start_date, params.end_date)?;

    let (page, page_size) = state.pagination_config.resolve(params.page, params.limit);
    let sort_by = params.sort_by.unwrap_or(SortBy::Date);
    let sort_order = params.sort_order.unwrap_or(SortOrder::Descending);

    let filter = TransactionFilter {
        kind: params.kind,
        category: params.category,
        start_date: params.start_date,
        end_date: params.end_date,
    };

    let connection = state.lock_db()?;

    let total_items = count_matching_transactions(claims.user_id, &filter, &connection)?;
    let transactions = get_transactions_page(
        claims.user_id,
        &filter,
        sort_by,
        sort_order,
        page_size,
        (page - 1) * page_size,
        &connection,
    )?;

    Ok(Json(ListResponse {
        transactions,
        pagination: Pagination::new(page, total_items, page_size),
    }))
}

/// The request body for creating a transaction.
#[derive(Debug, Deserialize)]
pub struct NewTransactionRequest {
    /// Income or expense.
    #[serde(rename = "type", alias = "kind")]
    pub kind: TransactionKind,
    /// The transaction amount. Must be a finite, non-negative number.
    pub amount: f64,
    /// What the transaction was for. Must not be empty.
    pub description: String,
    /// The category label. Must not be empty.
    pub category: String,
    /// When the transaction occurred, defaulting to today.
    pub date: Option<Date>,
    /// Optional free-form labels.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Optional free-form notes.
    pub notes: Option<String>,
}

/// Create a new transaction for the authenticated user.
pub async fn create_transaction_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<NewTransactionRequest>,
) -> Result<impl IntoResponse, Error> {
    let date = request
        .date
        .unwrap_or_else(|| OffsetDateTime::now_utc().date());

    let builder = Transaction::build(
        claims.user_id,
        request.kind,
        request.amount,
        &request.category,
        date,
        &request.description,
    )
    .tags(request.tags)
    .notes(request.notes);

    let connection = state.lock_db()?;
    let transaction = create_transaction(builder, &connection)?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

/// Get a single transaction owned by the authenticated user.
pub async fn get_transaction_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Path(transaction_id): Path<TransactionId>,
) -> Result<Json<Transaction>, Error> {
    let connection = state.lock_db()?;
    let transaction = get_transaction(transaction_id, claims.user_id, &connection)?;

    Ok(Json(transaction))
}

/// Apply a partial update to a transaction owned by the authenticated user.
pub async fn update_transaction_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Path(transaction_id): Path<TransactionId>,
    Json(update): Json<TransactionUpdate>,
) -> Result<Json<Transaction>, Error> {
    let connection = state.lock_db()?;
    let transaction = update_transaction(transaction_id, claims.user_id, update, &connection)?;

    Ok(Json(transaction))
}

/// Delete a transaction owned by the authenticated user.
pub async fn delete_transaction_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Path(transaction_id): Path<TransactionId>,
) -> Result<Json<serde_json::Value>, Error> {
    let connection = state.lock_db()?;
    delete_transaction(transaction_id, claims.user_id, &connection)?;

    Ok(Json(json!({ "message": "Transaction deleted successfully" })))
}

/// Query parameters for the stats summary route.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    /// The first date to include.
    pub start_date: Option<Date>,
    /// The last date to include.
    pub end_date: Option<Date>,
}

/// Total and count for one transaction kind.
#[derive(Debug, Serialize)]
pub(crate) struct KindStats {
    total: f64,
    count: u64,
}

/// Per-kind totals plus the net amount over a date range.
#[derive(Debug, Serialize)]
pub(crate) struct StatsSummary {
    income: KindStats,
    expense: KindStats,
    net: f64,
}

/// Get per-kind totals and the net amount for the authenticated user.
pub async fn stats_summary_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Query(params): Query<StatsQuery>,
) -> Result<Json<StatsSummary>, Error> {
    validate_range(params.start_date, params.end_date)?;
    let range = DateRange::new(params.start_date, params.end_date);

    let transactions = {
        let connection = state.lock_db()?;
        get_all_transactions_for_user(claims.user_id, &connection)?
    };

    let summary = engine::dashboard_summary(&transactions, range);

    Ok(Json(StatsSummary {
        income: KindStats {
            total: summary.income.total,
            count: summary.income.count,
        },
        expense: KindStats {
            total: summary.expense.total,
            count: summary.expense.count,
        },
        net: summary.net_income,
    }))
}
