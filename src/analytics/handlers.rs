//! REST handlers for the analytics routes.
//!
//! Each handler follows the same shape: validate the query parameters,
//! fetch the authenticated user's ledger snapshot, hand it to the
//! aggregation engine, and serialize the result. The handlers never
//! aggregate anything themselves, and the engine never sees an invalid
//! parameter or another user's data.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    auth::Claims,
    transaction::{
        SortBy, SortOrder, Transaction, TransactionFilter, TransactionKind,
        count_matching_transactions, get_all_transactions_for_user, get_transactions_page,
    },
};

use super::{
    engine::{
        self, BucketTotal, CategoryAverage, CategoryTotal, ComparisonRow, DashboardSummary,
        Granularity,
    },
    params::{BucketQuery, RangeQuery, ScanQuery, TopCategoriesQuery, TrendsQuery},
};

/// Fetch the authenticated user's full ledger snapshot.
fn fetch_ledger(state: &AppState, claims: &Claims) -> Result<Vec<Transaction>, Error> {
    let connection = state.lock_db()?;

    get_all_transactions_for_user(claims.user_id, &connection)
        .inspect_err(|error| tracing::error!("could not fetch ledger for aggregation: {error}"))
}

/// Metadata for the raw transaction listing.
#[derive(Debug, Serialize)]
pub(crate) struct ScanPagination {
    total: u64,
    limit: u64,
    skip: u64,
}

/// The response body for the raw transaction listing.
#[derive(Debug, Serialize)]
pub(crate) struct ScanResponse {
    transactions: Vec<Transaction>,
    pagination: ScanPagination,
}

/// Get a raw range-filtered slice of the user's ledger.
///
/// This feeds dashboard widgets that show recent activity; the aggregated
/// views below are computed server-side so clients never have to re-derive
/// them from this listing.
pub async fn all_transactions_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Query(params): Query<ScanQuery>,
) -> Result<Json<ScanResponse>, Error> {
    params.validate_range()?;
    let descending = params.descending()?;
    let limit = params.limit();
    let skip = params.skip();

    let filter = TransactionFilter {
        start_date: params.start_date,
        end_date: params.end_date,
        ..Default::default()
    };
    let sort_order = if descending {
        SortOrder::Descending
    } else {
        SortOrder::Ascending
    };

    let connection = state.lock_db()?;

    let total = count_matching_transactions(claims.user_id, &filter, &connection)?;
    let transactions = get_transactions_page(
        claims.user_id,
        &filter,
        SortBy::Date,
        sort_order,
        limit,
        skip,
        &connection,
    )?;

    Ok(Json(ScanResponse {
        transactions,
        pagination: ScanPagination { total, limit, skip },
    }))
}

/// Get expense totals grouped by category, highest spend first.
pub async fn expenses_by_category_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Query(params): Query<RangeQuery>,
) -> Result<Json<Vec<CategoryTotal>>, Error> {
    let range = params.validate()?;
    let transactions = fetch_ledger(&state, &claims)?;

    Ok(Json(engine::category_totals(&transactions, range)))
}

/// Get expense totals grouped into day, week, or month buckets.
pub async fn expenses_by_date_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Query(params): Query<BucketQuery>,
) -> Result<Json<Vec<BucketTotal>>, Error> {
    let range = params.validate_range()?;
    let granularity = params.validate_granularity(Granularity::Day)?;
    let transactions = fetch_ledger(&state, &claims)?;

    Ok(Json(engine::time_bucket_totals(
        &transactions,
        range,
        granularity,
        TransactionKind::Expense,
    )))
}

/// Compare income against expenses per time bucket.
pub async fn income_vs_expenses_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Query(params): Query<BucketQuery>,
) -> Result<Json<Vec<ComparisonRow>>, Error> {
    let range = params.validate_range()?;
    let granularity = params.validate_granularity(Granularity::Month)?;
    let transactions = fetch_ledger(&state, &claims)?;

    Ok(Json(engine::income_vs_expense(
        &transactions,
        range,
        granularity,
    )))
}

/// Get monthly expense totals per category over a trailing window.
pub async fn spending_trends_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Query(params): Query<TrendsQuery>,
) -> Result<Json<BTreeMap<String, BTreeMap<String, f64>>>, Error> {
    let months_back = params.validate_months()?;
    let transactions = fetch_ledger(&state, &claims)?;

    // The engine takes the reference date explicitly; this is the only
    // place the trends computation touches the clock.
    let today = OffsetDateTime::now_utc().date();

    Ok(Json(engine::spending_trends(
        &transactions,
        months_back,
        today,
    )))
}

/// Get the highest-spend categories with their averages.
pub async fn top_categories_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Query(params): Query<TopCategoriesQuery>,
) -> Result<Json<Vec<CategoryAverage>>, Error> {
    let range = params.validate_range()?;
    let limit = params.clamped_limit();
    let transactions = fetch_ledger(&state, &claims)?;

    Ok(Json(engine::top_categories(&transactions, range, limit)))
}

/// Get the dashboard summary: per-kind totals, net income, and savings rate.
pub async fn dashboard_summary_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Query(params): Query<RangeQuery>,
) -> Result<Json<DashboardSummary>, Error> {
    let range = params.validate()?;
    let transactions = fetch_ledger(&state, &claims)?;

    Ok(Json(engine::dashboard_summary(&transactions, range)))
}
