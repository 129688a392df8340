//! Application router configuration.

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;

use crate::{
    AppState,
    analytics::{
        all_transactions_endpoint, dashboard_summary_endpoint, expenses_by_category_endpoint,
        expenses_by_date_endpoint, income_vs_expenses_endpoint, spending_trends_endpoint,
        top_categories_endpoint,
    },
    auth::{register_user, sign_in},
    endpoints,
    events::get_event_stream,
    logging::logging_middleware,
    receipt::{delete_receipt_endpoint, get_receipt_endpoint, upload_receipt_endpoint},
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
        get_transactions_endpoint, stats_summary_endpoint, update_transaction_endpoint,
    },
};

/// Receipt uploads get some slack on top of the file size limit for the
/// multipart framing and the extracted-text field.
const RECEIPT_BODY_LIMIT: usize = 11 * 1024 * 1024;

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route(endpoints::HEALTH, get(get_health))
        .route(endpoints::USERS, post(register_user))
        .route(endpoints::SIGN_IN, post(sign_in))
        .route(
            endpoints::TRANSACTIONS,
            get(get_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(endpoints::TRANSACTION_STATS, get(stats_summary_endpoint))
        .route(
            endpoints::TRANSACTION,
            get(get_transaction_endpoint)
                .put(update_transaction_endpoint)
                .delete(delete_transaction_endpoint),
        )
        .route(endpoints::ALL_TRANSACTIONS, get(all_transactions_endpoint))
        .route(
            endpoints::EXPENSES_BY_CATEGORY,
            get(expenses_by_category_endpoint),
        )
        .route(endpoints::EXPENSES_BY_DATE, get(expenses_by_date_endpoint))
        .route(
            endpoints::INCOME_VS_EXPENSES,
            get(income_vs_expenses_endpoint),
        )
        .route(endpoints::SPENDING_TRENDS, get(spending_trends_endpoint))
        .route(endpoints::TOP_CATEGORIES, get(top_categories_endpoint))
        .route(endpoints::DASHBOARD_SUMMARY, get(dashboard_summary_endpoint))
        .route(
            endpoints::RECEIPTS,
            post(upload_receipt_endpoint).layer(DefaultBodyLimit::max(RECEIPT_BODY_LIMIT)),
        )
        .route(
            endpoints::RECEIPT_FILE,
            get(get_receipt_endpoint).delete(delete_receipt_endpoint),
        )
        .layer(middleware::from_fn(logging_middleware));

    // The event stream stays outside the logging middleware: that
    // middleware buffers whole response bodies, and this one never ends.
    Router::new()
        .merge(api_routes)
        .route(endpoints::EVENTS, get(get_event_stream))
        .fallback(get_404_not_found)
        .with_state(state)
}

/// Report that the API is up.
async fn get_health() -> Json<serde_json::Value> {
    Json(json!({ "status": "OK", "message": "Fintrack API is running" }))
}

/// The JSON 404 response for unknown routes.
async fn get_404_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "the requested resource could not be found" })),
    )
        .into_response()
}
