//! The API endpoint URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/transactions/{transaction_id}',
//! use [format_endpoint].

/// The health check route.
pub const HEALTH: &str = "/api/health";
/// The route for registering a user.
pub const USERS: &str = "/api/users";
/// The route for signing in a user.
pub const SIGN_IN: &str = "/api/sign_in";
/// The route to list and create transactions.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route to access a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";
/// The route for per-kind transaction totals.
pub const TRANSACTION_STATS: &str = "/api/transactions/stats/summary";
/// The route for a raw range-filtered ledger slice.
pub const ALL_TRANSACTIONS: &str = "/api/analytics/all-transactions";
/// The route for expense totals grouped by category.
pub const EXPENSES_BY_CATEGORY: &str = "/api/analytics/expenses-by-category";
/// The route for expense totals grouped into time buckets.
pub const EXPENSES_BY_DATE: &str = "/api/analytics/expenses-by-date";
/// The route comparing income against expenses per time bucket.
pub const INCOME_VS_EXPENSES: &str = "/api/analytics/income-vs-expenses";
/// The route for monthly expense totals per category.
pub const SPENDING_TRENDS: &str = "/api/analytics/spending-trends";
/// The route for the highest-spend categories.
pub const TOP_CATEGORIES: &str = "/api/analytics/top-categories";
/// The route for the dashboard summary.
pub const DASHBOARD_SUMMARY: &str = "/api/analytics/dashboard-summary";
/// The route to upload a receipt.
pub const RECEIPTS: &str = "/api/receipts";
/// The route to fetch or delete a stored receipt file.
pub const RECEIPT_FILE: &str = "/api/receipts/{filename}";
/// The route for the live dashboard event stream.
pub const EVENTS: &str = "/api/events";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/api/transactions/{transaction_id}',
/// '{transaction_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let mut param_start = None;
    let mut param_end = None;

    for (i, c) in endpoint_path.chars().enumerate() {
        if c == '{' {
            param_start = Some(i);
        } else if param_start.is_some() && c == '}' {
            param_end = Some(i + 1);
            break;
        }
    }

    let param_start = match param_start {
        Some(start) => start,
        None => return endpoint_path.to_string(),
    };

    let param_end = param_end.unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
