//! Transaction analytics: the aggregation engine and the REST routes that
//! expose it.
//!
//! This module contains:
//! - The aggregation engine ([engine]): pure functions over an owner-scoped
//!   transaction slice
//! - Validated query-parameter types for the analytics routes ([params])
//! - The REST handlers that wire validated parameters, a ledger scan, and
//!   the engine together ([handlers])

pub mod engine;
mod handlers;
mod params;

pub use handlers::{
    all_transactions_endpoint, dashboard_summary_endpoint, expenses_by_category_endpoint,
    expenses_by_date_endpoint, income_vs_expenses_endpoint, spending_trends_endpoint,
    top_categories_endpoint,
};
