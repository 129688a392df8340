//! Transactions: the ledger of money movements that everything else is
//! derived from.
//!
//! This module contains:
//! - The core data model and database queries ([core])
//! - Filtered, sorted, and paged ledger scans ([query])
//! - The REST handlers for the transaction CRUD routes ([handlers])

mod core;
mod handlers;
mod query;

pub use core::{
    Transaction, TransactionBuilder, TransactionId, TransactionKind, create_transaction,
    create_transaction_table, delete_transaction, get_transaction, update_transaction,
    TransactionUpdate,
};
pub use handlers::{
    create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
    get_transactions_endpoint, stats_summary_endpoint, update_transaction_endpoint,
};
pub use query::{
    SortBy, SortOrder, TransactionFilter, count_matching_transactions,
    count_transactions_for_user, get_all_transactions_for_user, get_recent_transactions,
    get_transactions_page,
};

#[cfg(test)]
pub(crate) use core::test_utils::insert_test_user;
