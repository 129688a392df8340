//! Owner-scoped ledger scans: filtered, sorted, and paged queries over the
//! transaction table.
//!
//! Grouping and aggregation are deliberately NOT pushed into SQL; these
//! functions return plain transaction rows and the
//! [engine](crate::analytics::engine) aggregates them in memory, so that
//! exactly one implementation of every aggregate exists.

use rusqlite::{Connection, ToSql};
use serde::Deserialize;
use time::Date;

use crate::{Error, user::UserID};

use super::core::{Transaction, TransactionKind, map_transaction_row};

/// Optional filters applied to a ledger scan.
///
/// Date bounds are inclusive on both ends, and either bound may be omitted
/// to leave the range unbounded on that side.
#[derive(Debug, Default, Clone)]
pub struct TransactionFilter {
    /// Only return transactions of this kind.
    pub kind: Option<TransactionKind>,
    /// Only return transactions with this exact category label.
    pub category: Option<String>,
    /// Only return transactions on or after this date.
    pub start_date: Option<Date>,
    /// Only return transactions on or before this date.
    pub end_date: Option<Date>,
}

/// The column to sort a ledger scan by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Sort by the transaction date.
    Date,
    /// Sort by the transaction amount.
    Amount,
}

impl SortBy {
    fn column(&self) -> &'static str {
        match self {
            SortBy::Date => "date",
            SortBy::Amount => "amount",
        }
    }
}

/// The order to sort transactions in a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SortOrder {
    /// Sort in order of increasing value.
    #[serde(rename = "asc")]
    Ascending,
    /// Sort in order of decreasing value.
    #[serde(rename = "desc")]
    Descending,
}

impl SortOrder {
    fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

const TRANSACTION_COLUMNS: &str =
    "id, user_id, kind, amount, category, date, description, tags, notes";

/// Append the filter's WHERE conditions to `sql` and its values to `params`.
fn push_filter_clauses<'a>(
    filter: &'a TransactionFilter,
    sql: &mut String,
    params: &mut Vec<&'a dyn ToSql>,
) {
    if let Some(kind) = &filter.kind {
        sql.push_str(" AND kind = ?");
        params.push(kind);
    }

    if let Some(category) = &filter.category {
        sql.push_str(" AND category = ?");
        params.push(category);
    }

    if let Some(start_date) = &filter.start_date {
        sql.push_str(" AND date >= ?");
        params.push(start_date);
    }

    if let Some(end_date) = &filter.end_date {
        sql.push_str(" AND date <= ?");
        params.push(end_date);
    }
}

/// Get a page of `owner`'s transactions matching `filter`.
///
/// Rows are sorted by `sort_by` in `sort_order`, with the ID as a secondary
/// key to keep the order stable after updates.
///
/// # Errors
/// Returns an [Error::SqlError] if the query fails.
pub fn get_transactions_page(
    owner: UserID,
    filter: &TransactionFilter,
    sort_by: SortBy,
    sort_order: SortOrder,
    limit: u64,
    offset: u64,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let owner_id = owner.as_i64();
    let limit = limit as i64;
    let offset = offset as i64;

    let mut sql = format!("SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE user_id = ?");
    let mut params: Vec<&dyn ToSql> = vec![&owner_id];
    push_filter_clauses(filter, &mut sql, &mut params);

    sql.push_str(&format!(
        " ORDER BY {} {}, id ASC LIMIT ? OFFSET ?",
        sort_by.column(),
        sort_order.keyword()
    ));
    params.push(&limit);
    params.push(&offset);

    connection
        .prepare(&sql)?
        .query_map(&params[..], map_transaction_row)?
        .map(|transaction_result| transaction_result.map_err(Error::SqlError))
        .collect()
}

/// Count `owner`'s transactions matching `filter`.
///
/// Used together with [get_transactions_page] to build pagination metadata.
///
/// # Errors
/// Returns an [Error::SqlError] if the query fails.
pub fn count_matching_transactions(
    owner: UserID,
    filter: &TransactionFilter,
    connection: &Connection,
) -> Result<u64, Error> {
    let owner_id = owner.as_i64();

    let mut sql = String::from("SELECT COUNT(id) FROM \"transaction\" WHERE user_id = ?");
    let mut params: Vec<&dyn ToSql> = vec![&owner_id];
    push_filter_clauses(filter, &mut sql, &mut params);

    let count: i64 = connection.query_row(&sql, &params[..], |row| row.get(0))?;

    Ok(count as u64)
}

/// Get all of `owner`'s transactions, ordered by date then ID.
///
/// This is the scan handed to the aggregation engine: already scoped to one
/// owner, unfiltered otherwise (the engine applies its own range filters).
///
/// # Errors
/// Returns an [Error::SqlError] if the query fails.
pub fn get_all_transactions_for_user(
    owner: UserID,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let sql = format!(
        "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
         WHERE user_id = :user_id ORDER BY date ASC, id ASC"
    );

    connection
        .prepare(&sql)?
        .query_map(&[(":user_id", &owner.as_i64())], map_transaction_row)?
        .map(|transaction_result| transaction_result.map_err(Error::SqlError))
        .collect()
}

/// Get `owner`'s most recent transactions, newest first.
///
/// # Errors
/// Returns an [Error::SqlError] if the query fails.
pub fn get_recent_transactions(
    owner: UserID,
    limit: u64,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let sql = format!(
        "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
         WHERE user_id = :user_id ORDER BY date DESC, id DESC LIMIT :limit"
    );

    connection
        .prepare(&sql)?
        .query_map(
            &[(":user_id", &owner.as_i64()), (":limit", &(limit as i64))],
            map_transaction_row,
        )?
        .map(|transaction_result| transaction_result.map_err(Error::SqlError))
        .collect()
}

/// Get the total number of transactions owned by `owner`.
///
/// # Errors
/// Returns an [Error::SqlError] if the query fails.
pub fn count_transactions_for_user(owner: UserID, connection: &Connection) -> Result<u64, Error> {
    let count: i64 = connection.query_row(
        "SELECT COUNT(id) FROM \"transaction\" WHERE user_id = :user_id",
        &[(":user_id", &owner.as_i64())],
        |row| row.get(0),
    )?;

    Ok(count as u64)
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use time::{Duration, macros::date};

    use crate::{
        db::initialize,
        transaction::{
            Transaction, TransactionKind, core::test_utils::insert_test_user, create_transaction,
        },
        user::UserID,
    };

    use super::{
        SortBy, SortOrder, TransactionFilter, count_matching_transactions,
        count_transactions_for_user, get_all_transactions_for_user, get_recent_transactions,
        get_transactions_page,
    };

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    fn seed_transactions(owner: UserID, conn: &Connection) {
        let today = date!(2025 - 10 - 05);

        for i in 0..10 {
            let kind = if i % 2 == 0 {
                TransactionKind::Expense
            } else {
                TransactionKind::Income
            };
            let category = if i < 5 { "food" } else { "transport" };

            create_transaction(
                Transaction::build(
                    owner,
                    kind,
                    (i + 1) as f64,
                    category,
                    today - Duration::days(i),
                    &format!("transaction #{i}"),
                ),
                conn,
            )
            .unwrap();
        }
    }

    #[test]
    fn page_is_scoped_to_owner() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn);
        let other_user = insert_test_user(&conn);
        seed_transactions(owner, &conn);
        seed_transactions(other_user, &conn);

        let got = get_transactions_page(
            owner,
            &TransactionFilter::default(),
            SortBy::Date,
            SortOrder::Descending,
            100,
            0,
            &conn,
        )
        .unwrap();

        assert_eq!(got.len(), 10);
        assert!(got.iter().all(|transaction| transaction.owner == owner));
    }

    #[test]
    fn kind_filter_returns_only_matching_rows() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn);
        seed_transactions(owner, &conn);

        let filter = TransactionFilter {
            kind: Some(TransactionKind::Expense),
            ..Default::default()
        };
        let got = get_transactions_page(
            owner,
            &filter,
            SortBy::Date,
            SortOrder::Descending,
            100,
            0,
            &conn,
        )
        .unwrap();

        assert_eq!(got.len(), 5);
        assert!(
            got.iter()
                .all(|transaction| transaction.kind == TransactionKind::Expense)
        );
    }

    #[test]
    fn date_range_filter_is_inclusive() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn);
        seed_transactions(owner, &conn);
        let today = date!(2025 - 10 - 05);

        let filter = TransactionFilter {
            start_date: Some(today - Duration::days(4)),
            end_date: Some(today),
            ..Default::default()
        };
        let got = get_transactions_page(
            owner,
            &filter,
            SortBy::Date,
            SortOrder::Ascending,
            100,
            0,
            &conn,
        )
        .unwrap();

        assert_eq!(got.len(), 5, "got {} transactions, want 5", got.len());
        assert_eq!(got.first().unwrap().date, today - Duration::days(4));
        assert_eq!(got.last().unwrap().date, today);
    }

    #[test]
    fn category_filter_matches_exact_label() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn);
        seed_transactions(owner, &conn);

        let filter = TransactionFilter {
            category: Some("food".to_owned()),
            ..Default::default()
        };
        let count = count_matching_transactions(owner, &filter, &conn).unwrap();

        assert_eq!(count, 5);
    }

    #[test]
    fn pagination_splits_results() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn);
        seed_transactions(owner, &conn);

        let first_page = get_transactions_page(
            owner,
            &TransactionFilter::default(),
            SortBy::Date,
            SortOrder::Descending,
            4,
            0,
            &conn,
        )
        .unwrap();
        let second_page = get_transactions_page(
            owner,
            &TransactionFilter::default(),
            SortBy::Date,
            SortOrder::Descending,
            4,
            4,
            &conn,
        )
        .unwrap();

        assert_eq!(first_page.len(), 4);
        assert_eq!(second_page.len(), 4);
        assert!(
            first_page
                .iter()
                .all(|transaction| !second_page.contains(transaction))
        );
    }

    #[test]
    fn sort_by_amount_descending() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn);
        seed_transactions(owner, &conn);

        let got = get_transactions_page(
            owner,
            &TransactionFilter::default(),
            SortBy::Amount,
            SortOrder::Descending,
            3,
            0,
            &conn,
        )
        .unwrap();

        let amounts: Vec<f64> = got
            .iter()
            .map(|transaction| transaction.amount)
            .collect();
        assert_eq!(amounts, vec![10.0, 9.0, 8.0]);
    }

    #[test]
    fn full_scan_is_ordered_by_date() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn);
        seed_transactions(owner, &conn);

        let got = get_all_transactions_for_user(owner, &conn).unwrap();

        assert_eq!(got.len(), 10);
        assert!(
            got.windows(2)
                .all(|window| window[0].date <= window[1].date)
        );
    }

    #[test]
    fn recent_transactions_returns_newest_first() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn);
        seed_transactions(owner, &conn);

        let got = get_recent_transactions(owner, 5, &conn).unwrap();

        assert_eq!(got.len(), 5);
        assert!(
            got.windows(2)
                .all(|window| window[0].date >= window[1].date)
        );
    }

    #[test]
    fn count_is_scoped_to_owner() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn);
        let other_user = insert_test_user(&conn);
        seed_transactions(owner, &conn);

        assert_eq!(count_transactions_for_user(owner, &conn).unwrap(), 10);
        assert_eq!(count_transactions_for_user(other_user, &conn).unwrap(), 0);
    }
}
