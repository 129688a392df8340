//! Defines the core data models and database queries for transactions.

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{Error, user::UserID};

/// An alias for the integer type used for transaction IDs.
pub type TransactionId = i64;

/// Whether a transaction brought money in or sent money out.
///
/// This is a closed set: the database schema, the JSON API, and the
/// aggregation engine all reject anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money earned, e.g. salary or interest.
    Income,
    /// Money spent, e.g. groceries or rent.
    Expense,
}

impl TransactionKind {
    /// The kind as the lowercase string stored in the database and used on
    /// the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }
}

impl ToSql for TransactionKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for TransactionKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            other => Err(FromSqlError::Other(
                format!("unknown transaction kind {other:?}").into(),
            )),
        }
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The ID of the user the transaction belongs to.
    ///
    /// Every ledger query is scoped to exactly one owner; aggregation never
    /// mixes data across owners.
    pub owner: UserID,
    /// Whether the transaction is income or an expense.
    pub kind: TransactionKind,
    /// The amount of money that changed hands. Always non-negative, the
    /// direction is carried by `kind`.
    pub amount: f64,
    /// The user-chosen category label, e.g. "Groceries".
    pub category: String,
    /// When the transaction took effect.
    pub date: Date,
    /// A text description of what the transaction was for.
    pub description: String,
    /// Optional free-form labels. Not used by aggregation.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Optional free-form notes. Not used by aggregation.
    pub notes: Option<String>,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(
        owner: UserID,
        kind: TransactionKind,
        amount: f64,
        category: &str,
        date: Date,
        description: &str,
    ) -> TransactionBuilder {
        TransactionBuilder {
            owner,
            kind,
            amount,
            category: category.to_owned(),
            date,
            description: description.to_owned(),
            tags: Vec::new(),
            notes: None,
        }
    }
}

/// A builder for creating [Transaction] instances.
///
/// The builder validates its fields when [TransactionBuilder::validate] is
/// called (and [create_transaction] calls it for you), so that malformed
/// amounts or empty labels are rejected at creation time and never reach
/// the aggregation engine.
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    /// The user the transaction will belong to.
    pub owner: UserID,
    /// Income or expense.
    pub kind: TransactionKind,
    /// The monetary amount of the transaction. Must be a finite,
    /// non-negative number.
    pub amount: f64,
    /// The category label. Must not be empty.
    pub category: String,
    /// The date the transaction occurred. Callers default this to today
    /// when the client does not specify one.
    pub date: Date,
    /// A human-readable description. Must not be empty.
    pub description: String,
    /// Optional free-form labels.
    pub tags: Vec<String>,
    /// Optional free-form notes.
    pub notes: Option<String>,
}

impl TransactionBuilder {
    /// Set the tags for the transaction.
    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Set the notes for the transaction.
    pub fn notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    /// Check the builder's fields against the transaction invariants.
    ///
    /// # Errors
    /// Returns an:
    /// - [Error::InvalidAmount] if the amount is negative, NaN, or infinite,
    /// - [Error::EmptyField] if the description or category is empty or
    ///   only whitespace.
    pub fn validate(&self) -> Result<(), Error> {
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(Error::InvalidAmount(self.amount));
        }

        if self.description.trim().is_empty() {
            return Err(Error::EmptyField("description"));
        }

        if self.category.trim().is_empty() {
            return Err(Error::EmptyField("category"));
        }

        Ok(())
    }
}

/// A partial update to an existing transaction.
///
/// Fields left as `None` keep their current value.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct TransactionUpdate {
    /// Replace the transaction kind.
    #[serde(rename = "type", alias = "kind")]
    pub kind: Option<TransactionKind>,
    /// Replace the amount.
    pub amount: Option<f64>,
    /// Replace the category.
    pub category: Option<String>,
    /// Replace the date.
    pub date: Option<Date>,
    /// Replace the description.
    pub description: Option<String>,
    /// Replace the tags.
    pub tags: Option<Vec<String>>,
    /// Replace the notes.
    pub notes: Option<String>,
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                kind TEXT NOT NULL CHECK(kind IN ('income', 'expense')),
                amount REAL NOT NULL CHECK(amount >= 0),
                category TEXT NOT NULL,
                date TEXT NOT NULL,
                description TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '[]',
                notes TEXT,
                FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE
                )",
        (),
    )?;

    // Composite index used by the owner-scoped ledger scans.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_date ON \"transaction\"(user_id, date);",
        (),
    )?;

    Ok(())
}

/// Create a new transaction in the database from a builder.
///
/// # Errors
/// This function will return an:
/// - [Error::InvalidAmount] or [Error::EmptyField] if the builder fails
///   validation,
/// - [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    builder.validate()?;

    let tags_json = serde_json::to_string(&builder.tags)
        .map_err(|error| Error::JSONSerializationError(error.to_string()))?;

    let transaction = connection
        .prepare(
            "INSERT INTO \"transaction\" (user_id, kind, amount, category, date, description, tags, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             RETURNING id, user_id, kind, amount, category, date, description, tags, notes",
        )?
        .query_row(
            (
                builder.owner.as_i64(),
                builder.kind,
                builder.amount,
                &builder.category,
                builder.date,
                &builder.description,
                &tags_json,
                &builder.notes,
            ),
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Retrieve a transaction owned by `owner` from the database by its `id`.
///
/// # Errors
/// This function will return an:
/// - [Error::NotFound] if `id` does not refer to a transaction owned by
///   `owner`,
/// - [Error::SqlError] if there is some other SQL error.
pub fn get_transaction(
    id: TransactionId,
    owner: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "SELECT id, user_id, kind, amount, category, date, description, tags, notes
             FROM \"transaction\" WHERE id = :id AND user_id = :user_id",
        )?
        .query_row(
            &[(":id", &id), (":user_id", &owner.as_i64())],
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Apply a partial update to a transaction owned by `owner`.
///
/// # Errors
/// This function will return an:
/// - [Error::UpdateMissingTransaction] if `id` does not refer to a
///   transaction owned by `owner`,
/// - [Error::InvalidAmount] or [Error::EmptyField] if the updated fields
///   fail validation,
/// - [Error::SqlError] if there is some other SQL error.
pub fn update_transaction(
    id: TransactionId,
    owner: UserID,
    update: TransactionUpdate,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let existing = match get_transaction(id, owner, connection) {
        Ok(transaction) => transaction,
        Err(Error::NotFound) => return Err(Error::UpdateMissingTransaction),
        Err(error) => return Err(error),
    };

    let updated = TransactionBuilder {
        owner,
        kind: update.kind.unwrap_or(existing.kind),
        amount: update.amount.unwrap_or(existing.amount),
        category: update.category.unwrap_or(existing.category),
        date: update.date.unwrap_or(existing.date),
        description: update.description.unwrap_or(existing.description),
        tags: update.tags.unwrap_or(existing.tags),
        notes: update.notes.or(existing.notes),
    };
    updated.validate()?;

    let tags_json = serde_json::to_string(&updated.tags)
        .map_err(|error| Error::JSONSerializationError(error.to_string()))?;

    let transaction = connection
        .prepare(
            "UPDATE \"transaction\"
             SET kind = ?1, amount = ?2, category = ?3, date = ?4, description = ?5,
                 tags = ?6, notes = ?7
             WHERE id = ?8 AND user_id = ?9
             RETURNING id, user_id, kind, amount, category, date, description, tags, notes",
        )?
        .query_row(
            (
                updated.kind,
                updated.amount,
                &updated.category,
                updated.date,
                &updated.description,
                &tags_json,
                &updated.notes,
                id,
                owner.as_i64(),
            ),
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Delete a transaction owned by `owner` from the database.
///
/// # Errors
/// This function will return an:
/// - [Error::DeleteMissingTransaction] if `id` does not refer to a
///   transaction owned by `owner`,
/// - [Error::SqlError] if there is some other SQL error.
pub fn delete_transaction(
    id: TransactionId,
    owner: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2",
        (id, owner.as_i64()),
    )?;

    if rows_affected == 0 {
        Err(Error::DeleteMissingTransaction)
    } else {
        Ok(())
    }
}

/// Map a database row to a Transaction.
pub(crate) fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let id = row.get(0)?;
    let owner = UserID::new(row.get(1)?);
    let kind = row.get(2)?;
    let amount = row.get(3)?;
    let category = row.get(4)?;
    let date = row.get(5)?;
    let description = row.get(6)?;
    let tags_json: String = row.get(7)?;
    let notes = row.get(8)?;

    let tags = serde_json::from_str(&tags_json).unwrap_or_default();

    Ok(Transaction {
        id,
        owner,
        kind,
        amount,
        category,
        date,
        description,
        tags,
        notes,
    })
}

#[cfg(test)]
mod database_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        Error,
        db::initialize,
        transaction::{
            Transaction, TransactionKind, TransactionUpdate, create_transaction,
            delete_transaction, get_transaction, update_transaction,
        },
    };

    use super::test_utils::insert_test_user;

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    #[test]
    fn create_succeeds() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn);
        let amount = 12.3;

        let result = create_transaction(
            Transaction::build(
                owner,
                TransactionKind::Expense,
                amount,
                "food",
                date!(2025 - 10 - 05),
                "lunch",
            ),
            &conn,
        );

        match result {
            Ok(transaction) => {
                assert_eq!(transaction.amount, amount);
                assert_eq!(transaction.owner, owner);
                assert_eq!(transaction.kind, TransactionKind::Expense);
            }
            Err(error) => panic!("Unexpected error: {error}"),
        }
    }

    #[test]
    fn create_fails_on_negative_amount() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn);

        let result = create_transaction(
            Transaction::build(
                owner,
                TransactionKind::Expense,
                -1.0,
                "food",
                date!(2025 - 10 - 05),
                "lunch",
            ),
            &conn,
        );

        assert_eq!(result, Err(Error::InvalidAmount(-1.0)));
    }

    #[test]
    fn create_fails_on_empty_description() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn);

        let result = create_transaction(
            Transaction::build(
                owner,
                TransactionKind::Expense,
                1.0,
                "food",
                date!(2025 - 10 - 05),
                "  ",
            ),
            &conn,
        );

        assert_eq!(result, Err(Error::EmptyField("description")));
    }

    #[test]
    fn create_fails_on_empty_category() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn);

        let result = create_transaction(
            Transaction::build(
                owner,
                TransactionKind::Expense,
                1.0,
                "",
                date!(2025 - 10 - 05),
                "lunch",
            ),
            &conn,
        );

        assert_eq!(result, Err(Error::EmptyField("category")));
    }

    #[test]
    fn create_round_trips_tags_and_notes() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn);

        let created = create_transaction(
            Transaction::build(
                owner,
                TransactionKind::Expense,
                42.0,
                "food",
                date!(2025 - 10 - 05),
                "groceries",
            )
            .tags(vec!["weekly".to_owned(), "shared".to_owned()])
            .notes(Some("split with flatmate".to_owned())),
            &conn,
        )
        .unwrap();

        let fetched = get_transaction(created.id, owner, &conn).unwrap();

        assert_eq!(fetched, created);
        assert_eq!(fetched.tags, vec!["weekly", "shared"]);
        assert_eq!(fetched.notes.as_deref(), Some("split with flatmate"));
    }

    #[test]
    fn get_fails_for_other_users_transaction() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn);
        let other_user = insert_test_user(&conn);

        let created = create_transaction(
            Transaction::build(
                owner,
                TransactionKind::Income,
                100.0,
                "salary",
                date!(2025 - 10 - 05),
                "pay day",
            ),
            &conn,
        )
        .unwrap();

        let result = get_transaction(created.id, other_user, &conn);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn update_changes_only_specified_fields() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn);
        let created = create_transaction(
            Transaction::build(
                owner,
                TransactionKind::Expense,
                10.0,
                "food",
                date!(2025 - 10 - 05),
                "lunch",
            ),
            &conn,
        )
        .unwrap();

        let updated = update_transaction(
            created.id,
            owner,
            TransactionUpdate {
                amount: Some(12.5),
                ..Default::default()
            },
            &conn,
        )
        .unwrap();

        assert_eq!(updated.amount, 12.5);
        assert_eq!(updated.category, created.category);
        assert_eq!(updated.description, created.description);
        assert_eq!(updated.date, created.date);
    }

    #[test]
    fn update_fails_on_missing_transaction() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn);

        let result = update_transaction(999, owner, TransactionUpdate::default(), &conn);

        assert_eq!(result, Err(Error::UpdateMissingTransaction));
    }

    #[test]
    fn update_rejects_invalid_amount() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn);
        let created = create_transaction(
            Transaction::build(
                owner,
                TransactionKind::Expense,
                10.0,
                "food",
                date!(2025 - 10 - 05),
                "lunch",
            ),
            &conn,
        )
        .unwrap();

        let result = update_transaction(
            created.id,
            owner,
            TransactionUpdate {
                amount: Some(-3.0),
                ..Default::default()
            },
            &conn,
        );

        assert_eq!(result, Err(Error::InvalidAmount(-3.0)));
    }

    #[test]
    fn delete_removes_transaction() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn);
        let created = create_transaction(
            Transaction::build(
                owner,
                TransactionKind::Expense,
                10.0,
                "food",
                date!(2025 - 10 - 05),
                "lunch",
            ),
            &conn,
        )
        .unwrap();

        delete_transaction(created.id, owner, &conn).unwrap();

        assert_eq!(
            get_transaction(created.id, owner, &conn),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn delete_fails_for_other_users_transaction() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn);
        let other_user = insert_test_user(&conn);
        let created = create_transaction(
            Transaction::build(
                owner,
                TransactionKind::Expense,
                10.0,
                "food",
                date!(2025 - 10 - 05),
                "lunch",
            ),
            &conn,
        )
        .unwrap();

        let result = delete_transaction(created.id, other_user, &conn);

        assert_eq!(result, Err(Error::DeleteMissingTransaction));
    }

    #[test]
    fn kind_serializes_to_lowercase() {
        assert_eq!(
            serde_json::to_string(&TransactionKind::Income).unwrap(),
            "\"income\""
        );
        assert_eq!(
            serde_json::to_string(&TransactionKind::Expense).unwrap(),
            "\"expense\""
        );
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use rusqlite::Connection;

    use crate::{Email, PasswordHash, user::{UserID, create_user}};

    /// Insert a user with a unique email and return its ID.
    pub(crate) fn insert_test_user(connection: &Connection) -> UserID {
        let count: i64 = connection
            .query_row("SELECT COUNT(id) FROM user", [], |row| row.get(0))
            .unwrap();
        let email = Email::new_unchecked(&format!("user{}@example.com", count + 1));

        create_user(email, PasswordHash::new_unchecked("hunter2"), connection)
            .expect("Could not create test user")
            .id
    }
}
