//! Functions for creating the application database schema.

use rusqlite::Connection;

use crate::{transaction::create_transaction_table, user::create_user_table};

/// Create the tables for the application's domain models.
///
/// This function is idempotent: tables that already exist are left alone.
///
/// # Errors
/// Returns an error if a table cannot be created or if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute("PRAGMA foreign_keys = ON;", ())?;

    create_user_table(connection)?;
    create_transaction_table(connection)?;

    Ok(())
}
