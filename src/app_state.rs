//! Implements a struct that holds the state of the REST server.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard},
};

use axum::extract::FromRef;
use rusqlite::Connection;

use crate::{Error, auth::JwtKeys, db::initialize, pagination::PaginationConfig};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,

    /// The keys used for signing and verifying auth tokens.
    pub jwt_keys: JwtKeys,

    /// The directory uploaded receipt files are stored in.
    pub upload_dir: PathBuf,

    /// The config that controls how list endpoints page their data.
    pub pagination_config: PaginationConfig,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for
    /// the domain models. `secret` is used to derive the token signing keys
    /// and `upload_dir` is created if it does not exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized or the upload
    /// directory cannot be created.
    pub fn new(
        db_connection: Connection,
        secret: &str,
        upload_dir: PathBuf,
        pagination_config: PaginationConfig,
    ) -> Result<Self, Error> {
        initialize(&db_connection)?;

        std::fs::create_dir_all(&upload_dir)
            .map_err(|error| Error::IoError(error.to_string()))?;

        Ok(Self {
            db_connection: Arc::new(Mutex::new(db_connection)),
            jwt_keys: JwtKeys::new(secret),
            upload_dir,
            pagination_config,
        })
    }

    /// Acquire the database lock.
    ///
    /// # Errors
    /// Returns an [Error::DatabaseLockError] if the lock is poisoned.
    pub(crate) fn lock_db(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.db_connection
            .lock()
            .map_err(|error| {
                tracing::error!("could not acquire database lock: {error}");
                Error::DatabaseLockError
            })
    }
}

// this impl tells the `Claims` extractor how to access the keys from our state
impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt_keys.clone()
    }
}
