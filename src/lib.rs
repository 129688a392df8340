//! Fintrack is a personal finance assistant: a JSON REST API for recording
//! income and expenses, uploading receipts, and querying aggregated
//! analytics for a browser dashboard.
//!
//! The interesting part lives in [analytics::engine](crate::analytics::engine):
//! a family of pure functions that turn a user's raw transaction ledger into
//! category rankings, time-bucketed totals, income-vs-expense comparisons,
//! trend tables, and dashboard summaries. Everything else is plumbing that
//! feeds the engine or exposes its output over HTTP.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

pub mod analytics;
mod app_state;
mod auth;
mod db;
mod email;
mod endpoints;
mod events;
mod logging;
mod pagination;
mod password;
mod receipt;
mod routing;
pub mod transaction;
mod user;

pub use app_state::AppState;
pub use auth::{Claims, JwtKeys};
pub use db::initialize as initialize_db;
pub use email::Email;
pub use logging::logging_middleware;
pub use pagination::PaginationConfig;
pub use password::{PasswordHash, ValidatedPassword};
pub use routing::build_router;
pub use user::{User, UserID, get_user_by_id};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The user provided an email and password combination that does not
    /// match a registered user.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The request is missing the bearer token, or the token could not be
    /// decoded or has expired.
    #[error("invalid or missing auth token")]
    InvalidToken,

    /// An unexpected error occurred while signing a new auth token.
    #[error("could not create auth token")]
    TokenCreation,

    /// The user provided a password that is too easy to guess.
    ///
    /// The error string explains why and suggests improvements.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The string used to register a user is not a valid email address.
    #[error("{0} is not a valid email address")]
    InvalidEmail(String),

    /// The email used to register a user already belongs to an account.
    #[error("the email address is already registered")]
    DuplicateEmail,

    /// A required text field was empty or missing from a request body.
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// A transaction amount was negative or not a finite number.
    ///
    /// Amounts are validated here, at creation time, so that the aggregation
    /// engine never has to deal with malformed input.
    #[error("{0} is not a valid transaction amount")]
    InvalidAmount(f64),

    /// A query parameter failed validation, e.g. a start date after the end
    /// date or an unknown granularity.
    ///
    /// These are caller contract violations: the aggregation engine assumes
    /// validated parameters and is never invoked with them.
    #[error("invalid query parameter: {0}")]
    InvalidQuery(String),

    /// The requested resource was not found.
    ///
    /// The client should check that the parameters (e.g., ID) are correct
    /// and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// Tried to update a transaction that does not exist or belongs to
    /// another user.
    #[error("tried to update a transaction that is not in the database")]
    UpdateMissingTransaction,

    /// Tried to delete a transaction that does not exist or belongs to
    /// another user.
    #[error("tried to delete a transaction that is not in the database")]
    DeleteMissingTransaction,

    /// The multipart form could not be parsed as a receipt upload.
    #[error("could not parse multipart form: {0}")]
    MultipartError(String),

    /// The multipart form did not contain a receipt file.
    #[error("no file uploaded")]
    MissingFile,

    /// The uploaded receipt has a file type other than JPEG, PNG, or PDF.
    #[error("{0} is not a supported receipt file type")]
    UnsupportedFileType(String),

    /// The uploaded receipt exceeds the size limit.
    #[error("the uploaded file is too large")]
    FileTooLarge,

    /// An error occurred while reading or writing a receipt file.
    #[error("file I/O failed: {0}")]
    IoError(String),

    /// An error occurred while serializing a struct as JSON.
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("user.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    /// The HTTP status code the error maps to at the API boundary.
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidCredentials | Error::InvalidToken => StatusCode::UNAUTHORIZED,
            Error::DuplicateEmail => StatusCode::CONFLICT,
            Error::NotFound
            | Error::UpdateMissingTransaction
            | Error::DeleteMissingTransaction => StatusCode::NOT_FOUND,
            Error::FileTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Error::TooWeak(_)
            | Error::InvalidEmail(_)
            | Error::EmptyField(_)
            | Error::InvalidAmount(_)
            | Error::InvalidQuery(_)
            | Error::MultipartError(_)
            | Error::MissingFile
            | Error::UnsupportedFileType(_) => StatusCode::BAD_REQUEST,
            Error::TokenCreation
            | Error::HashingError(_)
            | Error::IoError(_)
            | Error::JSONSerializationError(_)
            | Error::DatabaseLockError
            | Error::SqlError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code = self.status_code();

        // Internal error details are for the server logs, not the client.
        let message = if status_code == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("An unexpected error occurred: {}", self);
            "internal server error".to_owned()
        } else {
            self.to_string()
        };

        (status_code, Json(json!({ "error": message }))).into_response()
    }
}
