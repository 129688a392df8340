//! The live dashboard event stream.
//!
//! A long-lived `text/event-stream` response that re-emits a fixed-interval
//! poll of the user's latest activity. There is no event-driven machinery
//! behind it and no ordering or backpressure guarantee: every ten seconds
//! the current state of the ledger is read and pushed, whether or not
//! anything changed.

use std::{convert::Infallible, time::Duration};

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt, stream};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{
    AppState, Error,
    auth::decode_token,
    transaction::{Transaction, count_transactions_for_user, get_recent_transactions},
    user::UserID,
};

/// How often the ledger is polled and an update pushed.
const UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// How many recent transactions each update carries.
const LATEST_TRANSACTION_COUNT: u64 = 5;

/// Query parameters for the event stream route.
///
/// The auth token travels as a query parameter here because the browser's
/// `EventSource` API cannot set request headers.
#[derive(Debug, Deserialize)]
pub struct EventStreamQuery {
    /// The bearer token that would otherwise be in the Authorization header.
    pub token: String,
}

/// The payload pushed on every poll.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdatePayload {
    event: &'static str,
    latest_transactions: Vec<Transaction>,
    transaction_count: u64,
    timestamp: String,
}

/// Open the event stream for the user identified by the query token.
///
/// Emits a `connected` event, an immediate first update, and then one
/// update every ten seconds until the client disconnects.
pub async fn get_event_stream(
    State(state): State<AppState>,
    Query(params): Query<EventStreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, Error> {
    let claims = decode_token(&params.token, &state.jwt_keys)?;
    let user_id = claims.user_id;

    tracing::debug!("event stream established for user {user_id}");

    let connected = stream::once(async {
        Ok::<Event, Infallible>(Event::default().data(
            json!({ "event": "connected", "message": "event stream established" }).to_string(),
        ))
    });

    let updates = stream::unfold(
        (state, tokio::time::interval(UPDATE_INTERVAL)),
        move |(state, mut interval)| async move {
            interval.tick().await;

            let event = match build_update(user_id, &state) {
                Ok(payload) => match serde_json::to_string(&payload) {
                    Ok(data) => Event::default().data(data),
                    Err(error) => error_event(&error.to_string()),
                },
                Err(error) => error_event(&error.to_string()),
            };

            Some((Ok(event), (state, interval)))
        },
    );

    Ok(Sse::new(connected.chain(updates)).keep_alive(KeepAlive::default()))
}

/// Poll the ledger for the data carried by one update event.
fn build_update(user_id: UserID, state: &AppState) -> Result<UpdatePayload, Error> {
    let connection = state.lock_db()?;

    let latest_transactions =
        get_recent_transactions(user_id, LATEST_TRANSACTION_COUNT, &connection)?;
    let transaction_count = count_transactions_for_user(user_id, &connection)?;

    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|error| Error::JSONSerializationError(error.to_string()))?;

    Ok(UpdatePayload {
        event: "update",
        latest_transactions,
        transaction_count,
        timestamp,
    })
}

fn error_event(message: &str) -> Event {
    Event::default().data(json!({ "event": "error", "message": message }).to_string())
}

#[cfg(test)]
mod event_stream_tests {
    use axum::{Router, http::StatusCode, routing::get};
    use axum_test::TestServer;
    use rusqlite::Connection;
    use tempfile::tempdir;
    use time::macros::date;

    use crate::{
        AppState,
        pagination::PaginationConfig,
        transaction::{Transaction, TransactionKind, create_transaction, insert_test_user},
    };

    use super::{build_update, get_event_stream};

    fn get_test_state() -> AppState {
        let upload_dir = tempdir().unwrap().keep();

        AppState::new(
            Connection::open_in_memory().unwrap(),
            "nafstenoas",
            upload_dir,
            PaginationConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn update_carries_recent_transactions_and_count() {
        let state = get_test_state();
        let user_id = {
            let connection = state.lock_db().unwrap();
            let user_id = insert_test_user(&connection);

            for i in 0..7 {
                create_transaction(
                    Transaction::build(
                        user_id,
                        TransactionKind::Expense,
                        (i + 1) as f64,
                        "food",
                        date!(2024 - 01 - 01) + time::Duration::days(i),
                        &format!("transaction #{i}"),
                    ),
                    &connection,
                )
                .unwrap();
            }

            user_id
        };

        let payload = build_update(user_id, &state).unwrap();

        assert_eq!(payload.event, "update");
        assert_eq!(payload.transaction_count, 7);
        assert_eq!(payload.latest_transactions.len(), 5);
        // Newest first.
        assert_eq!(payload.latest_transactions[0].date, date!(2024 - 01 - 07));
    }

    #[test]
    fn update_is_empty_for_fresh_user() {
        let state = get_test_state();
        let user_id = {
            let connection = state.lock_db().unwrap();
            insert_test_user(&connection)
        };

        let payload = build_update(user_id, &state).unwrap();

        assert_eq!(payload.transaction_count, 0);
        assert!(payload.latest_transactions.is_empty());
    }

    #[tokio::test]
    async fn stream_rejects_missing_token() {
        let state = get_test_state();
        let app = Router::new()
            .route("/api/events", get(get_event_stream))
            .with_state(state);
        let server = TestServer::new(app);

        server
            .get("/api/events")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn stream_rejects_invalid_token() {
        let state = get_test_state();
        let app = Router::new()
            .route("/api/events", get(get_event_stream))
            .with_state(state);
        let server = TestServer::new(app);

        server
            .get("/api/events")
            .add_query_param("token", "garbage")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}
