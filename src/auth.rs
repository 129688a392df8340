//! Token-based authentication: signing keys, JWT claims, the extractor that
//! guards protected routes, and the sign-in and registration handlers.

use axum::{
    Json, RequestPartsExt,
    extract::{FromRef, FromRequestParts, State},
    http::{StatusCode, request::Parts},
    response::IntoResponse,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{
    AppState, Email, Error, PasswordHash, User,
    user::{UserID, create_user, get_user_by_email},
};

/// How long a signed token stays valid.
const TOKEN_DURATION: Duration = Duration::hours(24);

/// The keys used for signing and verifying auth tokens.
///
/// Both keys are derived from the same secret; the split mirrors the
/// encode/decode split in the `jsonwebtoken` API.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    /// Derive the signing keys from a secret string.
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys").finish_non_exhaustive()
    }
}

/// The contents of a JSON Web Token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// The ID of the authenticated user. Every ledger query the request
    /// triggers is scoped to this user.
    pub user_id: UserID,
    /// The expiry time of the token as a unix timestamp.
    pub exp: i64,
    /// The time the token was issued as a unix timestamp.
    pub iat: i64,
}

impl<S> FromRequestParts<S> for Claims
where
    JwtKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| Error::InvalidToken)?;

        let keys = JwtKeys::from_ref(state);

        decode_token(bearer.token(), &keys)
    }
}

/// Sign a token for `user_id`.
///
/// # Errors
/// Returns an [Error::TokenCreation] if signing fails.
pub fn encode_token(user_id: UserID, keys: &JwtKeys) -> Result<String, Error> {
    let now = OffsetDateTime::now_utc();
    let claims = Claims {
        user_id,
        exp: (now + TOKEN_DURATION).unix_timestamp(),
        iat: now.unix_timestamp(),
    };

    encode(&Header::default(), &claims, &keys.encoding).map_err(|error| {
        tracing::error!("could not sign auth token: {error}");
        Error::TokenCreation
    })
}

/// Decode and validate a token, returning its claims.
///
/// Also used by the event-stream route, where the token arrives as a query
/// parameter because `EventSource` cannot set request headers.
///
/// # Errors
/// Returns an [Error::InvalidToken] if the token is malformed, has a bad
/// signature, or has expired.
pub fn decode_token(token: &str, keys: &JwtKeys) -> Result<Claims, Error> {
    decode::<Claims>(token, &keys.decoding, &Validation::default())
        .map(|token_data| token_data.claims)
        .map_err(|_| Error::InvalidToken)
}

/// The credentials sent to the sign-in route.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    /// Email entered during sign-in.
    pub email: String,
    /// Password entered during sign-in.
    pub password: String,
}

/// The public view of a user returned by the auth routes.
#[derive(Debug, Serialize)]
pub(crate) struct UserInfo {
    id: UserID,
    email: Email,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
        }
    }
}

/// The response body for a successful sign-in.
#[derive(Debug, Serialize)]
pub(crate) struct SignInResponse {
    token: String,
    user: UserInfo,
}

/// Handler for sign-in requests.
///
/// # Errors
/// Returns an [Error::InvalidCredentials] if the email does not belong to a
/// registered user or the password does not match. The two cases are
/// deliberately indistinguishable to the client.
pub async fn sign_in(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<SignInResponse>, Error> {
    let email = Email::new(&credentials.email).map_err(|_| Error::InvalidCredentials)?;

    let user = {
        let connection = state.lock_db()?;

        get_user_by_email(&email, &connection).map_err(|error| match error {
            Error::NotFound => Error::InvalidCredentials,
            other => other,
        })?
    };

    let password_is_correct = user
        .password_hash
        .verify(&credentials.password)
        .map_err(|error| {
            tracing::error!("error verifying password: {error}");
            Error::HashingError(error.to_string())
        })?;

    if !password_is_correct {
        return Err(Error::InvalidCredentials);
    }

    let token = encode_token(user.id, &state.jwt_keys)?;

    Ok(Json(SignInResponse {
        token,
        user: user.into(),
    }))
}

/// The form sent to the registration route.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    /// The email address to register with.
    pub email: String,
    /// The password to protect the account with.
    pub password: String,
}

/// Handler for registering a new user.
///
/// # Errors
/// Returns an:
/// - [Error::InvalidEmail] if the email is malformed,
/// - [Error::TooWeak] if the password fails the strength check,
/// - [Error::DuplicateEmail] if the email is already registered.
pub async fn register_user(
    State(state): State<AppState>,
    Json(form): Json<RegisterForm>,
) -> Result<impl IntoResponse, Error> {
    let email = Email::new(&form.email)?;
    let password_hash = PasswordHash::from_raw_password(&form.password, PasswordHash::DEFAULT_COST)?;

    let connection = state.lock_db()?;
    let user = create_user(email, password_hash, &connection)?;

    Ok((StatusCode::CREATED, Json(UserInfo::from(user))))
}

#[cfg(test)]
mod token_tests {
    use crate::user::UserID;

    use super::{Error, JwtKeys, decode_token, encode_token};

    #[test]
    fn round_trip_preserves_user_id() {
        let keys = JwtKeys::new("foobar");
        let user_id = UserID::new(42);

        let token = encode_token(user_id, &keys).unwrap();
        let claims = decode_token(&token, &keys).unwrap();

        assert_eq!(claims.user_id, user_id);
    }

    #[test]
    fn decode_fails_with_wrong_secret() {
        let token = encode_token(UserID::new(1), &JwtKeys::new("foobar")).unwrap();

        let result = decode_token(&token, &JwtKeys::new("bazqux"));

        assert_eq!(result.unwrap_err(), Error::InvalidToken);
    }

    #[test]
    fn decode_fails_on_garbage() {
        let keys = JwtKeys::new("foobar");

        let result = decode_token("not-a-token", &keys);

        assert_eq!(result.unwrap_err(), Error::InvalidToken);
    }
}

#[cfg(test)]
mod auth_route_tests {
    use axum::{
        Json, Router,
        http::StatusCode,
        routing::{get, post},
    };
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::json;
    use tempfile::tempdir;

    use crate::{AppState, pagination::PaginationConfig};

    use super::{Claims, register_user, sign_in};

    async fn protected_route(claims: Claims) -> Json<serde_json::Value> {
        Json(json!({ "userId": claims.user_id }))
    }

    fn get_test_server() -> TestServer {
        let upload_dir = tempdir().unwrap().keep();
        let state = AppState::new(
            Connection::open_in_memory().unwrap(),
            "nafstenoas",
            upload_dir,
            PaginationConfig::default(),
        )
        .unwrap();

        let app = Router::new()
            .route("/api/users", post(register_user))
            .route("/api/sign_in", post(sign_in))
            .route("/protected", get(protected_route))
            .with_state(state);

        TestServer::new(app)
    }

    const TEST_EMAIL: &str = "foo@bar.baz";
    const TEST_PASSWORD: &str = "averysafeandsecurepassword";

    #[tokio::test]
    async fn register_then_sign_in_succeeds() {
        let server = get_test_server();

        server
            .post("/api/users")
            .json(&json!({ "email": TEST_EMAIL, "password": TEST_PASSWORD }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .post("/api/sign_in")
            .json(&json!({ "email": TEST_EMAIL, "password": TEST_PASSWORD }))
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert!(body["token"].is_string());
        assert_eq!(body["user"]["email"], TEST_EMAIL);
    }

    #[tokio::test]
    async fn register_fails_on_weak_password() {
        let server = get_test_server();

        server
            .post("/api/users")
            .json(&json!({ "email": TEST_EMAIL, "password": "hunter2" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn register_fails_on_invalid_email() {
        let server = get_test_server();

        server
            .post("/api/users")
            .json(&json!({ "email": "not-an-email", "password": TEST_PASSWORD }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn register_fails_on_duplicate_email() {
        let server = get_test_server();

        server
            .post("/api/users")
            .json(&json!({ "email": TEST_EMAIL, "password": TEST_PASSWORD }))
            .await
            .assert_status(StatusCode::CREATED);

        server
            .post("/api/users")
            .json(&json!({ "email": TEST_EMAIL, "password": TEST_PASSWORD }))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn sign_in_fails_with_wrong_password() {
        let server = get_test_server();

        server
            .post("/api/users")
            .json(&json!({ "email": TEST_EMAIL, "password": TEST_PASSWORD }))
            .await
            .assert_status(StatusCode::CREATED);

        server
            .post("/api/sign_in")
            .json(&json!({ "email": TEST_EMAIL, "password": "definitelyNotTheCorrectPassword" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn sign_in_fails_with_unknown_email() {
        let server = get_test_server();

        server
            .post("/api/sign_in")
            .json(&json!({ "email": "wrongemail@gmail.com", "password": TEST_PASSWORD }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn protected_route_accepts_valid_token() {
        let server = get_test_server();

        server
            .post("/api/users")
            .json(&json!({ "email": TEST_EMAIL, "password": TEST_PASSWORD }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .post("/api/sign_in")
            .json(&json!({ "email": TEST_EMAIL, "password": TEST_PASSWORD }))
            .await;
        let token = response.json::<serde_json::Value>()["token"]
            .as_str()
            .unwrap()
            .to_owned();

        server
            .get("/protected")
            .authorization_bearer(token)
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn protected_route_rejects_missing_header() {
        let server = get_test_server();

        server
            .get("/protected")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn protected_route_rejects_garbage_token() {
        let server = get_test_server();

        server
            .get("/protected")
            .authorization_bearer("FOOBAR")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}
