//! Middleware for logging requests and responses.

use axum::{extract::Request, http::header::CONTENT_TYPE, middleware::Next, response::Response};

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If a body is longer than [LOG_BODY_LENGTH_LIMIT] bytes, it is truncated
/// and the full body is logged at the `debug` level. Password fields in
/// JSON request bodies are redacted before logging.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (headers, body_text) = extract_header_and_body_text_from_request(request).await;

    let is_json = headers
        .headers
        .get(CONTENT_TYPE)
        .and_then(|content_type| content_type.to_str().ok())
        .is_some_and(|content_type| content_type.starts_with("application/json"));

    if is_json {
        let display_text = redact_json_field(&body_text, "password");
        log_request(&headers, &display_text);
    } else {
        log_request(&headers, &body_text);
    }

    let request = Request::from_parts(headers, body_text.into());
    let response = next.run(request).await;

    let (headers, body_text) = extract_header_and_body_text_from_response(response).await;
    log_response(&headers, &body_text);

    Response::from_parts(headers, body_text.into())
}

/// Replace the value of a string field in a JSON body with asterisks.
fn redact_json_field(body_text: &str, field_name: &str) -> String {
    let needle = format!("\"{field_name}\"");

    let Some(field_start) = body_text.find(&needle) else {
        return body_text.to_string();
    };

    let after_field = &body_text[field_start + needle.len()..];
    let Some(colon_offset) = after_field.find(':') else {
        return body_text.to_string();
    };

    let after_colon = &after_field[colon_offset + 1..];
    let Some(quote_offset) = after_colon.find('"') else {
        return body_text.to_string();
    };

    let value_start = &after_colon[quote_offset + 1..];
    let Some(value_length) = value_start.find('"') else {
        return body_text.to_string();
    };

    let value = &value_start[..value_length];
    if value.is_empty() {
        return body_text.to_string();
    }

    body_text.replace(value, "********")
}

async fn extract_header_and_body_text_from_request(
    request: Request,
) -> (axum::http::request::Parts, String) {
    let (headers, body) = request.into_parts();
    let body_bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();

    (headers, String::from_utf8_lossy(&body_bytes).to_string())
}

async fn extract_header_and_body_text_from_response(
    response: Response,
) -> (axum::http::response::Parts, String) {
    let (headers, body) = response.into_parts();
    let body_bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();

    (headers, String::from_utf8_lossy(&body_bytes).to_string())
}

const LOG_BODY_LENGTH_LIMIT: usize = 64;

fn log_request(headers: &axum::http::request::Parts, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Received request: {headers:#?}\nbody: {:}...",
            &body[..LOG_BODY_LENGTH_LIMIT]
        );
        tracing::debug!("Full request body: {body:?}");
    } else {
        tracing::info!("Received request: {headers:#?}\nbody: {body:?}");
    }
}

fn log_response(headers: &axum::http::response::Parts, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Sending response: {headers:#?}\nbody: {:}...",
            &body[..LOG_BODY_LENGTH_LIMIT]
        );
        tracing::debug!("Full response body: {body:?}");
    } else {
        tracing::info!("Sending response: {headers:#?}\nbody: {body:?}");
    }
}

#[cfg(test)]
mod logging_tests {
    use super::redact_json_field;

    #[test]
    fn redacts_password_value() {
        let body = r#"{"email":"foo@bar.baz","password":"hunter2"}"#;

        let got = redact_json_field(body, "password");

        assert!(!got.contains("hunter2"));
        assert!(got.contains("********"));
        assert!(got.contains("foo@bar.baz"));
    }

    #[test]
    fn redacts_password_with_spacing() {
        let body = r#"{ "password" : "super secret phrase" }"#;

        let got = redact_json_field(body, "password");

        assert!(!got.contains("super secret phrase"));
    }

    #[test]
    fn leaves_bodies_without_password_untouched() {
        let body = r#"{"amount": 12.5}"#;

        assert_eq!(redact_json_field(body, "password"), body);
    }

    #[test]
    fn leaves_empty_password_untouched() {
        let body = r#"{"password":""}"#;

        assert_eq!(redact_json_field(body, "password"), body);
    }
}
