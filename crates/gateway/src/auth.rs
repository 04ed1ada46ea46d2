//! API-key guard for the message-sending route.

use {
    axum::{
        body::Body,
        extract::State,
        http::{Request, header},
        middleware::Next,
        response::{IntoResponse, Response},
    },
    secrecy::ExposeSecret,
    tracing::warn,
};

use crate::{error::ApiError, state::AppState};

/// Header carrying the raw API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Require a matching API key when one is configured.
///
/// The key may arrive raw in `X-API-Key` or as `Authorization: Bearer`.
/// Without a configured key every request passes through. A missing
/// credential is distinguished from a wrong one: 401 versus 403.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(ref expected) = state.api_key else {
        return next.run(request).await;
    };

    let presented = presented_key(&request).map(str::to_owned);
    match presented.as_deref() {
        Some(key) if constant_time_eq(key, expected.expose_secret()) => next.run(request).await,
        Some(_) => {
            warn!("guarded route called with a wrong api key");
            ApiError::InvalidCredential.into_response()
        },
        None => {
            warn!("guarded route called without an api key");
            ApiError::MissingCredential.into_response()
        },
    }
}

/// Pull the credential out of `X-API-Key` or `Authorization: Bearer`.
fn presented_key(request: &Request<Body>) -> Option<&str> {
    if let Some(value) = request.headers().get(API_KEY_HEADER)
        && let Ok(key) = value.to_str()
    {
        return Some(key);
    }

    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Constant-time string comparison.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_header(name: &str, value: &str) -> Request<Body> {
        Request::builder()
            .uri("/send-message")
            .header(name, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn raw_header_wins_over_bearer() {
        let request = Request::builder()
            .uri("/send-message")
            .header(API_KEY_HEADER, "raw-key")
            .header("authorization", "Bearer bearer-key")
            .body(Body::empty())
            .unwrap();
        assert_eq!(presented_key(&request), Some("raw-key"));
    }

    #[test]
    fn bearer_prefix_is_stripped() {
        let request = request_with_header("authorization", "Bearer sk-123");
        assert_eq!(presented_key(&request), Some("sk-123"));
    }

    #[test]
    fn non_bearer_authorization_is_ignored() {
        let request = request_with_header("authorization", "Basic dXNlcg==");
        assert_eq!(presented_key(&request), None);
    }

    #[test]
    fn bare_request_presents_nothing() {
        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(presented_key(&request), None);
    }

    #[test]
    fn comparison_rejects_prefixes_and_case() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
        assert!(!constant_time_eq("ABC", "abc"));
        assert!(!constant_time_eq("", "a"));
    }
}
