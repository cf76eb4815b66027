//! Token gate for the API.
//!
//! Tokens are issued by an external service; requests present them as
//! `Authorization: Token <t>` or `Authorization: Bearer <t>`.

use super::handlers::ApiError;
use super::AppState;
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

/// Reject requests without an accepted token. A gate with no tokens is open.
pub async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if state.tokens.is_empty() {
        return next.run(request).await;
    }

    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_authorization)
        .is_some_and(|token| state.tokens.contains(token));

    if authorized {
        return next.run(request).await;
    }

    warn!(
        "Rejected unauthenticated {} {}",
        request.method(),
        request.uri().path()
    );
    ApiError::unauthorized().into_response()
}

/// Extract the token from an `Authorization` header value.
fn parse_authorization(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();

    let known_scheme = scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer");
    (known_scheme && !token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_authorization() {
        assert_eq!(parse_authorization("Token abc"), Some("abc"));
        assert_eq!(parse_authorization("Bearer  xyz "), Some("xyz"));
        assert_eq!(parse_authorization("bearer xyz"), Some("xyz"));
        assert_eq!(parse_authorization("Basic dXNlcjpwdw=="), None);
        assert_eq!(parse_authorization("Token"), None);
        assert_eq!(parse_authorization("Token   "), None);
    }
}
