//! Resolves the bearer token into a [`Principal`].

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::api::error::ApiError;
use crate::auth::{Principal, Scope, TokenStore};

/// Bearer credential as presented in the `Authorization` header.
#[derive(Debug, PartialEq, Eq)]
pub enum Credential<'a> {
    Absent,
    Bearer(&'a str),
    Malformed,
}

/// Read the `Authorization` header. A missing or blank header is anonymous; anything other
/// than exactly `Bearer <token>` is malformed.
#[must_use]
pub fn extract_bearer(headers: &HeaderMap) -> Credential<'_> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Credential::Absent;
    };
    let Ok(value) = value.to_str() else {
        return Credential::Malformed;
    };
    if value.trim().is_empty() {
        return Credential::Absent;
    }
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Credential::Bearer(token),
        _ => Credential::Malformed,
    }
}

/// Attach exactly one principal to the request.
pub async fn authenticate(
    State(tokens): State<TokenStore>,
    mut request: Request,
    next: Next,
) -> Response {
    let principal = match resolve(&tokens, request.headers()).await {
        Ok(principal) => principal,
        Err(err) => return with_vary(err.into_response()),
    };

    if let Principal::Authenticated(user) = &principal {
        tracing::Span::current().record("user_id", user.id);
        debug!(user_id = user.id, "request authenticated");
    }
    request.extensions_mut().insert(principal);
    with_vary(next.run(request).await)
}

async fn resolve(tokens: &TokenStore, headers: &HeaderMap) -> Result<Principal, ApiError> {
    match extract_bearer(headers) {
        Credential::Absent => Ok(Principal::Anonymous),
        Credential::Malformed => Err(ApiError::InvalidCredentialFormat),
        Credential::Bearer(plaintext) => {
            let user = tokens.resolve(Scope::Authentication, plaintext).await?;
            Ok(Principal::Authenticated(user))
        }
    }
}

fn with_vary(mut response: Response) -> Response {
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}
