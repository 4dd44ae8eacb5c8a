//! Error responses.
//!
//! Every failure leaves the API as `{"error": <message or field map>, "code": <kind>}`.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::error;

use crate::auth::{PermissionError, TokenError};
use crate::validator::ValidationErrors;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid or missing authentication token")]
    InvalidCredentialFormat,
    #[error("invalid authentication token")]
    InvalidCredential,
    #[error("you must be authenticated to access this resource")]
    AuthenticationRequired,
    #[error("your user account must be activated to access this resource")]
    AccountNotActivated,
    #[error("your user account doesn't have the necessary permissions to access this resource")]
    Forbidden,
    #[error("Too many requests. Please try again in a moment")]
    TooManyRequests,
    #[error("The server encountered a problem and could not process your request")]
    Internal(#[source] anyhow::Error),
    #[error("validation failed")]
    ValidationFailed(ValidationErrors),
    #[error("{0}")]
    BadRequest(String),
    #[error("The requested resource could not be found")]
    NotFound,
    #[error("The method is not supported for this resource")]
    MethodNotAllowed,
    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,
    #[error("invalid credentials")]
    InvalidCredentials,
}

impl ApiError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentialFormat
            | Self::InvalidCredential
            | Self::AccountNotActivated
            | Self::InvalidCredentials
            | Self::Forbidden => StatusCode::FORBIDDEN,
            Self::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::EditConflict => StatusCode::CONFLICT,
        }
    }

    /// Machine-readable kind, stable across message changes.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentialFormat => "invalid_credential_format",
            Self::InvalidCredential => "invalid_credential",
            Self::AuthenticationRequired => "authentication_required",
            Self::AccountNotActivated => "account_not_activated",
            Self::Forbidden => "forbidden",
            Self::TooManyRequests => "too_many_requests",
            Self::Internal(_) => "internal_error",
            Self::ValidationFailed(_) => "validation_failed",
            Self::BadRequest(_) => "bad_request",
            Self::NotFound => "not_found",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::EditConflict => "edit_conflict",
            Self::InvalidCredentials => "invalid_credentials",
        }
    }

    const fn challenges(&self) -> bool {
        matches!(self, Self::InvalidCredentialFormat | Self::InvalidCredential)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(err) = &self {
            error!("internal error: {err:#}");
        }

        let message = match &self {
            Self::ValidationFailed(errors) => json!(errors),
            other => Value::String(other.to_string()),
        };
        let body = json!({ "error": message, "code": self.code() });

        let mut response = (self.status(), Json(body)).into_response();
        if self.challenges() {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::ValidationFailed(errors)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<PermissionError> for ApiError {
    fn from(err: PermissionError) -> Self {
        Self::Internal(err.into())
    }
}

impl From<TokenError> for ApiError {
    /// Mapping for the `authentication` scope; other flows translate
    /// `NotFound` and `Malformed` into field errors themselves.
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Malformed(_) => Self::InvalidCredentialFormat,
            TokenError::NotFound => Self::InvalidCredential,
            TokenError::Timeout(_) | TokenError::Backend(_) => Self::Internal(err.into()),
        }
    }
}
