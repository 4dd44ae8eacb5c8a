pub mod health;
pub mod movies;
pub mod tokens;
pub mod users;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    Json,
};
use serde::de::DeserializeOwned;

use super::error::ApiError;
use crate::auth::TokenError;
use crate::validator::ValidationErrors;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1_048_576;

/// JSON body whose rejections render as API errors instead of plain text.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(request, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(&rejection)),
        }
    }
}

fn json_rejection(rejection: &JsonRejection) -> ApiError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::BadRequest(format!(
            "body must not be larger than {MAX_BODY_BYTES} bytes"
        ));
    }
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::BadRequest("body must be sent as application/json".to_string())
        }
        other => ApiError::BadRequest(other.body_text()),
    }
}

/// Token failures on the activation and password-reset flows are field errors, not auth errors.
pub(crate) fn token_field_error(err: TokenError, not_found: &str) -> ApiError {
    match err {
        TokenError::Malformed(errors) => ApiError::ValidationFailed(errors),
        TokenError::NotFound => {
            ApiError::ValidationFailed(ValidationErrors::single("token", not_found))
        }
        TokenError::Timeout(_) | TokenError::Backend(_) => ApiError::Internal(err.into()),
    }
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
