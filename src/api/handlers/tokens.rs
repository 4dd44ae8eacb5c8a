use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;

use super::JsonBody;
use crate::api::{ApiError, AppState};
use crate::auth::user::{password_matches, validate_email, validate_password_plaintext};
use crate::auth::{Scope, User};
use crate::mail::{MailMessage, MailTemplate};
use crate::validator::{ValidationErrors, Validator};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CredentialsRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct EmailRequest {
    #[serde(default)]
    email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IssuedToken {
    token: String,
    expiry: DateTime<Utc>,
}

async fn user_for_email(state: &AppState, email: &str) -> Result<Option<User>, ApiError> {
    let mut v = Validator::new();
    validate_email(&mut v, email);
    v.finish()?;
    state.call(state.users.find_user_by_email(email)).await
}

#[utoipa::path(
    post,
    path = "/v1/tokens/authentication",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "Authentication token issued", body = IssuedToken),
        (status = 403, description = "Invalid credentials"),
        (status = 422, description = "Validation failed")
    ),
    tag = "tokens"
)]
pub async fn create_authentication_token(
    Extension(state): Extension<Arc<AppState>>,
    JsonBody(request): JsonBody<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut v = Validator::new();
    validate_email(&mut v, &request.email);
    validate_password_plaintext(&mut v, &request.password);
    v.finish()?;

    let user = state
        .call(state.users.find_user_by_email(&request.email))
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    let stored_hash = user.password_hash.clone();
    let password = request.password;
    let matches = tokio::task::spawn_blocking(move || password_matches(&password, &stored_hash))
        .await
        .map_err(|err| ApiError::Internal(err.into()))??;
    if !matches {
        info!(user_id = user.id, "login rejected");
        return Err(ApiError::InvalidCredentials);
    }

    let token = state
        .tokens
        .issue(user.id, state.ttls.authentication, Scope::Authentication)
        .await
        .map_err(|err| ApiError::Internal(err.into()))?;

    let issued = IssuedToken {
        token: token.plaintext.expose_secret().to_string(),
        expiry: token.expiry,
    };
    Ok((
        StatusCode::CREATED,
        Json(json!({ "authentication_token": issued })),
    ))
}

#[utoipa::path(
    post,
    path = "/v1/tokens/password-reset",
    request_body = EmailRequest,
    responses(
        (status = 202, description = "Password reset mail queued"),
        (status = 422, description = "Unknown or unactivated account")
    ),
    tag = "tokens"
)]
pub async fn create_password_reset_token(
    Extension(state): Extension<Arc<AppState>>,
    JsonBody(request): JsonBody<EmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = user_for_email(&state, &request.email)
        .await?
        .ok_or_else(|| ValidationErrors::single("email", "no matching email address found"))?;
    if !user.activated {
        return Err(ValidationErrors::single("email", "user account must be activated").into());
    }

    let token = state
        .tokens
        .issue(user.id, state.ttls.password_reset, Scope::PasswordReset)
        .await
        .map_err(|err| ApiError::Internal(err.into()))?;

    state.mail.dispatch(MailMessage {
        to: user.email.clone(),
        template: MailTemplate::TokenPasswordReset,
        data: json!({ "passwordResetToken": token.plaintext.expose_secret() }),
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "an email will be sent to you containing password reset instructions"
        })),
    ))
}

#[utoipa::path(
    post,
    path = "/v1/tokens/activation",
    request_body = EmailRequest,
    responses(
        (status = 202, description = "Activation mail queued"),
        (status = 422, description = "Unknown or already activated account")
    ),
    tag = "tokens"
)]
pub async fn create_activation_token(
    Extension(state): Extension<Arc<AppState>>,
    JsonBody(request): JsonBody<EmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = user_for_email(&state, &request.email)
        .await?
        .ok_or_else(|| ValidationErrors::single("email", "no matching email address found"))?;
    if user.activated {
        return Err(ValidationErrors::single("email", "user has already been activated").into());
    }

    let token = state
        .tokens
        .issue(user.id, state.ttls.activation, Scope::Activation)
        .await
        .map_err(|err| ApiError::Internal(err.into()))?;

    state.mail.dispatch(MailMessage {
        to: user.email.clone(),
        template: MailTemplate::TokenActivation,
        data: json!({ "activationToken": token.plaintext.expose_secret() }),
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "an email will be sent to you containing activation instructions"
        })),
    ))
}
