//! Signup, activation and password reset.

use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;

use super::{token_field_error, JsonBody};
use crate::api::{ApiError, AppState};
use crate::auth::permissions::MOVIES_READ;
use crate::auth::tokens::validate_token_plaintext;
use crate::auth::user::{
    hash_password, validate_email, validate_name, validate_password_plaintext, NewUser,
};
use crate::auth::{Scope, User};
use crate::mail::{MailMessage, MailTemplate};
use crate::store::{InsertUserOutcome, UpdateOutcome};
use crate::validator::{ValidationErrors, Validator};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ActivateRequest {
    #[serde(default)]
    token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PasswordResetRequest {
    #[serde(default)]
    password: String,
    #[serde(default)]
    token: String,
}

async fn save_user(state: &AppState, user: &User) -> Result<User, ApiError> {
    match state.call(state.users.update_user(user)).await? {
        UpdateOutcome::Updated(user) => Ok(user),
        UpdateOutcome::Conflict => Err(ApiError::EditConflict),
    }
}

#[utoipa::path(
    post,
    path = "/v1/users",
    request_body = RegisterRequest,
    responses(
        (status = 202, description = "User created, activation mail queued", body = User),
        (status = 422, description = "Validation failed")
    ),
    tag = "users"
)]
pub async fn register_user(
    Extension(state): Extension<Arc<AppState>>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut v = Validator::new();
    validate_name(&mut v, &request.name);
    validate_email(&mut v, &request.email);
    validate_password_plaintext(&mut v, &request.password);
    v.finish()?;

    let password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|err| ApiError::Internal(err.into()))??;

    let new_user = NewUser {
        name: request.name,
        email: request.email,
        password_hash,
        activated: false,
    };
    let user = match state.call(state.users.insert_user(&new_user)).await? {
        InsertUserOutcome::Created(user) => user,
        InsertUserOutcome::DuplicateEmail => {
            return Err(ValidationErrors::single(
                "email",
                "a user with this email address already exists",
            )
            .into())
        }
    };

    state.permissions.grant(user.id, &[MOVIES_READ]).await?;

    let token = state
        .tokens
        .issue(user.id, state.ttls.activation, Scope::Activation)
        .await
        .map_err(|err| ApiError::Internal(err.into()))?;

    state.mail.dispatch(MailMessage {
        to: user.email.clone(),
        template: MailTemplate::UserWelcome,
        data: json!({
            "activationToken": token.plaintext.expose_secret(),
            "userID": user.id,
        }),
    });

    info!(user_id = user.id, "user registered");
    Ok((StatusCode::ACCEPTED, Json(json!({ "user": user }))))
}

#[utoipa::path(
    put,
    path = "/v1/users/activated",
    request_body = ActivateRequest,
    responses(
        (status = 200, description = "User activated", body = User),
        (status = 409, description = "Edit conflict"),
        (status = 422, description = "Invalid or expired activation token")
    ),
    tag = "users"
)]
pub async fn activate_user(
    Extension(state): Extension<Arc<AppState>>,
    JsonBody(request): JsonBody<ActivateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut v = Validator::new();
    validate_token_plaintext(&mut v, &request.token);
    v.finish()?;

    let mut user = state
        .tokens
        .resolve(Scope::Activation, &request.token)
        .await
        .map_err(|err| token_field_error(err, "invalid or expired activation token"))?;

    user.activated = true;
    let user = save_user(&state, &user).await?;

    state
        .tokens
        .revoke_all(Scope::Activation, user.id)
        .await
        .map_err(|err| ApiError::Internal(err.into()))?;

    info!(user_id = user.id, "user activated");
    Ok(Json(json!({ "user": user })))
}

#[utoipa::path(
    put,
    path = "/v1/users/password",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Password updated"),
        (status = 409, description = "Edit conflict"),
        (status = 422, description = "Invalid or expired password reset token")
    ),
    tag = "users"
)]
pub async fn update_user_password(
    Extension(state): Extension<Arc<AppState>>,
    JsonBody(request): JsonBody<PasswordResetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut v = Validator::new();
    validate_password_plaintext(&mut v, &request.password);
    validate_token_plaintext(&mut v, &request.token);
    v.finish()?;

    let mut user = state
        .tokens
        .resolve(Scope::PasswordReset, &request.token)
        .await
        .map_err(|err| token_field_error(err, "invalid or expired password reset token"))?;

    let password = request.password;
    user.password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|err| ApiError::Internal(err.into()))??;
    let user = save_user(&state, &user).await?;

    state
        .tokens
        .revoke_all(Scope::PasswordReset, user.id)
        .await
        .map_err(|err| ApiError::Internal(err.into()))?;

    info!(user_id = user.id, "password reset");
    Ok(Json(
        json!({ "message": "your password was successfully reset" }),
    ))
}
