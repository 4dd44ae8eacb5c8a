use axum::Json;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use super::handlers::{health, movies, tokens, users};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck,
        movies::list_movies,
        movies::create_movie,
        movies::show_movie,
        movies::update_movie,
        movies::delete_movie,
        users::register_user,
        users::activate_user,
        users::update_user_password,
        tokens::create_authentication_token,
        tokens::create_password_reset_token,
        tokens::create_activation_token,
    ),
    components(schemas(
        health::Health,
        health::SystemInfo,
        crate::movies::Movie,
        crate::movies::MovieInput,
        crate::movies::Metadata,
        crate::auth::User,
        users::RegisterRequest,
        users::ActivateRequest,
        users::PasswordResetRequest,
        tokens::CredentialsRequest,
        tokens::EmailRequest,
        tokens::IssuedToken,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Service status"),
        (name = "movies", description = "Movie catalog"),
        (name = "users", description = "Signup, activation and password reset"),
        (name = "tokens", description = "Authentication, activation and password reset tokens"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
