use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, MatchedPath},
    http::{HeaderName, HeaderValue, Request},
    middleware::from_fn_with_state,
    routing::{get, patch, post, put},
    Extension, Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{field::Empty, info, info_span, Span};
use ulid::Ulid;

use crate::auth::permissions::{MOVIES_READ, MOVIES_WRITE};
use crate::auth::{PermissionOracle, TokenStore, TokenTtls};
use crate::mail::MailDispatcher;
use crate::store::{bounded, MovieBackend, UserBackend};

pub mod error;
pub mod handlers;
pub mod middleware;
mod openapi;

pub use error::ApiError;
pub use openapi::ApiDoc;

use handlers::{health, movies, tokens, users};
use middleware::{PermissionGate, RateLimiter};

const REQUEST_ID: &str = "x-request-id";

/// Deployment environment, reported by the health check.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub const VALUES: [&'static str; 3] = ["development", "staging", "production"];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "development" => Some(Self::Development),
            "staging" => Some(Self::Staging),
            "production" => Some(Self::Production),
            _ => None,
        }
    }
}

/// Everything handlers and middleware share.
#[derive(Clone)]
pub struct AppState {
    pub environment: Environment,
    pub tokens: TokenStore,
    pub permissions: PermissionOracle,
    pub users: Arc<dyn UserBackend>,
    pub movies: Arc<dyn MovieBackend>,
    pub ttls: TokenTtls,
    pub mail: MailDispatcher,
    pub limiter: Arc<dyn RateLimiter>,
    pub store_timeout: Duration,
}

impl AppState {
    /// Bound a user or movie backend call by the store timeout.
    ///
    /// # Errors
    /// Backend failure or timeout, as [`ApiError::Internal`].
    pub async fn call<T, F>(&self, call: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T>>,
    {
        bounded(self.store_timeout, call)
            .await
            .map_err(|err| ApiError::Internal(err.into()))
    }
}

/// Build the full application.
///
/// Outermost first: panic recovery, request id, trace span, panic recovery
/// again for handler context, CORS, admission, authentication, then routes
/// with their gates.
///
/// # Errors
/// Returns an error if a trusted CORS origin is invalid.
pub fn router(state: Arc<AppState>, trusted_origins: &[String]) -> Result<Router> {
    let cors = middleware::cors::cors_layer(trusted_origins)?;

    let gate = |code: &'static str| {
        from_fn_with_state(
            PermissionGate::new(state.permissions.clone(), code),
            middleware::require_permission,
        )
    };

    let routes = Router::new()
        .route(
            "/v1/healthcheck",
            get(health::healthcheck).fallback(handlers::method_not_allowed),
        )
        .route(
            "/v1/movies",
            get(movies::list_movies)
                .route_layer(gate(MOVIES_READ))
                .merge(post(movies::create_movie).route_layer(gate(MOVIES_WRITE)))
                .fallback(handlers::method_not_allowed),
        )
        .route(
            "/v1/movies/:id",
            get(movies::show_movie)
                .route_layer(gate(MOVIES_READ))
                .merge(
                    patch(movies::update_movie)
                        .delete(movies::delete_movie)
                        .route_layer(gate(MOVIES_WRITE)),
                )
                .fallback(handlers::method_not_allowed),
        )
        .route(
            "/v1/users",
            post(users::register_user).fallback(handlers::method_not_allowed),
        )
        .route(
            "/v1/users/activated",
            put(users::activate_user).fallback(handlers::method_not_allowed),
        )
        .route(
            "/v1/users/password",
            put(users::update_user_password).fallback(handlers::method_not_allowed),
        )
        .route(
            "/v1/tokens/authentication",
            post(tokens::create_authentication_token).fallback(handlers::method_not_allowed),
        )
        .route(
            "/v1/tokens/activation",
            post(tokens::create_activation_token).fallback(handlers::method_not_allowed),
        )
        .route(
            "/v1/tokens/password-reset",
            post(tokens::create_password_reset_token).fallback(handlers::method_not_allowed),
        )
        .route(
            "/v1/openapi.json",
            get(openapi::openapi_json).fallback(handlers::method_not_allowed),
        )
        .fallback(handlers::not_found);

    // The outer panic guard covers the request id and trace layers; the inner
    // one logs handler panics inside the request span.
    let app = routes.layer(
        ServiceBuilder::new()
            .layer(CatchPanicLayer::custom(middleware::recover::handle_panic))
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static(REQUEST_ID),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                REQUEST_ID,
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(CatchPanicLayer::custom(middleware::recover::handle_panic))
            .layer(cors)
            .layer(from_fn_with_state(
                state.limiter.clone(),
                middleware::admit,
            ))
            .layer(from_fn_with_state(
                state.tokens.clone(),
                middleware::authenticate,
            ))
            .layer(DefaultBodyLimit::max(handlers::MAX_BODY_BYTES))
            .layer(Extension(state)),
    );

    Ok(app)
}

/// Serve until `shutdown` is cancelled, then stop accepting and drain in-flight requests.
///
/// # Errors
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn serve(app: Router, port: u16, shutdown: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown.cancelled().await;
        info!("Gracefully shutdown");
    })
    .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id,
        user_id = Empty
    )
}
