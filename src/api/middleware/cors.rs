use anyhow::{Context, Result};
use axum::http::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// CORS for the configured trusted origins. With none configured, no origin is allowed.
///
/// Preflight `OPTIONS` requests are answered here and never reach admission or authentication.
///
/// # Errors
/// Returns an error if an origin is not a valid header value.
pub fn cors_layer(trusted_origins: &[String]) -> Result<CorsLayer> {
    let origins = trusted_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin.trim_end_matches('/'))
                .with_context(|| format!("Invalid trusted origin: {origin}"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::OPTIONS,
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]))
}
