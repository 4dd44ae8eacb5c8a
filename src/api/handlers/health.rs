use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{HeaderMap, HeaderValue},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::api::AppState;
use crate::GIT_COMMIT_HASH;

#[derive(ToSchema, Serialize, Debug)]
pub struct SystemInfo {
    environment: String,
    version: String,
    commit: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct Health {
    status: String,
    system_info: SystemInfo,
}

#[utoipa::path(
    get,
    path = "/v1/healthcheck",
    responses(
        (status = 200, description = "Service is available", body = Health)
    ),
    tag = "health"
)]
pub async fn healthcheck(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let health = Health {
        status: "available".to_string(),
        system_info: SystemInfo {
            environment: state.environment.as_str().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            commit: GIT_COMMIT_HASH.to_string(),
        },
    };

    let short_hash = health.system_info.commit.get(0..7).unwrap_or_default();

    let mut headers = HeaderMap::new();
    match format!(
        "{}:{}:{}",
        env!("CARGO_PKG_NAME"),
        health.system_info.version,
        short_hash
    )
    .parse::<HeaderValue>()
    {
        Ok(x_app_header_value) => {
            debug!("X-App header: {:?}", x_app_header_value);
            headers.insert("X-App", x_app_header_value);
        }
        Err(err) => error!("Failed to parse X-App header: {}", err),
    }

    (headers, Json(health))
}
