use std::any::Any;

use anyhow::anyhow;
use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::api::error::ApiError;

/// Turn a handler panic into a generic 500 and close the connection.
///
/// Runs inside the request span, so the log line carries method, route and request id.
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    error!(panic = detail, "request handler panicked");

    let mut response = ApiError::Internal(anyhow!("handler panicked")).into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
