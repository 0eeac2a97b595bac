//! Request identification.
//!
//! # Responsibilities
//! - Generate a UUID request ID when the client did not send one
//! - Echo the ID back in the response
//! - Attach the ID to the request's tracing span
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Uses tower-http's request-id layers rather than a custom middleware

use axum::{body::Body, http::HeaderName, http::Request};
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer,
};
use tracing::Span;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Layer assigning a request ID to requests that lack one.
pub fn set_request_id() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID), MakeRequestUuid)
}

/// Layer copying the request ID onto the response.
pub fn propagate_request_id() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID))
}

/// Span for one HTTP request, tagged with its request ID.
pub fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id,
    )
}
