//! Request metrics.
//!
//! Runs after routing, so matched requests are labelled with their route
//! template. Anything the router did not match is labelled `fallback`.

use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::observability::metrics;

pub const FALLBACK_ROUTE: &str = "fallback";

/// Count every request and time it through the inner layers and handler.
pub async fn track_metrics(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| FALLBACK_ROUTE.to_string());

    let response = next.run(request).await;

    metrics::record_request(&route, response.status().as_u16(), start.elapsed());
    response
}
