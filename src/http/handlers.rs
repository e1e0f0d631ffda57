//! Request handlers for the API server unit.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::health::QueueHealth;
use crate::http::spec::ApiSpec;

pub const HEALTHY_MESSAGE: &str = "Yes we can! 🔨 🔨";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub spec: Arc<ApiSpec>,
    pub health: Arc<QueueHealth>,
}

#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}

/// `GET /api/can-we-build-it`
pub async fn can_we_build_it(State(state): State<AppState>) -> Response {
    let (status, message) = if state.health.is_healthy() {
        (StatusCode::OK, HEALTHY_MESSAGE)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Queue unavailable")
    };
    (status, Json(Message { message })).into_response()
}

/// `GET /api/spec`
pub async fn api_spec(State(state): State<AppState>) -> Response {
    (
        [(header::CONTENT_TYPE, "application/yaml")],
        state.spec.raw().to_owned(),
    )
        .into_response()
}

pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(Message {
            message: "No such route",
        }),
    )
        .into_response()
}
