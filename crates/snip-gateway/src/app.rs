use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{create_url_handler, health_handler, redirect_handler};
use crate::state::AppState;

/// Deadline applied to every request unless configured otherwise.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct App {}

impl App {
    pub fn router(state: AppState) -> Router {
        Self::with_request_timeout(state, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Builds the router with a per-request deadline. A request still running
    /// after `request_timeout` is answered with `408 Request Timeout`.
    pub fn with_request_timeout(state: AppState, request_timeout: Duration) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/api/url", post(create_url_handler))
            .route("/{code}", get(redirect_handler))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                request_timeout,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}
