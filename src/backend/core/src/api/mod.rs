//! HTTP API layer.
//!
//! REST endpoints over Axum. Health and metrics are unversioned; the bounty
//! board and the event feed live under `/api/v1/`.

mod handlers;

use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::bounties::BountyStore;
use crate::events::EventFeed;
use crate::telemetry::RequestTimer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<BountyStore>,
    pub feed: Arc<EventFeed>,
}

/// Uniform response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_code: None,
        }
    }

    pub fn err(error: impl Into<String>, error_code: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            error_code: Some(error_code.into()),
        }
    }
}

/// Record the request counter and latency histogram for every request.
/// Labeled by the matched route pattern, not the raw path, so ids do not
/// explode the label space.
async fn track_metrics(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let timer = RequestTimer::start(method, route);
    let response = next.run(request).await;
    timer.finish(response.status().as_u16());
    response
}

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::prometheus_metrics))
        .route(
            "/api/v1/bounties",
            get(handlers::list_bounties).post(handlers::create_bounty),
        )
        .route("/api/v1/bounties/:id", get(handlers::get_bounty))
        .route(
            "/api/v1/bounties/:id/transition",
            post(handlers::transition_bounty),
        )
        .route("/api/v1/events", get(handlers::list_agent_events))
        .layer(middleware::from_fn(track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}
