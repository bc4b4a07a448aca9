//! Router assembly and middleware.

use axum::http::Method;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::{api, AppState};

/// Headroom over the upload limit for multipart framing
const BODY_LIMIT_SLACK: u64 = 64 * 1024;

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "hass-server", "version": env!("CARGO_PKG_VERSION") }))
}

/// Build the application router with all routes and middleware
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let body_limit = (state.config.max_upload_bytes + BODY_LIMIT_SLACK) as usize;

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api::routes())
        .layer(axum::extract::DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
