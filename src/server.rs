use axum::{middleware as axum_mw, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::middleware::timing;
use crate::preview;
use crate::AppState;

/// Builds the preview `Router`: batch endpoints plus request timing.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // ── Preview of what the reporter will submit ────────────
        .route("/api/metrics", get(preview::get_metrics))
        .route("/api/metrics/stream", get(preview::metrics_stream))
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            timing::timing_middleware,
        ))
        .layer(CorsLayer::permissive())
        // ── Provide shared state to all routes above ────────────
        .with_state(state)
}
