use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;

use crate::AppState;

/// Tower-compatible middleware that times every API request into the
/// registry and adds two response headers:
///
///   X-Response-Time-Us  — total handler wall time in microseconds
///   Server-Timing       — same value in the standard Server-Timing format
pub async fn timing_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let start = Instant::now();
    let mut response = next.run(req).await;
    let elapsed = start.elapsed();
    let us = elapsed.as_micros();

    // ── Inject response headers ─────────────────────────────────
    if let Ok(val) = us.to_string().parse() {
        response.headers_mut().insert("X-Response-Time-Us", val);
    }

    let server_timing = format!("total;dur={:.3}", elapsed.as_secs_f64() * 1000.0);
    if let Ok(val) = server_timing.parse() {
        response.headers_mut().insert("Server-Timing", val);
    }

    // ── Record into the registry ────────────────────────────────
    let status = response.status();
    // SSE connections stay open for minutes; they would skew the timer
    if path.starts_with("/api/") && !path.ends_with("/stream") {
        state.http_requests.update(elapsed);
        if status.is_server_error() {
            state.http_server_errors.inc(1);
        }
        tracing::debug!(%method, %path, status = status.as_u16(), us = us as u64, "request");
    }

    response
}
