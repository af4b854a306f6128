use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use std::convert::Infallible;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;
use serde::Serialize;
use tokio_stream::StreamExt;

use librato_reporter::librato::Batch;
use librato_reporter::BuildError;

use crate::AppState;

/// How often the SSE endpoint pushes a fresh preview batch.
const STREAM_TICK: Duration = Duration::from_secs(1);

// ─── Error envelope ──────────────────────────────────────────────

#[derive(Debug)]
pub struct PreviewError(BuildError);

impl IntoResponse for PreviewError {
    fn into_response(self) -> Response {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        let body = serde_json::json!({
            "error":  self.0.to_string(),
            "status": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}

// ─── GET /api/metrics ────────────────────────────────────────────
/// The batch the next tick would submit, built on demand.

pub async fn get_metrics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Batch>, PreviewError> {
    state
        .builder
        .build(Utc::now(), state.registry.as_ref())
        .map(Json)
        .map_err(PreviewError)
}

// ─── GET /api/metrics/stream ─────────────────────────────────────
/// Server-Sent Events endpoint.
/// Pushes a preview `Batch` as JSON every second until shutdown.

pub async fn metrics_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let interval = tokio::time::interval(STREAM_TICK);

    let running = state.running.clone();
    let stream = IntervalStream::new(interval)
        .take_while(move |_| running.load(Ordering::Relaxed))
        .map(move |_| {
            let event = match state.builder.build(Utc::now(), state.registry.as_ref()) {
                Ok(batch) => json_event(&batch),
                Err(err) => error_event(&err),
            };
            Ok(event)
        });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn json_event<T: Serialize>(value: &T) -> Event {
    match serde_json::to_string(value) {
        Ok(json) => Event::default().data(json),
        Err(err) => error_event(&err),
    }
}

fn error_event(err: &dyn std::error::Error) -> Event {
    Event::default().event("error").data(err.to_string())
}
