use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::response::sse::{Event as SseEvent, KeepAlive};
use axum::response::Sse;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::Stream;
use tracing::warn;

use crate::app_state::AppState;
use crate::errors::AppError;

#[derive(Deserialize)]
pub struct EventsQuery {
    token: Option<String>,
}

/// `data:` carries `{timestamp, data}` with `data` being the event's own
/// payload object.
#[derive(Serialize)]
struct EventEnvelope<'a> {
    timestamp: chrono::DateTime<chrono::Utc>,
    data: &'a serde_json::Value,
}

/// `GET /api/v1/events`. A lazy, per-subscriber SSE stream fed by the Event
/// Bus: no replay, FIFO per subscriber, silent gap on lag, built as an
/// `async_stream::stream!` block wrapping a broadcast subscription.
pub async fn events_sse_handler(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, AppError> {
    let token = query.token.unwrap_or_default();
    if token != state.config.events_token {
        return Err(AppError::unauthorized("invalid or missing events token"));
    }

    let mut subscription = state.bus.subscribe();
    let stream = async_stream::stream! {
        while let Some(event) = subscription.recv().await {
            let name = event.payload.event_name();
            let payload = match serde_json::to_value(&event.payload) {
                Ok(value) => value,
                Err(error) => {
                    warn!(%error, "failed to serialize event payload");
                    continue;
                }
            };
            // The payload carries its own `{type, data}` tag; unwrap to the
            // inner `data` object so the SSE envelope stays `{timestamp,
            // data}` rather than doubly nested.
            let data = payload.get("data").cloned().unwrap_or(json!({}));
            let envelope = EventEnvelope { timestamp: event.timestamp, data: &data };
            match serde_json::to_string(&envelope) {
                Ok(body) => yield Ok(SseEvent::default().event(name).data(body)),
                Err(error) => warn!(%error, "failed to serialize SSE envelope"),
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
