// Server-Sent Events stream of profile state changes.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use super::AppState;
use crate::metrics;
use crate::registry::StateEvent;

/// Decrements the connected client gauge when the stream is dropped.
struct ClientGuard;

impl ClientGuard {
    fn new() -> Self {
        metrics::EVENT_STREAM_CLIENTS.inc();
        ClientGuard
    }
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        metrics::EVENT_STREAM_CLIENTS.dec();
    }
}

fn to_sse(event: &StateEvent) -> Result<Event, Infallible> {
    let data = serde_json::to_string(event).unwrap_or_else(|e| {
        tracing::error!("Failed to serialize state event: {e}");
        "{}".to_string()
    });
    Ok(Event::default().event("state").data(data))
}

/// Stream the current state of every profile, then one `state` event per change.
pub async fn state_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Subscribe before taking the snapshot so no change falls in between.
    let rx = state.registry.subscribe();
    let current: Vec<Result<Event, Infallible>> = state
        .registry
        .snapshot_all()
        .into_iter()
        .map(|(client, state)| to_sse(&StateEvent { client, state }))
        .collect();

    let live = stream::unfold((rx, ClientGuard::new()), |(mut rx, guard)| async move {
        loop {
            match rx.recv().await {
                Ok(event) => return Some((to_sse(&event), (rx, guard))),
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("Event stream client lagged, skipped {n} state events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream::iter(current).chain(live)).keep_alive(KeepAlive::default())
}
