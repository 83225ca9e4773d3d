use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use serde::Deserialize;
use std::convert::Infallible;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::AppState;
use pkg_state::watch::WatchEvent;

#[derive(Debug, Deserialize)]
pub struct WatchQuery {
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub seq: Option<u64>,
}

/// GET /api/v1/watch: SSE endpoint streaming watch events.
///
/// Retained events after `seq` are replayed first, then live events follow.
/// Both are filtered by key `prefix`.
pub async fn watch_events(
    State(state): State<AppState>,
    Query(query): Query<WatchQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let prefix = query.prefix.unwrap_or_default();
    let from_seq = query.seq.unwrap_or(0);

    info!(
        "Watch subscription: prefix='{}', from_seq={}",
        prefix, from_seq
    );

    let event_log = &state.registry.store().event_log;
    // Subscribe before reading the backlog; duplicates are dropped by seq.
    let rx = event_log.subscribe();
    let buffered = event_log.events_since(from_seq).await;

    let stream = merge_events(buffered, rx, from_seq, prefix).filter_map(to_sse);
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// The retained `buffered` events followed by live ones from `rx`, all
/// under `prefix`. Live events already covered by the backlog are skipped.
fn merge_events(
    buffered: Vec<WatchEvent>,
    rx: broadcast::Receiver<WatchEvent>,
    from_seq: u64,
    prefix: String,
) -> impl Stream<Item = WatchEvent> {
    let last_buffered = buffered.last().map(|e| e.seq).unwrap_or(from_seq);
    let live_prefix = prefix.clone();

    let replay = tokio_stream::iter(
        buffered
            .into_iter()
            .filter(move |e| e.key.starts_with(&prefix)),
    );
    let live = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(event) if event.seq > last_buffered && event.key.starts_with(&live_prefix) => {
            Some(event)
        }
        _ => None,
    });

    replay.chain(live)
}

fn to_sse(event: WatchEvent) -> Option<Result<Event, Infallible>> {
    serde_json::to_string(&event)
        .ok()
        .map(|data| Ok(Event::default().id(event.seq.to_string()).data(data)))
}
