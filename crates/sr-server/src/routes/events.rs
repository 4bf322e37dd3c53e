//! Server-Sent Events (SSE) handler.
//!
//! Replays the relay log for late joiners, then follows new entries as they
//! are appended, with keepalive heartbeats.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio::sync::broadcast::error::RecvError;

use crate::context::AppContext;

/// GET /logs/stream -- SSE stream of relay log entries.
pub async fn log_events(
    State(ctx): State<AppContext>,
) -> Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>> {
    // Subscribe before snapshotting so nothing falls between the two; an entry
    // appended in between may be delivered twice.
    let mut rx = ctx.log.subscribe();
    let backlog = ctx.log.all();
    let shutdown = ctx.shutdown.clone();

    let stream = async_stream::stream! {
        for entry in backlog {
            if let Ok(data) = serde_json::to_string(&entry) {
                yield Ok(Event::default().event("log").data(data));
            }
        }

        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(entry) => {
                            if let Ok(data) = serde_json::to_string(&entry) {
                                yield Ok(Event::default().event("log").data(data));
                            }
                        }
                        Err(RecvError::Lagged(n)) => {
                            tracing::debug!("SSE client lagged by {n} log entries");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
                _ = shutdown.cancelled() => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
