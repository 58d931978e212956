//! Server-Sent Events support

use crate::runtime::RunHandle;
use crate::state_machine::StreamEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::Value;
use std::convert::Infallible;
use std::time::Duration;

/// Stream a run's events in emission order.
///
/// The stream ends when the run does. Dropping it early (client gone)
/// cancels the run.
pub fn sse_stream(handle: RunHandle) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let guard = handle.cancel.drop_guard();

    let events = futures::stream::unfold((handle.events, guard), |(mut rx, guard)| async move {
        let event = rx.recv().await?;
        if event.is_final() {
            tracing::debug!(
                event_type = event.event_type.as_str(),
                "Final event streamed"
            );
        }
        Some((Ok(stream_event_to_axum(&event)), (rx, guard)))
    });

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn stream_event_to_axum(event: &StreamEvent) -> Event {
    let data = serde_json::to_value(event).unwrap_or(Value::Null);
    Event::default()
        .event(event.event_type.as_str())
        .data(data.to_string())
}
