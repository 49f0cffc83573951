use std::convert::Infallible;
use std::pin::Pin;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;

use crate::governor::Governor;

pub type GovernorEventStream = Sse<Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>>;

/// Build a Server-Sent Events stream of live governor events.
///
/// Each SSE event is named after the governor event's `type` tag. Lagged
/// receivers skip what they missed.
pub fn governor_events(governor: &Governor) -> GovernorEventStream {
    let receiver = governor.subscribe_events();

    let stream = BroadcastStream::new(receiver).filter_map(|result| async move {
        let event = result.ok()?;
        let payload = serde_json::to_value(&event).ok()?;
        let name = payload["type"].as_str().unwrap_or("governor").to_string();
        Some(Ok(Event::default().event(name).data(payload.to_string())))
    });

    Sse::new(Box::pin(stream) as Pin<Box<_>>).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(5))
            .text("governor-keepalive"),
    )
}
