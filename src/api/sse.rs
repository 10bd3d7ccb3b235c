//! Server-Sent Events support

use crate::relay::Frame;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

/// Convert a chat's frame channel to an SSE response.
///
/// The chat is cancelled when the response stream is dropped, which is how
/// axum reports a disconnected client.
pub fn frame_stream(
    frames: UnboundedReceiver<Frame>,
    cancel: CancellationToken,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let guard = cancel.drop_guard();

    let events = UnboundedReceiverStream::new(frames).map(move |frame| {
        let _guard = &guard;
        Ok(frame_to_event(&frame))
    });

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn frame_to_event(frame: &Frame) -> Event {
    Event::default()
        .event(frame.event_name())
        .data(frame.data().to_string())
}
