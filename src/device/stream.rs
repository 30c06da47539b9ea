//! Poll-level seams between the devices and the forwarding loop.
//!
//! The loop only needs to pull events, push events and drop a grab, so it is
//! written against these traits instead of the evdev handles directly.

use evdev::InputEvent;
use std::future::poll_fn;
use std::io;
use std::task::{Context, Poll};

/// Something the loop reads input events from.
pub trait EventSource {
    /// Returns the next buffered event, registering for readiness when there is none.
    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<InputEvent>>;
}

/// Something the loop writes input events to.
pub trait EventSink {
    /// Writes the events unchanged and in order, without adding a `SYN_REPORT`.
    fn write_events(&mut self, events: &[InputEvent]) -> io::Result<()>;
}

/// An [`EventSource`] held under an exclusive grab.
pub trait GrabbedSource: EventSource {
    /// Gives the grab back; calling it twice is harmless.
    fn release(&mut self);
}

/// Waits until `source` has an event.
pub async fn next_event<S: EventSource + ?Sized>(source: &mut S) -> io::Result<InputEvent> {
    poll_fn(|cx| source.poll_event(cx)).await
}

/// Collects up to `limit` events that are available right now, without waiting.
pub async fn ready_events<S: EventSource + ?Sized>(
    source: &mut S,
    limit: usize,
) -> io::Result<Vec<InputEvent>> {
    let mut events = Vec::new();
    poll_fn(|cx| {
        while events.len() < limit {
            match source.poll_event(cx) {
                Poll::Ready(Ok(event)) => events.push(event),
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => break,
            }
        }
        Poll::Ready(Ok(()))
    })
    .await?;
    Ok(events)
}
