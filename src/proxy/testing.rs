// Fake devices for the control and loop tests.

use evdev::InputEvent;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::rc::Rc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use crate::device::ff::{FfRequestPort, UploadReply};
use crate::device::stream::{EventSink, EventSource, GrabbedSource};
use crate::rumble::actuator::Actuator;
use crate::rumble::effect_table::Effect;

/// Ordered record of side effects across several fakes.
pub type SharedLog = Rc<RefCell<Vec<&'static str>>>;

/// Events pushed through the sender become readable on the fake.
#[derive(Debug)]
pub struct EventFeed {
    rx: mpsc::UnboundedReceiver<InputEvent>,
}

impl EventFeed {
    pub fn new() -> (mpsc::UnboundedSender<InputEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<InputEvent>> {
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(event)) => Poll::Ready(Ok(event)),
            // a closed feed behaves like an idle device
            Poll::Ready(None) | Poll::Pending => Poll::Pending,
        }
    }
}

/// Stands in for the grabbed physical pad.
#[derive(Debug)]
pub struct FakeSource {
    feed: EventFeed,
    log: SharedLog,
}

impl FakeSource {
    pub fn new(log: SharedLog) -> (mpsc::UnboundedSender<InputEvent>, Self) {
        let (tx, feed) = EventFeed::new();
        (tx, Self { feed, log })
    }
}

impl EventSource for FakeSource {
    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<InputEvent>> {
        self.feed.poll_event(cx)
    }
}

impl GrabbedSource for FakeSource {
    fn release(&mut self) {
        self.log.borrow_mut().push("release");
    }
}

/// Stands in for the uinput device: the kernel side of the FF protocol plus the
/// node applications read forwarded events from.
#[derive(Debug)]
pub struct FakePad {
    feed: EventFeed,
    log: SharedLog,
    pending_uploads: HashMap<u32, Effect>,
    pending_erases: HashMap<u32, i32>,
    pub upload_replies: Vec<(u32, UploadReply)>,
    pub erase_replies: Vec<(u32, i32)>,
    pub written: Vec<InputEvent>,
}

impl FakePad {
    pub fn new(log: SharedLog) -> (mpsc::UnboundedSender<InputEvent>, Self) {
        let (tx, feed) = EventFeed::new();
        let pad = Self {
            feed,
            log,
            pending_uploads: HashMap::new(),
            pending_erases: HashMap::new(),
            upload_replies: Vec::new(),
            erase_replies: Vec::new(),
            written: Vec::new(),
        };
        (tx, pad)
    }

    /// A pad with nothing to read, for driving the FF protocol directly.
    pub fn detached() -> Self {
        Self::new(SharedLog::default()).1
    }

    pub fn queue_upload(&mut self, request_id: u32, effect: Effect) {
        self.pending_uploads.insert(request_id, effect);
    }

    pub fn queue_erase(&mut self, request_id: u32, effect_id: i32) {
        self.pending_erases.insert(request_id, effect_id);
    }
}

impl EventSource for FakePad {
    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<InputEvent>> {
        self.feed.poll_event(cx)
    }
}

impl EventSink for FakePad {
    fn write_events(&mut self, events: &[InputEvent]) -> io::Result<()> {
        self.written.extend_from_slice(events);
        Ok(())
    }
}

impl FfRequestPort for FakePad {
    fn answer_upload<F>(&mut self, request_id: u32, decide: F) -> io::Result<UploadReply>
    where
        F: FnOnce(Effect) -> UploadReply,
    {
        let effect = self
            .pending_uploads
            .remove(&request_id)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::EINVAL))?;
        let reply = decide(effect);
        self.upload_replies.push((request_id, reply));
        Ok(reply)
    }

    fn answer_erase<F>(&mut self, request_id: u32, decide: F) -> io::Result<i32>
    where
        F: FnOnce(i32) -> i32,
    {
        let effect_id = self
            .pending_erases
            .remove(&request_id)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::EINVAL))?;
        let retval = decide(effect_id);
        self.erase_replies.push((request_id, retval));
        Ok(retval)
    }
}

impl Drop for FakePad {
    fn drop(&mut self) {
        self.log.borrow_mut().push("destroy");
    }
}

/// Actuator that appends its writes to a [`SharedLog`].
#[derive(Debug)]
pub struct LoggedActuator {
    pub log: SharedLog,
}

impl Actuator for LoggedActuator {
    fn write_state(&mut self, on: bool) -> io::Result<()> {
        self.log.borrow_mut().push(if on { "on" } else { "off" });
        Ok(())
    }
}
