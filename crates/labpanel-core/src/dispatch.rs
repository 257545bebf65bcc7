//! Event dispatch bridge between bus threads and the UI thread.
//!
//! The device bus invokes change-event callbacks on threads it owns, possibly
//! several at once. Widgets and panel state live on the UI thread and are not
//! synchronized. The bridge is the only crossing point: callbacks post events
//! into an ordered channel through a cloneable [`EventSink`], and the UI loop
//! drains the [`EventBridge`] once per frame.
//!
//! Ordering: events posted from one thread arrive in posting order. A bus
//! delivers the events of one subscription sequentially, so each subscription
//! is FIFO. Events of different subscriptions may interleave arbitrarily.
//!
//! Error events travel like any other; the consumer decides what they mean.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::bus::{ChangeEvent, EventCallback};

/// Hook invoked after each post, typically `egui::Context::request_repaint`.
pub type Waker = Arc<dyn Fn() + Send + Sync>;

/// Sending half of the bridge. Cheap to clone and safe to call from any thread.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<ChangeEvent>,
    waker: Option<Waker>,
}

impl EventSink {
    /// Queue an event for the UI thread.
    ///
    /// Posting after the bridge is gone is a no-op.
    pub fn post(&self, event: ChangeEvent) {
        if let Err(err) = self.tx.send(event) {
            tracing::debug!(
                attribute = %err.0.attribute,
                "Dropping change event, UI side of the bridge is closed"
            );
            return;
        }
        if let Some(waker) = &self.waker {
            waker();
        }
    }

    /// Bus callback that posts into this sink.
    pub fn callback(&self) -> EventCallback {
        let sink = self.clone();
        Arc::new(move |event| sink.post(event))
    }

    /// The UI side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("closed", &self.tx.is_closed())
            .field("waker", &self.waker.is_some())
            .finish()
    }
}

/// Receiving half of the bridge, owned by the UI thread.
pub struct EventBridge {
    rx: mpsc::UnboundedReceiver<ChangeEvent>,
    sink: EventSink,
}

impl EventBridge {
    /// Bridge without repaint hook.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Bridge that calls `waker` after every post.
    pub fn with_waker(waker: Waker) -> Self {
        Self::build(Some(waker))
    }

    fn build(waker: Option<Waker>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            rx,
            sink: EventSink { tx, waker },
        }
    }

    /// A new sending handle.
    pub fn sink(&self) -> EventSink {
        self.sink.clone()
    }

    /// Shorthand for `self.sink().callback()`.
    pub fn callback(&self) -> EventCallback {
        self.sink.callback()
    }

    /// Next queued event, if any.
    pub fn try_next(&mut self) -> Option<ChangeEvent> {
        self.rx.try_recv().ok()
    }

    /// All queued events, in arrival order.
    pub fn drain(&mut self) -> Vec<ChangeEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Default for EventBridge {
    fn default() -> Self {
        Self::new()
    }
}
