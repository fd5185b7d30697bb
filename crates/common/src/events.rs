//! Self-posted events for the controller's event loop
//!
//! Engine completions and relayed launches arrive on foreign threads. They
//! never act directly; they enqueue their data and post a [`UiEvent`] so the
//! event loop does the work on its own thread. On Windows the sink posts a
//! window message; elsewhere [`EventDispatcher`] provides a channel-backed
//! sink and [`EventReceiver`] is the loop's end of it.

/// Work the event loop should pick up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UiEvent {
    /// Drain the pending argument batches and mount them
    DrainArgs,
    /// Drain the mount error queue and report it
    DrainErrors,
}

/// Posts events to the event loop from any thread
pub trait EventSink: Send + Sync {
    /// Returns false when the event loop is gone
    fn post(&self, event: UiEvent) -> bool;
}

/// Channel-backed event sink that can be cloned and shared across threads
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    tx: flume::Sender<UiEvent>,
}

impl EventDispatcher {
    /// Create a dispatcher and the receiver the event loop pulls from
    pub fn new() -> (Self, EventReceiver) {
        let (tx, rx) = flume::unbounded();
        (Self { tx }, EventReceiver { rx })
    }
}

impl EventSink for EventDispatcher {
    fn post(&self, event: UiEvent) -> bool {
        if self.tx.send(event).is_err() {
            tracing::debug!(?event, "event loop has shut down");
            return false;
        }
        true
    }
}

#[derive(Debug)]
pub struct EventReceiver {
    rx: flume::Receiver<UiEvent>,
}

impl EventReceiver {
    /// Receive the next event (blocking)
    ///
    /// Returns None when all dispatchers have been dropped.
    pub fn recv(&self) -> Option<UiEvent> {
        self.rx.recv().ok()
    }

    /// Receive an event without blocking
    pub fn try_recv(&self) -> Option<UiEvent> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order() {
        let (dispatcher, receiver) = EventDispatcher::new();
        let remote = dispatcher.clone();
        std::thread::spawn(move || {
            assert!(remote.post(UiEvent::DrainArgs));
            assert!(remote.post(UiEvent::DrainErrors));
        })
        .join()
        .unwrap();

        assert_eq!(receiver.recv(), Some(UiEvent::DrainArgs));
        assert_eq!(receiver.recv(), Some(UiEvent::DrainErrors));
        assert_eq!(receiver.try_recv(), None);
    }

    #[test]
    fn test_post_after_receiver_dropped() {
        let (dispatcher, receiver) = EventDispatcher::new();
        drop(receiver);
        assert!(!dispatcher.post(UiEvent::DrainArgs));
    }
}
