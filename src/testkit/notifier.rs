//! Event collector for notification assertions.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::service::{Event, EventRecord, Notifier};

/// Thread-safe event collector. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<EventRecord>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().iter().map(|r| r.event.clone()).collect()
    }

    /// Events whose variant matches `pred`.
    pub fn matching(&self, pred: impl Fn(&Event) -> bool) -> Vec<Event> {
        self.events().into_iter().filter(|e| pred(e)).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: &EventRecord) {
        self.events.lock().push(event.clone());
    }
}
