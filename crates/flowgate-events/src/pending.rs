use std::collections::VecDeque;
use std::fmt;

use flowgate_types::{HostId, InputEvent};

use crate::queue::EventQueue;

/// Callback run once nothing is in flight. It gets the queue back so it can
/// dispatch, queue or register more work.
pub type ReadyCallback = Box<dyn FnOnce(&mut EventQueue)>;

/// One entry waiting for the in-flight event to be acknowledged.
pub enum QueuedItem {
    /// A copy of a held-back event and the host it came from.
    Event { host: HostId, event: InputEvent },
    Callback(ReadyCallback),
}

impl QueuedItem {
    pub fn host(&self) -> Option<HostId> {
        match self {
            Self::Event { host, .. } => Some(*host),
            Self::Callback(_) => None,
        }
    }
}

impl fmt::Debug for QueuedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event { host, event } => f
                .debug_struct("Event")
                .field("host", host)
                .field("event", event)
                .finish(),
            Self::Callback(_) => f.write_str("Callback"),
        }
    }
}

/// Strict FIFO shared by events of every host and ready callbacks.
#[derive(Debug, Default)]
pub struct PendingQueue {
    items: VecDeque<QueuedItem>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_event(&mut self, host: HostId, event: InputEvent) {
        self.items.push_back(QueuedItem::Event { host, event });
    }

    pub fn push_callback(&mut self, callback: ReadyCallback) {
        self.items.push_back(QueuedItem::Callback(callback));
    }

    pub fn pop_front(&mut self) -> Option<QueuedItem> {
        self.items.pop_front()
    }

    /// Drop every event queued for `host`, keeping the relative order of the rest.
    /// Returns how many entries were removed.
    pub fn purge_host(&mut self, host: HostId) -> usize {
        let before = self.items.len();
        self.items.retain(|item| item.host() != Some(host));
        before - self.items.len()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedItem> {
        self.items.iter()
    }
}
