use std::collections::HashMap;

use flowgate_types::{ClientId, EventId, HostId, InputEvent, TargetId};
use tracing::debug;

/// What happened when a host dispatched an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Consumed locally; nothing waits for an ack.
    Handled,
    /// Forwarded to a remote client, which will ack `event_id`.
    SentToClient { client_id: ClientId, event_id: EventId },
}

/// An input source registered with the event queue.
///
/// The host owns hit-testing and the actual delivery path; the queue only
/// asks where key events would go and hands events back for dispatch.
pub trait EventHost {
    /// Target that key events would be routed to right now, if any.
    fn find_key_target(&self) -> Option<TargetId>;

    /// Whether `target` is backed by a remote client connection.
    fn has_remote_client(&self, target: TargetId) -> bool;

    /// Deliver an event, either one that was never queued or one leaving the queue.
    fn dispatch_event(&mut self, event: &InputEvent) -> DispatchOutcome;
}

/// Hosts known to one event queue.
#[derive(Default)]
pub struct HostRegistry {
    hosts: HashMap<HostId, Box<dyn EventHost>>,
    next_id: u64,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a host. Ids are never reused within one registry.
    pub fn register(&mut self, host: Box<dyn EventHost>) -> HostId {
        self.next_id += 1;
        let id = HostId(self.next_id);
        self.hosts.insert(id, host);
        debug!(host = %id, "host registered");
        id
    }

    pub fn unregister(&mut self, id: HostId) -> Option<Box<dyn EventHost>> {
        let host = self.hosts.remove(&id);
        if host.is_some() {
            debug!(host = %id, "host unregistered");
        }
        host
    }

    pub fn get(&self, id: HostId) -> Option<&dyn EventHost> {
        self.hosts.get(&id).map(|h| h.as_ref())
    }

    pub fn get_mut(&mut self, id: HostId) -> Option<&mut (dyn EventHost + 'static)> {
        self.hosts.get_mut(&id).map(|h| h.as_mut())
    }

    pub fn contains(&self, id: HostId) -> bool {
        self.hosts.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// True when key events sent to `id` would land on a remote client.
    pub fn key_target_is_remote(&self, id: HostId) -> bool {
        let Some(host) = self.get(id) else {
            return false;
        };
        host.find_key_target()
            .is_some_and(|target| host.has_remote_client(target))
    }
}
