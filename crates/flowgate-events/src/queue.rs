use std::time::{Duration, Instant};

use flowgate_types::{ClientId, EventId, HostId, InputEvent};
use tracing::{debug, warn};

use crate::host::{DispatchOutcome, EventHost, HostRegistry};
use crate::pending::{PendingQueue, QueuedItem};

/// Event queue configuration.
#[derive(Debug, Clone, Default)]
pub struct EventQueueConfig {
    /// How long an in-flight event may stay unacknowledged before
    /// `check_ack_timeout` force-acks it. `None` waits forever.
    pub ack_timeout: Option<Duration>,
}

/// The single event currently waiting for a client ack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlightEvent {
    pub host: HostId,
    pub client_id: ClientId,
    pub event_id: EventId,
    pub sent_at: Instant,
}

/// How `dispatch_or_queue_event` handled an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Queued,
    Dispatched(DispatchOutcome),
    UnknownHost,
}

/// Flow controller for input events headed to remote clients.
///
/// At most one key event is in flight. While it is, key events whose target
/// has a remote client are held in a FIFO together with ready callbacks; the
/// FIFO drains when the ack arrives, the client goes away, or the owning host
/// is unregistered. The whole structure lives on one sequence and is mutated
/// only through `&mut self`.
pub struct EventQueue {
    config: EventQueueConfig,
    hosts: HostRegistry,
    pending: PendingQueue,
    in_flight: Option<InFlightEvent>,
}

impl EventQueue {
    pub fn new(config: EventQueueConfig) -> Self {
        Self {
            config,
            hosts: HostRegistry::new(),
            pending: PendingQueue::new(),
            in_flight: None,
        }
    }

    // ── Hosts ───────────────────────────────────────────────────────────

    pub fn register_host(&mut self, host: Box<dyn EventHost>) -> HostId {
        self.hosts.register(host)
    }

    /// Remove a host: purge its queued events, forget it, and if it owns the
    /// in-flight event, treat that event as acknowledged so the rest drains.
    ///
    /// Returns false for an unknown host.
    pub fn unregister_host(&mut self, host: HostId) -> bool {
        if !self.hosts.contains(host) {
            return false;
        }

        let purged = self.pending.purge_host(host);
        self.hosts.unregister(host);
        debug!(host = %host, purged, "host removed from event queue");

        if let Some(in_flight) = self.in_flight {
            if in_flight.host == host {
                debug!(host = %host, client = %in_flight.client_id, "forcing ack for removed host");
                self.on_client_acked_event(in_flight.client_id, in_flight.event_id);
            }
        }
        true
    }

    pub fn contains_host(&self, host: HostId) -> bool {
        self.hosts.contains(host)
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    // ── Queueing ────────────────────────────────────────────────────────

    /// Whether `event` from `host` must wait instead of being dispatched now.
    ///
    /// Only key events are held back, only while something is in flight, and
    /// only when the host's key target is a remote client.
    pub fn should_queue_event(&self, host: HostId, event: &InputEvent) -> bool {
        if self.in_flight.is_none() || !event.is_key_event() {
            return false;
        }
        self.hosts.key_target_is_remote(host)
    }

    /// Append a copy of `event` to the FIFO. Callers check `should_queue_event` first.
    pub fn queue_event(&mut self, host: HostId, event: &InputEvent) {
        debug_assert!(self.should_queue_event(host, event));
        if !self.hosts.contains(host) {
            warn!(host = %host, "dropping event queued for unknown host");
            return;
        }
        debug!(host = %host, kind = event.kind_name(), depth = self.pending.len() + 1, "event queued");
        self.pending.push_event(host, event.clone());
    }

    /// Queue the event if it has to wait, otherwise hand it to its host now.
    pub fn dispatch_or_queue_event(&mut self, host: HostId, event: &InputEvent) -> Disposition {
        if !self.hosts.contains(host) {
            warn!(host = %host, "event for unknown host");
            return Disposition::UnknownHost;
        }
        if self.should_queue_event(host, event) {
            self.queue_event(host, event);
            return Disposition::Queued;
        }
        match self.dispatch_to_host(host, event) {
            Some(outcome) => Disposition::Dispatched(outcome),
            None => Disposition::UnknownHost,
        }
    }

    /// Run `callback` now if nothing is in flight, otherwise after everything
    /// queued ahead of it.
    pub fn notify_when_ready_to_dispatch<F>(&mut self, callback: F)
    where
        F: FnOnce(&mut EventQueue) + 'static,
    {
        if self.in_flight.is_none() {
            callback(self);
        } else {
            self.pending.push_callback(Box::new(callback));
        }
    }

    // ── Client notifications ────────────────────────────────────────────

    /// Record that `event` is about to go to a client. Key events become the
    /// in-flight event; a second one while the slot is taken is rejected.
    pub fn on_will_send_event_to_client(
        &mut self,
        host: HostId,
        client_id: ClientId,
        event_id: EventId,
        event: &InputEvent,
    ) -> bool {
        if !event.is_key_event() {
            return false;
        }
        if let Some(current) = self.in_flight {
            warn!(
                client = %client_id,
                event = %event_id,
                in_flight_client = %current.client_id,
                in_flight_event = %current.event_id,
                "event sent while another is in flight, ignoring"
            );
            return false;
        }
        debug!(host = %host, client = %client_id, event = %event_id, "event in flight");
        self.in_flight = Some(InFlightEvent {
            host,
            client_id,
            event_id,
            sent_at: Instant::now(),
        });
        true
    }

    /// Client acknowledged `event_id`. Stale or duplicate acks are ignored.
    /// Returns true when the ack matched and the queue was drained.
    pub fn on_client_acked_event(&mut self, client_id: ClientId, event_id: EventId) -> bool {
        match self.in_flight {
            Some(current) if current.client_id == client_id && current.event_id == event_id => {}
            _ => {
                debug!(client = %client_id, event = %event_id, "ignoring stale ack");
                return false;
            }
        }
        self.in_flight = None;
        debug!(client = %client_id, event = %event_id, queued = self.pending.len(), "event acked");
        self.dispatch_next_queued_events();
        true
    }

    /// A client is going away; an event it never acked no longer blocks the queue.
    pub fn on_will_destroy_client(&mut self, client_id: ClientId) {
        if let Some(current) = self.in_flight {
            if current.client_id == client_id {
                self.on_client_acked_event(client_id, current.event_id);
            }
        }
    }

    // ── Ack timeout ─────────────────────────────────────────────────────

    /// When the in-flight event times out, if a timeout is configured.
    pub fn ack_deadline(&self) -> Option<Instant> {
        let timeout = self.config.ack_timeout?;
        self.in_flight.map(|e| e.sent_at + timeout)
    }

    /// Force-ack the in-flight event if it has been waiting past the timeout.
    pub fn check_ack_timeout(&mut self, now: Instant) -> bool {
        let Some(deadline) = self.ack_deadline() else {
            return false;
        };
        if now < deadline {
            return false;
        }
        let Some(current) = self.in_flight else {
            return false;
        };
        warn!(
            client = %current.client_id,
            event = %current.event_id,
            waited_ms = now.duration_since(current.sent_at).as_millis() as u64,
            "ack timed out, unblocking queue"
        );
        self.on_client_acked_event(current.client_id, current.event_id)
    }

    // ── Inspection ──────────────────────────────────────────────────────

    pub fn in_flight(&self) -> Option<&InFlightEvent> {
        self.in_flight.as_ref()
    }

    pub fn queued_len(&self) -> usize {
        self.pending.len()
    }

    pub fn pending(&self) -> &PendingQueue {
        &self.pending
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn dispatch_next_queued_events(&mut self) {
        while self.in_flight.is_none() {
            let Some(item) = self.pending.pop_front() else {
                break;
            };
            match item {
                QueuedItem::Callback(callback) => callback(self),
                QueuedItem::Event { host, event } => {
                    self.dispatch_to_host(host, &event);
                }
            }
        }
    }

    fn dispatch_to_host(&mut self, host: HostId, event: &InputEvent) -> Option<DispatchOutcome> {
        let Some(target) = self.hosts.get_mut(host) else {
            warn!(host = %host, "dropping event for unregistered host");
            return None;
        };
        let outcome = target.dispatch_event(event);
        if let DispatchOutcome::SentToClient { client_id, event_id } = outcome {
            self.on_will_send_event_to_client(host, client_id, event_id, event);
        }
        Some(outcome)
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(EventQueueConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use flowgate_types::{KeyEvent, PointerEvent, PointerEventKind, TargetId};

    use super::*;

    /// Host whose key target is a remote client that never acks on its own.
    struct RemoteHost {
        client: ClientId,
        next_event: u32,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl EventHost for RemoteHost {
        fn find_key_target(&self) -> Option<TargetId> {
            Some(TargetId(1))
        }

        fn has_remote_client(&self, _target: TargetId) -> bool {
            true
        }

        fn dispatch_event(&mut self, event: &InputEvent) -> DispatchOutcome {
            if let InputEvent::Key(k) = event {
                self.log.borrow_mut().push(format!("{}:{}", self.client.0, k.key_code));
            }
            self.next_event += 1;
            DispatchOutcome::SentToClient {
                client_id: self.client,
                event_id: EventId(self.next_event),
            }
        }
    }

    fn key(code: u32) -> InputEvent {
        InputEvent::Key(KeyEvent::pressed(code))
    }

    fn setup() -> (EventQueue, HostId, Rc<RefCell<Vec<String>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut queue = EventQueue::default();
        let host = queue.register_host(Box::new(RemoteHost {
            client: ClientId(1),
            next_event: 0,
            log: log.clone(),
        }));
        (queue, host, log)
    }

    #[test]
    fn nothing_queues_while_idle() {
        let (mut queue, host, log) = setup();
        assert!(!queue.should_queue_event(host, &key(1)));
        assert_eq!(queue.dispatch_or_queue_event(host, &key(1)), Disposition::Dispatched(
            DispatchOutcome::SentToClient { client_id: ClientId(1), event_id: EventId(1) }
        ));
        assert_eq!(*log.borrow(), vec!["1:1"]);
        assert_eq!(queue.in_flight().map(|e| e.event_id), Some(EventId(1)));
    }

    #[test]
    fn pointer_events_are_never_queued() {
        let (mut queue, host, _log) = setup();
        queue.dispatch_or_queue_event(host, &key(1));
        let pointer = InputEvent::Pointer(PointerEvent {
            kind: PointerEventKind::Pressed,
            x: 0.0,
            y: 0.0,
            pointer_id: 0,
        });
        assert!(!queue.should_queue_event(host, &pointer));
        // Non-key events never take the in-flight slot either.
        assert!(!queue.on_will_send_event_to_client(host, ClientId(1), EventId(50), &pointer));
    }

    #[test]
    fn second_in_flight_is_rejected() {
        let (mut queue, host, _log) = setup();
        assert!(queue.on_will_send_event_to_client(host, ClientId(1), EventId(10), &key(1)));
        assert!(!queue.on_will_send_event_to_client(host, ClientId(2), EventId(11), &key(2)));
        let current = queue.in_flight().unwrap();
        assert_eq!((current.client_id, current.event_id), (ClientId(1), EventId(10)));
    }

    #[test]
    fn stale_ack_changes_nothing() {
        let (mut queue, host, _log) = setup();
        queue.dispatch_or_queue_event(host, &key(1));
        queue.dispatch_or_queue_event(host, &key(2));
        assert_eq!(queue.queued_len(), 1);

        assert!(!queue.on_client_acked_event(ClientId(1), EventId(99)));
        assert!(!queue.on_client_acked_event(ClientId(2), EventId(1)));
        assert_eq!(queue.queued_len(), 1);
        assert_eq!(queue.in_flight().map(|e| e.event_id), Some(EventId(1)));
    }

    #[test]
    fn ack_dispatches_next_and_stops_when_it_goes_in_flight() {
        let (mut queue, host, log) = setup();
        queue.dispatch_or_queue_event(host, &key(1));
        queue.dispatch_or_queue_event(host, &key(2));
        queue.dispatch_or_queue_event(host, &key(3));

        assert!(queue.on_client_acked_event(ClientId(1), EventId(1)));
        assert_eq!(*log.borrow(), vec!["1:1", "1:2"]);
        assert_eq!(queue.queued_len(), 1);
        assert_eq!(queue.in_flight().map(|e| e.event_id), Some(EventId(2)));

        // Duplicate of the first ack is a no-op.
        assert!(!queue.on_client_acked_event(ClientId(1), EventId(1)));
        assert!(queue.on_client_acked_event(ClientId(1), EventId(2)));
        assert_eq!(*log.borrow(), vec!["1:1", "1:2", "1:3"]);
        assert_eq!(queue.queued_len(), 0);
    }

    #[test]
    fn callback_runs_immediately_when_idle() {
        let (mut queue, _host, _log) = setup();
        let ran = Rc::new(RefCell::new(false));
        let flag = ran.clone();
        queue.notify_when_ready_to_dispatch(move |_| *flag.borrow_mut() = true);
        assert!(*ran.borrow());
        assert_eq!(queue.queued_len(), 0);
    }

    #[test]
    fn callbacks_keep_their_place_among_events() {
        let (mut queue, host, log) = setup();
        queue.dispatch_or_queue_event(host, &key(1));

        let cb_log = log.clone();
        queue.notify_when_ready_to_dispatch(move |_| cb_log.borrow_mut().push("cb".into()));
        queue.dispatch_or_queue_event(host, &key(2));
        assert_eq!(queue.queued_len(), 2);

        queue.on_client_acked_event(ClientId(1), EventId(1));
        assert_eq!(*log.borrow(), vec!["1:1", "cb", "1:2"]);
    }

    #[test]
    fn destroyed_client_unblocks_queue() {
        let (mut queue, host, log) = setup();
        queue.dispatch_or_queue_event(host, &key(1));
        queue.dispatch_or_queue_event(host, &key(2));

        queue.on_will_destroy_client(ClientId(7));
        assert_eq!(queue.queued_len(), 1);

        queue.on_will_destroy_client(ClientId(1));
        assert_eq!(*log.borrow(), vec!["1:1", "1:2"]);
        assert_eq!(queue.queued_len(), 0);
    }

    #[test]
    fn ack_timeout_is_opt_in() {
        let (mut queue, host, _log) = setup();
        queue.dispatch_or_queue_event(host, &key(1));
        assert_eq!(queue.ack_deadline(), None);
        assert!(!queue.check_ack_timeout(Instant::now() + Duration::from_secs(3600)));
        assert!(queue.in_flight().is_some());
    }

    #[test]
    fn ack_timeout_forces_drain() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut queue = EventQueue::new(EventQueueConfig {
            ack_timeout: Some(Duration::from_millis(500)),
        });
        let host = queue.register_host(Box::new(RemoteHost {
            client: ClientId(3),
            next_event: 0,
            log: log.clone(),
        }));
        queue.dispatch_or_queue_event(host, &key(1));
        queue.dispatch_or_queue_event(host, &key(2));

        let deadline = queue.ack_deadline().unwrap();
        assert!(!queue.check_ack_timeout(deadline - Duration::from_millis(1)));
        assert!(queue.check_ack_timeout(deadline));
        assert_eq!(*log.borrow(), vec!["3:1", "3:2"]);
        assert_eq!(queue.in_flight().map(|e| e.event_id), Some(EventId(2)));
    }
}
