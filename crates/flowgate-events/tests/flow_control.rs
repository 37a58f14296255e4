/// Integration tests: several hosts sharing one event queue.
///
/// Each test host records every event it dispatches into a shared log so the
/// tests can check global dispatch order across hosts and callbacks.

use std::cell::RefCell;
use std::rc::Rc;

use flowgate_events::{DispatchOutcome, Disposition, EventHost, EventQueue, QueuedItem};
use flowgate_types::{ClientId, EventId, HostId, InputEvent, KeyEvent, ScrollEvent, TargetId};

type Log = Rc<RefCell<Vec<String>>>;

struct TestHost {
    name: &'static str,
    client: ClientId,
    remote: bool,
    next_event: Rc<RefCell<u32>>,
    log: Log,
}

impl EventHost for TestHost {
    fn find_key_target(&self) -> Option<TargetId> {
        Some(TargetId(u64::from(self.client.0)))
    }

    fn has_remote_client(&self, _target: TargetId) -> bool {
        self.remote
    }

    fn dispatch_event(&mut self, event: &InputEvent) -> DispatchOutcome {
        let label = match event {
            InputEvent::Key(k) => format!("{}:{}", self.name, k.key_code),
            other => format!("{}:{}", self.name, other.kind_name()),
        };
        self.log.borrow_mut().push(label);
        if !self.remote {
            return DispatchOutcome::Handled;
        }
        let mut next = self.next_event.borrow_mut();
        *next += 1;
        DispatchOutcome::SentToClient { client_id: self.client, event_id: EventId(*next) }
    }
}

struct Harness {
    queue: EventQueue,
    log: Log,
    next_event: Rc<RefCell<u32>>,
}

impl Harness {
    fn new() -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        Self {
            queue: EventQueue::default(),
            log: Rc::new(RefCell::new(Vec::new())),
            next_event: Rc::new(RefCell::new(0)),
        }
    }

    fn host(&mut self, name: &'static str, client: u32, remote: bool) -> HostId {
        self.queue.register_host(Box::new(TestHost {
            name,
            client: ClientId(client),
            remote,
            next_event: self.next_event.clone(),
            log: self.log.clone(),
        }))
    }

    fn send(&mut self, host: HostId, code: u32) -> Disposition {
        self.queue.dispatch_or_queue_event(host, &key(code))
    }

    fn log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    fn queued_hosts(&self) -> Vec<Option<HostId>> {
        self.queue.pending().iter().map(QueuedItem::host).collect()
    }
}

fn key(code: u32) -> InputEvent {
    InputEvent::Key(KeyEvent::pressed(code))
}

#[test]
fn queued_events_dispatch_in_enqueue_order() {
    let mut h = Harness::new();
    let a = h.host("a", 1, true);

    assert!(matches!(h.send(a, 0), Disposition::Dispatched(_)));
    for code in 1..=5 {
        assert_eq!(h.send(a, code), Disposition::Queued);
        assert_eq!(h.queue.queued_len(), code as usize);
    }

    // Each ack releases exactly one event, since each one goes in flight again.
    for expected_event in 1..=6u32 {
        let current = *h.queue.in_flight().unwrap();
        assert_eq!(current.event_id, EventId(expected_event));
        h.queue.on_client_acked_event(current.client_id, current.event_id);
        assert_eq!(h.queue.queued_len(), (5 - expected_event.min(5)) as usize);
    }

    assert_eq!(h.log(), vec!["a:0", "a:1", "a:2", "a:3", "a:4", "a:5"]);
    assert!(h.queue.in_flight().is_none());
}

#[test]
fn local_target_is_not_held_back() {
    let mut h = Harness::new();
    let remote = h.host("r", 1, true);
    let local = h.host("l", 2, false);

    h.send(remote, 1);
    assert!(h.queue.in_flight().is_some());
    assert_eq!(h.send(local, 2), Disposition::Dispatched(DispatchOutcome::Handled));
    assert_eq!(h.log(), vec!["r:1", "l:2"]);
}

#[test]
fn non_key_events_bypass_the_queue() {
    let mut h = Harness::new();
    let a = h.host("a", 1, true);
    h.send(a, 1);

    let scroll = InputEvent::Scroll(ScrollEvent { x: 0.0, y: 0.0, delta_x: 0.0, delta_y: 1.0 });
    assert!(!h.queue.should_queue_event(a, &scroll));
    h.queue.dispatch_or_queue_event(a, &scroll);
    assert_eq!(h.log(), vec!["a:1", "a:scroll"]);
    // The scroll went to the client but did not replace the in-flight key event.
    assert_eq!(h.queue.in_flight().map(|e| e.event_id), Some(EventId(1)));
}

#[test]
fn removing_in_flight_host_purges_and_drains() {
    let mut h = Harness::new();
    let a = h.host("a", 1, true);
    let b = h.host("b", 2, true);

    h.send(a, 0);
    assert_eq!(h.send(a, 1), Disposition::Queued);
    assert_eq!(h.send(b, 2), Disposition::Queued);
    assert_eq!(h.send(a, 3), Disposition::Queued);
    assert_eq!(h.queued_hosts(), vec![Some(a), Some(b), Some(a)]);

    assert!(h.queue.unregister_host(a));

    // Only b's event survived the purge and the forced ack dispatched it.
    assert_eq!(h.log(), vec!["a:0", "b:2"]);
    assert_eq!(h.queue.queued_len(), 0);
    let current = h.queue.in_flight().unwrap();
    assert_eq!((current.host, current.client_id), (b, ClientId(2)));
    assert!(!h.queue.contains_host(a));
    assert_eq!(h.queue.host_count(), 1);
}

#[test]
fn removing_idle_host_keeps_others_queued() {
    let mut h = Harness::new();
    let a = h.host("a", 1, true);
    let b = h.host("b", 2, true);
    let c = h.host("c", 3, true);

    h.send(a, 0);
    h.send(b, 1);
    h.send(c, 2);
    h.send(b, 3);
    h.send(c, 4);

    assert!(h.queue.unregister_host(b));
    assert_eq!(h.queued_hosts(), vec![Some(c), Some(c)]);
    // a still owns the in-flight event; nothing was drained.
    assert_eq!(h.log(), vec!["a:0"]);
    assert_eq!(h.queue.in_flight().map(|e| e.host), Some(a));
    assert!(!h.queue.unregister_host(b));
}

#[test]
fn callbacks_survive_host_removal() {
    let mut h = Harness::new();
    let a = h.host("a", 1, true);
    let b = h.host("b", 2, true);

    h.send(a, 0);
    h.send(a, 1);
    let log = h.log.clone();
    h.queue.notify_when_ready_to_dispatch(move |_| log.borrow_mut().push("ready".into()));
    h.send(b, 2);

    h.queue.unregister_host(a);
    assert_eq!(h.log(), vec!["a:0", "ready", "b:2"]);
}

#[test]
fn callback_can_dispatch_through_the_queue() {
    let mut h = Harness::new();
    let a = h.host("a", 1, true);
    h.send(a, 0);

    h.queue.notify_when_ready_to_dispatch(move |queue| {
        queue.dispatch_or_queue_event(a, &key(42));
    });
    h.send(a, 1);

    h.queue.on_client_acked_event(ClientId(1), EventId(1));
    // The callback's event went in flight, so the queued event keeps waiting.
    assert_eq!(h.log(), vec!["a:0", "a:42"]);
    assert_eq!(h.queue.queued_len(), 1);

    h.queue.on_client_acked_event(ClientId(1), EventId(2));
    assert_eq!(h.log(), vec!["a:0", "a:42", "a:1"]);
}

#[test]
fn unknown_host_is_reported() {
    let mut h = Harness::new();
    assert_eq!(h.send(HostId(404), 1), Disposition::UnknownHost);
    assert!(h.log().is_empty());
}
