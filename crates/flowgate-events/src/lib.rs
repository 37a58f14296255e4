/// Flowgate event flow control.
///
/// Serializes input events headed for remote clients so that at most one
/// key event is unacknowledged at a time:
/// - `HostRegistry`: hosts owned by the controller, looked up by `HostId`
/// - `PendingQueue`: one FIFO of held-back events and ready callbacks
/// - `EventQueue`: in-flight bookkeeping, queue-or-dispatch, drain on ack

pub mod host;
pub mod pending;
pub mod queue;

pub use host::{DispatchOutcome, EventHost, HostRegistry};
pub use pending::{PendingQueue, QueuedItem, ReadyCallback};
pub use queue::{Disposition, EventQueue, EventQueueConfig, InFlightEvent};
