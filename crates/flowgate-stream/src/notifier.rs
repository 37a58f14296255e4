use bytes::Bytes;
use flowgate_types::{Completion, NetError};

/// Whether the delegate wants the blob's side data before streaming starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideDataRequest {
    Request,
    Skip,
}

/// Receives progress and the final status of a read pump.
pub trait ReadPumpDelegate: Send {
    /// Called once the size is known and the range applied. `content_length`
    /// is the number of bytes that will be streamed.
    fn did_calculate_size(&mut self, _total_size: u64, _content_length: u64) -> SideDataRequest {
        SideDataRequest::Skip
    }

    /// Called with the side data when it was requested; `None` if the blob has none.
    fn did_read_side_data(&mut self, _side_data: Option<Bytes>) {}

    /// Called for every non-empty read, before the bytes are committed.
    fn did_read(&mut self, _num_bytes: usize) {}

    /// Final status and the number of bytes committed to the pipe.
    fn on_complete(&mut self, result: Completion, total_written: u64);
}

/// Owns the delegate and guarantees `on_complete` runs exactly once.
///
/// If the session is torn down without an explicit status (the pump task was
/// cancelled or dropped), the delegate hears `Aborted` on drop.
pub struct CompletionNotifier<D: ReadPumpDelegate> {
    delegate: D,
    total_written: u64,
    notified: bool,
}

impl<D: ReadPumpDelegate> CompletionNotifier<D> {
    pub fn new(delegate: D) -> Self {
        Self { delegate, total_written: 0, notified: false }
    }

    pub fn delegate_mut(&mut self) -> &mut D {
        &mut self.delegate
    }

    pub fn record_written(&mut self, num_bytes: u64) {
        self.total_written += num_bytes;
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    pub fn is_notified(&self) -> bool {
        self.notified
    }

    /// Report `result`. Returns false if a status was already reported.
    pub fn notify(&mut self, result: Completion) -> bool {
        if self.notified {
            return false;
        }
        self.notified = true;
        self.delegate.on_complete(result, self.total_written);
        true
    }
}

impl<D: ReadPumpDelegate> Drop for CompletionNotifier<D> {
    fn drop(&mut self) {
        self.notify(Err(NetError::Aborted));
    }
}
