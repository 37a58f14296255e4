/// Bounded in-process byte pipe with two-phase writes.
///
/// The producer asks for writable space with `begin_write`, which consumes
/// the producer and hands it back inside a `PendingWrite`. Only `complete`
/// returns it, so at most one write can be outstanding per pipe. The
/// consumer drains committed chunks in commit order; dropping either end is
/// observed by the other side (end-of-stream or peer-closed).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::{Bytes, BytesMut};
use futures_util::Stream;
use tokio::sync::Notify;

struct PipeState {
    chunks: VecDeque<Bytes>,
    buffered: usize,
    capacity: usize,
    producer_closed: bool,
    consumer_closed: bool,
}

struct Shared {
    state: Mutex<PipeState>,
    readable: Notify,
    writable: Notify,
    peer_closed: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PipeState> {
        // State stays consistent across a panicking holder; nothing is half-updated.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create a pipe that buffers at most `capacity` bytes (minimum 1).
pub fn data_pipe(capacity: usize) -> (DataPipeProducer, DataPipeConsumer) {
    let shared = Arc::new(Shared {
        state: Mutex::new(PipeState {
            chunks: VecDeque::new(),
            buffered: 0,
            capacity: capacity.max(1),
            producer_closed: false,
            consumer_closed: false,
        }),
        readable: Notify::new(),
        writable: Notify::new(),
        peer_closed: Notify::new(),
    });
    (
        DataPipeProducer { shared: shared.clone() },
        DataPipeConsumer { shared },
    )
}

// ── Producer ────────────────────────────────────────────────────────────

/// Write end of a data pipe. Dropping it closes the pipe for the consumer.
pub struct DataPipeProducer {
    shared: Arc<Shared>,
}

/// Result of asking the pipe for writable space.
pub enum BeginWrite {
    /// Space is available; fill the buffer and `complete` it.
    Ready(PendingWrite),
    /// The pipe is full. Wait for `writable` and try again.
    ShouldWait(DataPipeProducer),
    /// The consumer is gone; the producer has been dropped.
    Broken,
}

impl DataPipeProducer {
    /// Reserve up to `max_len` bytes of the free space for one write.
    /// At least one byte is reserved when the pipe has room.
    pub fn begin_write(self, max_len: usize) -> BeginWrite {
        let available = {
            let state = self.shared.lock();
            if state.consumer_closed {
                None
            } else {
                Some(state.capacity - state.buffered)
            }
        };
        match available {
            None => BeginWrite::Broken,
            Some(0) => BeginWrite::ShouldWait(self),
            Some(free) => BeginWrite::Ready(PendingWrite {
                buf: BytesMut::zeroed(free.min(max_len.max(1))),
                producer: self,
            }),
        }
    }

    /// Resolves once the pipe has free space or the consumer is gone.
    pub async fn writable(&self) {
        loop {
            let notified = self.shared.writable.notified();
            {
                let state = self.shared.lock();
                if state.consumer_closed || state.buffered < state.capacity {
                    return;
                }
            }
            notified.await;
        }
    }

    /// A handle that resolves when the consumer closes, independent of the
    /// producer's own lifetime.
    pub fn peer_closed_watch(&self) -> PeerClosedWatch {
        PeerClosedWatch { shared: self.shared.clone() }
    }

    pub fn is_peer_closed(&self) -> bool {
        self.shared.lock().consumer_closed
    }

    pub fn capacity(&self) -> usize {
        self.shared.lock().capacity
    }

    /// Close the pipe. Already committed bytes stay readable.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for DataPipeProducer {
    fn drop(&mut self) {
        self.shared.lock().producer_closed = true;
        self.shared.readable.notify_waiters();
    }
}

/// Outstanding write: owns the producer until `complete` hands it back.
pub struct PendingWrite {
    buf: BytesMut,
    producer: DataPipeProducer,
}

impl PendingWrite {
    /// Bytes that may be written into this buffer.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buf[..]
    }

    /// Commit the first `num_bytes` of the buffer and get the producer back.
    /// `complete(0)` commits nothing.
    pub fn complete(self, num_bytes: usize) -> DataPipeProducer {
        let PendingWrite { mut buf, producer } = self;
        debug_assert!(num_bytes <= buf.len());
        let num_bytes = num_bytes.min(buf.len());
        if num_bytes > 0 {
            buf.truncate(num_bytes);
            let mut state = producer.shared.lock();
            if !state.consumer_closed {
                state.buffered += num_bytes;
                state.chunks.push_back(buf.freeze());
            }
            drop(state);
            producer.shared.readable.notify_waiters();
        }
        producer
    }
}

/// Resolves when the consumer end of a pipe is closed.
#[derive(Clone)]
pub struct PeerClosedWatch {
    shared: Arc<Shared>,
}

impl PeerClosedWatch {
    pub async fn wait(&self) {
        loop {
            let notified = self.shared.peer_closed.notified();
            if self.shared.lock().consumer_closed {
                return;
            }
            notified.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().consumer_closed
    }
}

// ── Consumer ────────────────────────────────────────────────────────────

/// Read end of a data pipe. Dropping it signals peer-closed to the producer.
pub struct DataPipeConsumer {
    shared: Arc<Shared>,
}

impl DataPipeConsumer {
    /// Next committed chunk, or `None` once the producer closed and the pipe is drained.
    pub async fn read(&mut self) -> Option<Bytes> {
        loop {
            let notified = self.shared.readable.notified();
            {
                let mut state = self.shared.lock();
                if let Some(chunk) = state.chunks.pop_front() {
                    state.buffered -= chunk.len();
                    drop(state);
                    self.shared.writable.notify_waiters();
                    return Some(chunk);
                }
                if state.producer_closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Drain the pipe until the producer closes it.
    pub async fn read_to_end(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = self.read().await {
            out.extend_from_slice(&chunk);
        }
        out
    }

    /// Bytes committed but not yet read.
    pub fn buffered(&self) -> usize {
        self.shared.lock().buffered
    }

    pub fn is_producer_closed(&self) -> bool {
        self.shared.lock().producer_closed
    }

    /// Adapt into a `Stream` of chunks, e.g. for an HTTP response body.
    pub fn into_stream(self) -> impl Stream<Item = Bytes> + Send + 'static {
        futures_util::stream::unfold(self, |mut consumer| async move {
            consumer.read().await.map(|chunk| (chunk, consumer))
        })
    }

    /// Close the read end; the producer sees peer-closed.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for DataPipeConsumer {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock();
            state.consumer_closed = true;
            state.chunks.clear();
            state.buffered = 0;
        }
        self.shared.peer_closed.notify_waiters();
        self.shared.writable.notify_waiters();
    }
}
