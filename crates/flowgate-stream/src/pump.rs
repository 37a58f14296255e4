/// Read pump: streams one blob (or a byte range of it) into a data pipe.
///
/// The pump sizes the blob, applies the range, optionally fetches side data
/// and then alternates between asking the pipe for space and reading into
/// it. It waits on exactly one thing at a time: the size, the side data, a
/// read, or pipe space. Once streaming starts, the consumer closing its end
/// preempts whatever the pump is waiting on.

use std::task::Poll;
use std::time::Instant;

use bytes::Bytes;
use flowgate_types::{ByteRange, Completion, NetError};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::ReadPumpConfig;
use crate::logging::{PumpEvent, PumpLog};
use crate::notifier::{CompletionNotifier, ReadPumpDelegate, SideDataRequest};
use crate::pipe::{BeginWrite, DataPipeProducer, PeerClosedWatch};
use crate::reader::BlobReader;
use crate::size::{ResolvedSize, resolve_size};

/// Where a pump is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    Init,
    SizingInFlight,
    SideDataInFlight,
    Streaming,
    Completed,
}

/// Final status of a pump run, as also reported to the delegate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpOutcome {
    pub result: Completion,
    pub total_written: u64,
}

/// One streaming session.
pub struct ReadPump<R, D: ReadPumpDelegate> {
    id: Uuid,
    state: PumpState,
    range: ByteRange,
    reader: R,
    producer: Option<DataPipeProducer>,
    notifier: CompletionNotifier<D>,
    config: ReadPumpConfig,
    started: Instant,
}

impl<R: BlobReader, D: ReadPumpDelegate> ReadPump<R, D> {
    pub fn new(
        reader: R,
        range: ByteRange,
        producer: DataPipeProducer,
        delegate: D,
        config: ReadPumpConfig,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: PumpState::Init,
            range,
            reader,
            producer: Some(producer),
            notifier: CompletionNotifier::new(delegate),
            config,
            started: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> PumpState {
        self.state
    }

    /// Peer-closed watch on the pipe, while the pump still holds the producer.
    pub fn peer_closed_watch(&self) -> Option<PeerClosedWatch> {
        self.producer.as_ref().map(DataPipeProducer::peer_closed_watch)
    }

    /// Run the session on its own tokio task.
    pub fn spawn(self) -> JoinHandle<PumpOutcome>
    where
        R: 'static,
        D: 'static,
    {
        tokio::spawn(self.run())
    }

    /// Run the session to completion. The delegate hears `on_complete` exactly
    /// once, also when this future is dropped before finishing.
    pub async fn run(mut self) -> PumpOutcome {
        self.started = Instant::now();
        let result = self.drive().await;
        self.finish(result)
    }

    async fn drive(&mut self) -> Completion {
        if let Some(err) = self.reader.net_error() {
            return Err(err);
        }

        self.state = PumpState::SizingInFlight;
        let ResolvedSize { total_size, window } = resolve_size(&mut self.reader, &self.range).await?;
        self.log(PumpEvent::SizeCalculated {
            total_size,
            offset: window.offset,
            length: window.length,
        });

        let request = self.notifier.delegate_mut().did_calculate_size(total_size, window.length);
        if request == SideDataRequest::Request {
            let side_data = if self.reader.has_side_data() {
                self.state = PumpState::SideDataInFlight;
                self.reader.read_side_data().await?
            } else {
                None
            };
            self.log(PumpEvent::SideDataRead { bytes: side_data.as_ref().map_or(0, Bytes::len) });
            self.notifier.delegate_mut().did_read_side_data(side_data);
        }

        let producer = self.producer.take().ok_or(NetError::Unexpected)?;
        self.state = PumpState::Streaming;
        self.stream(producer).await
    }

    /// The write/read loop. Owns the producer, or the single pending write
    /// holding it, until the pipe is closed.
    async fn stream(&mut self, mut producer: DataPipeProducer) -> Completion {
        let peer_closed = producer.peer_closed_watch();

        loop {
            if peer_closed.is_closed() {
                return Err(self.peer_closed());
            }

            let mut pending = match producer.begin_write(self.config.max_chunk_size()) {
                BeginWrite::Ready(pending) => pending,
                BeginWrite::ShouldWait(waiting) => {
                    self.log(PumpEvent::WaitingForWritable);
                    let closed = tokio::select! {
                        biased;
                        _ = peer_closed.wait() => true,
                        _ = waiting.writable() => false,
                    };
                    if closed {
                        return Err(self.peer_closed());
                    }
                    producer = waiting;
                    continue;
                }
                BeginWrite::Broken => return Err(self.broken_pipe(&peer_closed)),
            };

            let max = pending.capacity();
            let (read, sync) = {
                let read = self.reader.read(&mut pending.buffer_mut()[..max]);
                tokio::pin!(read);
                match futures_util::poll!(read.as_mut()) {
                    Poll::Ready(result) => (Some(result), true),
                    Poll::Pending => {
                        let result = tokio::select! {
                            biased;
                            _ = peer_closed.wait() => None,
                            result = &mut read => Some(result),
                        };
                        (result, false)
                    }
                }
            };

            let Some(read) = read else {
                drop(pending);
                return Err(self.peer_closed());
            };

            match read {
                Err(err) => {
                    pending.complete(0).close();
                    return Err(err);
                }
                Ok(0) => {
                    pending.complete(0).close();
                    self.log(PumpEvent::EndOfStream);
                    return Ok(());
                }
                Ok(n) => {
                    let n = n.min(max);
                    self.notifier.delegate_mut().did_read(n);
                    producer = pending.complete(n);
                    self.notifier.record_written(n as u64);
                    self.log(PumpEvent::ChunkWritten {
                        bytes: n,
                        total_written: self.notifier.total_written(),
                        sync,
                    });
                    // A fast source must not starve the consumer or other tasks.
                    if sync {
                        tokio::task::yield_now().await;
                    }
                }
            }
        }
    }

    /// The pipe only breaks when the consumer is gone, which can race the
    /// closed check at the top of the loop.
    fn broken_pipe(&self, peer_closed: &PeerClosedWatch) -> NetError {
        if peer_closed.is_closed() {
            self.peer_closed()
        } else {
            NetError::Unexpected
        }
    }

    fn peer_closed(&self) -> NetError {
        self.log(PumpEvent::PeerClosed);
        NetError::Aborted
    }

    fn finish(&mut self, result: Completion) -> PumpOutcome {
        // Close the pipe before the delegate hears the status.
        self.producer = None;
        self.state = PumpState::Completed;

        let total_written = self.notifier.total_written();
        self.log(PumpEvent::Complete {
            result: result.err().map(|e| e.to_string()),
            total_written,
            duration_ms: self.started.elapsed().as_millis() as u64,
        });
        self.notifier.notify(result);
        PumpOutcome { result, total_written }
    }

    fn log(&self, event: PumpEvent) {
        self.config.logger.log(PumpLog {
            component: "read_pump",
            session_id: self.id,
            event,
        });
    }
}
