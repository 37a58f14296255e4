/// Flowgate streaming: pumps blob content into a flow-controlled byte pipe.
///
/// ```text
/// [BlobReader] --read--> [ReadPump] --begin_write/complete--> [DataPipe] --> consumer
///   size, range            one pending buffer at a time          bounded capacity
/// ```
///
/// - `DataPipe`: bounded producer/consumer byte channel with two-phase writes
/// - `BlobReader`: content source (in-memory or file backed)
/// - `resolve_size`: total size + requested range -> read window
/// - `ReadPump`: the read/write loop, driven by writable and peer-closed signals
/// - `CompletionNotifier`: reports the final status to the delegate exactly once

pub mod config;
pub mod logging;
pub mod notifier;
pub mod pipe;
pub mod pump;
pub mod reader;
pub mod size;

// Re-export key types for convenience.
pub use config::{DEFAULT_CHUNK_SIZE, DEFAULT_PIPE_CAPACITY, ReadPumpConfig};
pub use logging::{NullLogger, PumpEvent, PumpLog, PumpLogger, TracingLogger};
pub use notifier::{CompletionNotifier, ReadPumpDelegate, SideDataRequest};
pub use pipe::{BeginWrite, DataPipeConsumer, DataPipeProducer, PeerClosedWatch, PendingWrite, data_pipe};
pub use pump::{PumpOutcome, PumpState, ReadPump};
pub use reader::{BlobReader, FileBlobReader, MemoryBlobReader};
pub use size::{ResolvedSize, resolve_read_window, resolve_size};
