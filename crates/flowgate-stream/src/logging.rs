/// Pump logging trait for structured session logs.
///
/// Every read pump reports its lifecycle through a `PumpLogger`, so tests
/// and embedders can observe a session without scraping log output.

use std::fmt;

use uuid::Uuid;

/// Structured log entry for a read pump session.
#[derive(Debug, Clone)]
pub struct PumpLog {
    pub component: &'static str,
    pub session_id: Uuid,
    pub event: PumpEvent,
}

/// Pump events that can be logged.
#[derive(Debug, Clone, PartialEq)]
pub enum PumpEvent {
    /// Blob size known and the requested range resolved
    SizeCalculated {
        total_size: u64,
        offset: u64,
        length: u64,
    },
    /// Side data read (or found absent)
    SideDataRead {
        bytes: usize,
    },
    /// Pipe full; waiting for the consumer to drain
    WaitingForWritable,
    /// A chunk was committed to the pipe
    ChunkWritten {
        bytes: usize,
        total_written: u64,
        sync: bool,
    },
    /// Blob exhausted, pipe closed by the producer
    EndOfStream,
    /// Consumer closed its end
    PeerClosed,
    /// Session finished
    Complete {
        result: Option<String>,
        total_written: u64,
        duration_ms: u64,
    },
}

impl fmt::Display for PumpEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeCalculated { total_size, offset, length } => {
                write!(f, "size_calculated total={} offset={} length={}", total_size, offset, length)
            }
            Self::SideDataRead { bytes } => {
                write!(f, "side_data_read bytes={}", bytes)
            }
            Self::WaitingForWritable => {
                write!(f, "waiting_for_writable")
            }
            Self::ChunkWritten { bytes, total_written, sync } => {
                write!(f, "chunk_written bytes={} total={} sync={}", bytes, total_written, sync)
            }
            Self::EndOfStream => {
                write!(f, "end_of_stream")
            }
            Self::PeerClosed => {
                write!(f, "peer_closed")
            }
            Self::Complete { result, total_written, duration_ms } => match result {
                None => write!(f, "complete ok bytes={} duration_ms={}", total_written, duration_ms),
                Some(err) => write!(
                    f,
                    "complete error=\"{}\" bytes={} duration_ms={}",
                    err, total_written, duration_ms
                ),
            },
        }
    }
}

/// Trait for pump logging. Implementations can write to tracing, collect
/// entries for inspection, or discard them.
pub trait PumpLogger: Send + Sync {
    fn log(&self, entry: PumpLog);
}

/// Logger that uses the `tracing` crate.
pub struct TracingLogger;

impl PumpLogger for TracingLogger {
    fn log(&self, entry: PumpLog) {
        // Use info for session outcomes, debug for per-chunk spam
        match &entry.event {
            PumpEvent::PeerClosed | PumpEvent::Complete { .. } => {
                tracing::info!(
                    component = entry.component,
                    session_id = %entry.session_id,
                    "{}",
                    entry.event,
                );
            }
            _ => {
                tracing::debug!(
                    component = entry.component,
                    session_id = %entry.session_id,
                    "{}",
                    entry.event,
                );
            }
        }
    }
}

/// No-op logger that discards all log entries.
pub struct NullLogger;

impl PumpLogger for NullLogger {
    fn log(&self, _entry: PumpLog) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_key_value() {
        let e = PumpEvent::ChunkWritten { bytes: 10, total_written: 30, sync: true };
        assert_eq!(e.to_string(), "chunk_written bytes=10 total=30 sync=true");

        let e = PumpEvent::Complete {
            result: Some("operation aborted".into()),
            total_written: 5,
            duration_ms: 1,
        };
        assert_eq!(e.to_string(), "complete error=\"operation aborted\" bytes=5 duration_ms=1");
    }
}
