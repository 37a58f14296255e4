use std::sync::Arc;

use crate::logging::{PumpLogger, TracingLogger};

/// Largest chunk read from a blob per pipe write (64 KB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Default data pipe capacity (512 KB), eight chunks in flight to the consumer.
pub const DEFAULT_PIPE_CAPACITY: usize = 8 * DEFAULT_CHUNK_SIZE;

/// Configuration for a read pump.
#[derive(Clone)]
pub struct ReadPumpConfig {
    /// Upper bound on a single read, on top of whatever space the pipe offers.
    /// Never zero: an empty read would look like end of stream.
    max_chunk_size: usize,
    /// Structured event sink. `NullLogger` silences the pump.
    pub logger: Arc<dyn PumpLogger>,
}

impl Default for ReadPumpConfig {
    fn default() -> Self {
        ReadPumpConfig {
            max_chunk_size: DEFAULT_CHUNK_SIZE,
            logger: Arc::new(TracingLogger),
        }
    }
}

impl ReadPumpConfig {
    pub fn with_max_chunk_size(mut self, max_chunk_size: usize) -> Self {
        self.max_chunk_size = max_chunk_size.max(1);
        self
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    pub fn with_logger(mut self, logger: Arc<dyn PumpLogger>) -> Self {
        self.logger = logger;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_is_at_least_one_byte() {
        assert_eq!(ReadPumpConfig::default().max_chunk_size(), DEFAULT_CHUNK_SIZE);
        assert_eq!(ReadPumpConfig::default().with_max_chunk_size(0).max_chunk_size(), 1);
        assert_eq!(ReadPumpConfig::default().with_max_chunk_size(7).max_chunk_size(), 7);
    }
}
