use std::io;

use thiserror::Error;

/// Terminal status of a streaming session.
pub type Completion = Result<(), NetError>;

/// Network-style error codes reported by readers, pipes and the read pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NetError {
    #[error("operation failed")]
    Failed,

    /// The consumer went away before the stream finished.
    #[error("operation aborted")]
    Aborted,

    /// The output channel was in a state it should never be in.
    #[error("unexpected error")]
    Unexpected,

    #[error("requested range not satisfiable")]
    RangeNotSatisfiable,

    #[error("file not found")]
    FileNotFound,

    #[error("i/o error: {0}")]
    Io(io::ErrorKind),
}

impl NetError {
    /// True for the status used when the consumer side cancels the session.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

impl From<io::Error> for NetError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => Self::FileNotFound,
            kind => Self::Io(kind),
        }
    }
}

impl From<NetError> for io::Error {
    fn from(e: NetError) -> Self {
        let kind = match e {
            NetError::Io(kind) => kind,
            NetError::FileNotFound => io::ErrorKind::NotFound,
            NetError::Aborted => io::ErrorKind::ConnectionAborted,
            NetError::RangeNotSatisfiable => io::ErrorKind::InvalidInput,
            NetError::Failed | NetError::Unexpected => io::ErrorKind::Other,
        };
        io::Error::new(kind, e)
    }
}
