//! Error types for workload generation and replay.

use std::fmt;
use std::io;

use stream::{LimitKind, StreamError};

/// Result type for workload operations.
pub type WorkloadResult<T> = Result<T, WorkloadError>;

/// Errors raised while generating or replaying a workload.
#[derive(Debug)]
#[non_exhaustive]
pub enum WorkloadError {
    /// Reading or writing the block stream failed.
    Stream(StreamError),

    /// The consumer of the replay queue went away.
    QueueClosed { batches_sent: u64 },

    /// A drawn length does not fit in memory on this platform.
    LengthTooLarge { value: u64 },

    /// The workload could draw a block the replay limits would reject.
    ExceedsLimits {
        kind: LimitKind,
        limit: usize,
        requested: u64,
    },
}

impl fmt::Display for WorkloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream(err) => write!(f, "{err}"),
            Self::QueueClosed { batches_sent } => {
                write!(f, "replay queue closed after {batches_sent} batches")
            }
            Self::LengthTooLarge { value } => {
                write!(f, "length {value} does not fit in memory")
            }
            Self::ExceedsLimits {
                kind,
                limit,
                requested,
            } => {
                write!(f, "workload {kind} up to {requested} exceeds replay limit {limit}")
            }
        }
    }
}

impl std::error::Error for WorkloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Stream(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StreamError> for WorkloadError {
    fn from(err: StreamError) -> Self {
        Self::Stream(err)
    }
}

impl From<io::Error> for WorkloadError {
    fn from(err: io::Error) -> Self {
        Self::Stream(StreamError::Io(err))
    }
}
