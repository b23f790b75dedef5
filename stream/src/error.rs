//! Error types for block stream operations.

use std::fmt;
use std::io;

/// Result type for block stream operations.
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors raised while reading or writing a block stream.
#[derive(Debug)]
#[non_exhaustive]
pub enum StreamError {
    /// The underlying reader or writer failed.
    Io(io::Error),

    /// Input ended in the middle of a block.
    Truncated { block: u64, field: StreamField },

    /// A length prefix was negative.
    NegativeLength { field: StreamField, value: i64 },

    /// Limits exceeded.
    LimitsExceeded {
        kind: LimitKind,
        limit: usize,
        actual: u64,
    },

    /// A length does not fit in the on-disk `i64` prefix.
    LengthOverflow { length: usize },
}

/// The stream element being processed when an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamField {
    RowCount,
    KeyLength,
    Key,
    ValueLength,
    Value,
}

/// Specific stream limits that can be exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    RowsPerBlock,
    KeyLength,
    ValueLength,
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "stream i/o error: {err}"),
            Self::Truncated { block, field } => {
                write!(f, "stream truncated in block {block} while reading {field}")
            }
            Self::NegativeLength { field, value } => {
                write!(f, "negative {field}: {value}")
            }
            Self::LimitsExceeded {
                kind,
                limit,
                actual,
            } => {
                write!(f, "{kind} limit exceeded: {actual} > {limit}")
            }
            Self::LengthOverflow { length } => write!(f, "length overflow: {length}"),
        }
    }
}

impl fmt::Display for StreamField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RowCount => "row count",
            Self::KeyLength => "key length",
            Self::Key => "key bytes",
            Self::ValueLength => "value length",
            Self::Value => "value bytes",
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RowsPerBlock => "rows per block",
            Self::KeyLength => "key length",
            Self::ValueLength => "value length",
        };
        write!(f, "{name}")
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for StreamError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}
