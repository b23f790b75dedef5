//! Error types carried in-band on rows.

use std::fmt;

/// Which half of a row failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowField {
    Key,
    Value,
}

/// Errors attached to a [`Row`](crate::Row) produced by a backend scan.
///
/// A scan never stops because of a bad record; the failure travels with the
/// row instead.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RowError {
    /// The key or value could not be produced from the backend's native data.
    Decode { field: RowField, reason: String },

    /// The backend's enumeration itself failed.
    Source { reason: String },
}

impl fmt::Display for RowField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Key => "key",
            Self::Value => "value",
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode { field, reason } => write!(f, "failed to decode row {field}: {reason}"),
            Self::Source { reason } => write!(f, "row enumeration failed: {reason}"),
        }
    }
}

impl std::error::Error for RowError {}
