//! Error types for backends and the benchmark harness.

use std::io;
use std::path::PathBuf;

use stream::StreamError;
use thiserror::Error;

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Result type for harness setup.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors reported by a storage backend.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackendError {
    #[error("unable to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("backend is closed")]
    Closed,

    #[error("row key must not be empty")]
    EmptyKey,

    #[error("row key of {len} bytes exceeds the {max} byte limit")]
    KeyTooLarge { len: usize, max: usize },

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("lsm: {0}")]
    Lsm(#[from] fjall::Error),

    #[error("snapshot: {0}")]
    Snapshot(#[from] StreamError),

    #[error("i/o: {0}")]
    Io(#[from] io::Error),

    /// Failure from a backend outside this crate.
    #[error("{0}")]
    Other(String),
}

impl BackendError {
    pub(crate) fn open(
        path: impl Into<PathBuf>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Open {
            path: path.into(),
            source: Box::new(source),
        }
    }
}

/// Errors that stop a benchmark before it starts.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HarnessError {
    #[error("unknown backend id: {0}")]
    UnknownBackend(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: io::Error,
    },
}
