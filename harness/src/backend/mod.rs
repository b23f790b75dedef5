//! Storage backends under benchmark.
//!
//! Every backend implements [`Backend`]. [`BackendKind`] maps the string ids
//! accepted on the command line onto concrete implementations.

mod bolt;
mod kv;
mod leveldb;
mod noop;

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use rows::{Row, RowError, RowKey};
use tracing::error;

use crate::error::{BackendResult, HarnessError};

pub use bolt::BoltBackend;
pub use kv::KvBackend;
pub use leveldb::LevelDbBackend;
pub use noop::NoopBackend;

/// Capability contract shared by every storage backend.
pub trait Backend: Send + Sync {
    /// Short id used in logs.
    fn name(&self) -> &'static str;

    /// Releases the backend.
    ///
    /// Unless `force` is set, waits for in-flight sets, deletes and open
    /// scans to finish first. Operations after close fail with
    /// [`BackendError::Closed`](crate::BackendError::Closed).
    fn close(&self, force: bool) -> BackendResult<()>;

    /// Persists a batch of rows.
    fn set(&self, rows: &[Row]) -> BackendResult<()>;

    /// Removes a key. Removing an absent key is not an error.
    fn delete(&self, key: &RowKey) -> BackendResult<()>;

    /// Starts a full scan in backend-native order.
    fn rows(&self) -> Rows;

    /// Drains a full scan and reports the row count and elapsed time.
    fn timing(&self) -> (u64, Duration) {
        let start = Instant::now();
        let count = self.rows().count() as u64;
        (count, start.elapsed())
    }
}

/// A lazy, single-pass scan over a backend.
///
/// Rows are produced on a dedicated thread and handed over through a bounded
/// channel, so a slow consumer applies back-pressure to the scan. Dropping
/// `Rows` early stops the producer at its next push.
#[derive(Debug)]
pub struct Rows {
    rx: Receiver<Row>,
}

/// Producer side of a [`Rows`] scan.
#[derive(Debug)]
pub struct RowSink {
    tx: Sender<Row>,
}

impl Rows {
    /// Capacity of the channel between a scan producer and its consumer.
    pub const CAPACITY: usize = 1000;

    /// Runs `produce` on a new thread and returns the rows it pushes.
    ///
    /// If the thread cannot be started the scan yields a single
    /// error-bearing row.
    pub fn spawn<F>(name: &str, produce: F) -> Self
    where
        F: FnOnce(&RowSink) + Send + 'static,
    {
        let (tx, rx) = bounded(Self::CAPACITY);
        let spawned = thread::Builder::new()
            .name(format!("kvbench-{name}-scan"))
            .spawn(move || {
                let sink = RowSink { tx };
                produce(&sink);
            });
        match spawned {
            Ok(_) => Self { rx },
            Err(err) => {
                error!(backend = name, error = %err, "failed to spawn scan thread");
                Self::failed(RowError::Source {
                    reason: format!("failed to spawn scan thread: {err}"),
                })
            }
        }
    }

    /// A scan that yields nothing.
    #[must_use]
    pub fn empty() -> Self {
        let (_, rx) = bounded(0);
        Self { rx }
    }

    /// A scan that yields one error-bearing row and ends.
    #[must_use]
    pub fn failed(error: RowError) -> Self {
        let (tx, rx) = bounded(1);
        let _ = tx.send(Row::failed(error));
        Self { rx }
    }
}

impl Iterator for Rows {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.rx.recv().ok()
    }
}

impl RowSink {
    /// Hands a row to the consumer, blocking while the channel is full.
    ///
    /// Returns `false` once the consumer has dropped its [`Rows`]; the
    /// producer should stop.
    pub fn push(&self, row: Row) -> bool {
        self.tx.send(row).is_ok()
    }

    /// Pushes an enumeration failure. The producer should stop afterwards.
    pub fn fail(&self, reason: impl fmt::Display) {
        let _ = self.push(Row::failed(RowError::Source {
            reason: reason.to_string(),
        }));
    }
}

/// Counts operations that `close(false)` must wait for.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

/// Marks one in-flight operation until dropped.
#[derive(Debug)]
pub(crate) struct InFlightGuard {
    owner: Arc<InFlight>,
}

impl InFlight {
    pub(crate) fn enter(self: &Arc<Self>) -> InFlightGuard {
        *self.count.lock() += 1;
        InFlightGuard {
            owner: Arc::clone(self),
        }
    }

    pub(crate) fn wait_idle(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.idle.wait(&mut count);
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut count = self.owner.count.lock();
        *count -= 1;
        if *count == 0 {
            self.owner.idle.notify_all();
        }
    }
}

/// The backends selectable by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Single-file transactional B-tree (SQLite).
    Bolt,
    /// Ordered in-memory map with an on-disk snapshot.
    Kv,
    /// [`Kv`](Self::Kv) with the harness's shared read/write lock enabled.
    KvMu,
    /// LSM-tree store (fjall).
    LevelDb,
    /// Counts rows and stores nothing.
    Noop,
}

impl BackendKind {
    pub const ALL: [Self; 5] = [Self::Bolt, Self::Kv, Self::KvMu, Self::LevelDb, Self::Noop];

    /// The id accepted by [`FromStr`].
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Bolt => "bolt",
            Self::Kv => "kv",
            Self::KvMu => "kv-mu",
            Self::LevelDb => "leveldb",
            Self::Noop => "noop",
        }
    }

    /// Whether the harness serializes writes against scans for this backend.
    #[must_use]
    pub const fn shared_lock(self) -> bool {
        matches!(self, Self::KvMu)
    }

    /// Opens (or creates) the backend's database at `path`.
    pub fn open(self, path: &Path) -> BackendResult<Arc<dyn Backend>> {
        let backend: Arc<dyn Backend> = match self {
            Self::Bolt => Arc::new(BoltBackend::open(path)?),
            Self::Kv | Self::KvMu => Arc::new(KvBackend::open_as(path, self.id())?),
            Self::LevelDb => Arc::new(LevelDbBackend::open(path)?),
            Self::Noop => Arc::new(NoopBackend::new()),
        };
        Ok(backend)
    }
}

impl FromStr for BackendKind {
    type Err = HarnessError;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.id() == id)
            .ok_or_else(|| HarnessError::UnknownBackend(id.to_string()))
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
