use std::path::Path;
use std::sync::Arc;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use parking_lot::RwLock;
use rows::{Row, RowError, RowKey};
use tracing::debug;

use super::{Backend, InFlight, Rows};
use crate::error::{BackendError, BackendResult};

const PARTITION: &str = "rows";

/// Largest key the LSM tree accepts.
pub const MAX_KEY_LEN: usize = u16::MAX as usize;

struct Lsm {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

/// LSM-tree store backed by fjall.
///
/// Each [`set`](Backend::set) is one atomic write batch. Closing flushes the
/// journal to disk.
pub struct LevelDbBackend {
    lsm: RwLock<Option<Lsm>>,
    in_flight: Arc<InFlight>,
}

impl std::fmt::Debug for LevelDbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelDbBackend")
            .field("open", &self.lsm.read().is_some())
            .finish_non_exhaustive()
    }
}

impl LevelDbBackend {
    /// Opens or creates the store in directory `path`.
    pub fn open(path: impl AsRef<Path>) -> BackendResult<Self> {
        let path = path.as_ref();
        let keyspace = Config::new(path)
            .open()
            .map_err(|err| BackendError::open(path, err))?;
        let partition = keyspace
            .open_partition(PARTITION, PartitionCreateOptions::default())
            .map_err(|err| BackendError::open(path, err))?;
        debug!(backend = "leveldb", path = %path.display(), "opened keyspace");
        Ok(Self {
            lsm: RwLock::new(Some(Lsm {
                keyspace,
                partition,
            })),
            in_flight: Arc::default(),
        })
    }
}

fn check_key(key: &RowKey) -> BackendResult<()> {
    if key.is_empty() {
        return Err(BackendError::EmptyKey);
    }
    if key.len() > MAX_KEY_LEN {
        return Err(BackendError::KeyTooLarge {
            len: key.len(),
            max: MAX_KEY_LEN,
        });
    }
    Ok(())
}

impl Backend for LevelDbBackend {
    fn name(&self) -> &'static str {
        "leveldb"
    }

    fn close(&self, force: bool) -> BackendResult<()> {
        if !force {
            self.in_flight.wait_idle();
        }
        let lsm = self.lsm.write().take().ok_or(BackendError::Closed)?;
        lsm.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }

    fn set(&self, rows: &[Row]) -> BackendResult<()> {
        let _op = self.in_flight.enter();
        for row in rows {
            check_key(&row.key)?;
        }
        let guard = self.lsm.read();
        let lsm = guard.as_ref().ok_or(BackendError::Closed)?;
        let mut batch = lsm.keyspace.batch();
        for row in rows {
            batch.insert(&lsm.partition, row.key.bytes(), row.value.bytes());
        }
        batch.commit()?;
        Ok(())
    }

    fn delete(&self, key: &RowKey) -> BackendResult<()> {
        let _op = self.in_flight.enter();
        let guard = self.lsm.read();
        let lsm = guard.as_ref().ok_or(BackendError::Closed)?;
        if key.is_empty() {
            return Ok(());
        }
        lsm.partition.remove(key.as_slice())?;
        Ok(())
    }

    fn rows(&self) -> Rows {
        let Some(partition) = self.lsm.read().as_ref().map(|lsm| lsm.partition.clone()) else {
            return Rows::failed(RowError::Source {
                reason: BackendError::Closed.to_string(),
            });
        };
        let op = self.in_flight.enter();
        Rows::spawn(self.name(), move |sink| {
            let _op = op;
            for item in partition.iter() {
                match item {
                    Ok((key, value)) => {
                        if !sink.push(Row::decode(&key, &value)) {
                            return;
                        }
                    }
                    Err(err) => {
                        sink.fail(err);
                        return;
                    }
                }
            }
        })
    }
}
