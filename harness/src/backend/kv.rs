use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use rows::{Row, RowKey, RowValue};
use stream::{BlockReader, BlockWriter};
use tracing::debug;

use super::{Backend, InFlight, Rows};
use crate::error::{BackendError, BackendResult};

/// Rows per block when writing the snapshot file.
const SNAPSHOT_BLOCK_ROWS: usize = 1024;

type Map = BTreeMap<RowKey, RowValue>;

/// Ordered in-memory map persisted to a single snapshot file.
///
/// The snapshot uses the block stream format. It is loaded on open when the
/// file exists and rewritten on close.
#[derive(Debug)]
pub struct KvBackend {
    name: &'static str,
    path: PathBuf,
    map: Arc<RwLock<Option<Map>>>,
    in_flight: Arc<InFlight>,
}

impl KvBackend {
    /// Opens the snapshot at `path`, creating an empty one if missing.
    pub fn open(path: impl AsRef<Path>) -> BackendResult<Self> {
        Self::open_as(path, "kv")
    }

    pub(crate) fn open_as(path: impl AsRef<Path>, name: &'static str) -> BackendResult<Self> {
        let path = path.as_ref().to_path_buf();
        let map = match File::open(&path) {
            Ok(file) => load(file).map_err(|err| BackendError::open(&path, err))?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                File::create(&path).map_err(|err| BackendError::open(&path, err))?;
                Map::new()
            }
            Err(err) => return Err(BackendError::open(&path, err)),
        };
        debug!(backend = name, path = %path.display(), rows = map.len(), "opened snapshot");
        Ok(Self {
            name,
            path,
            map: Arc::new(RwLock::new(Some(map))),
            in_flight: Arc::default(),
        })
    }

    /// Rows currently held.
    pub fn len(&self) -> usize {
        self.map.read().as_ref().map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn load(file: File) -> stream::StreamResult<Map> {
    let mut map = Map::new();
    for block in BlockReader::new(file) {
        for row in block? {
            map.insert(row.key, row.value);
        }
    }
    Ok(map)
}

fn save(path: &Path, map: &Map) -> BackendResult<()> {
    let mut writer = BlockWriter::new(File::create(path)?);
    let entries: Vec<_> = map.iter().collect();
    for chunk in entries.chunks(SNAPSHOT_BLOCK_ROWS) {
        writer.write_row_count(chunk.len())?;
        for (key, value) in chunk {
            writer.write_field(&key.bytes())?;
            writer.write_field(&value.bytes())?;
        }
    }
    writer.finish()?.sync_all()?;
    Ok(())
}

impl Backend for KvBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn close(&self, force: bool) -> BackendResult<()> {
        if !force {
            self.in_flight.wait_idle();
        }
        let Some(map) = self.map.write().take() else {
            return Err(BackendError::Closed);
        };
        save(&self.path, &map)?;
        debug!(backend = self.name, rows = map.len(), "wrote snapshot");
        Ok(())
    }

    fn set(&self, rows: &[Row]) -> BackendResult<()> {
        let _op = self.in_flight.enter();
        let mut guard = self.map.write();
        let map = guard.as_mut().ok_or(BackendError::Closed)?;
        for row in rows {
            map.insert(
                RowKey::decode(&row.key.bytes()),
                RowValue::decode(&row.value.bytes()),
            );
        }
        Ok(())
    }

    fn delete(&self, key: &RowKey) -> BackendResult<()> {
        let _op = self.in_flight.enter();
        self.map
            .write()
            .as_mut()
            .ok_or(BackendError::Closed)?
            .remove(key);
        Ok(())
    }

    fn rows(&self) -> Rows {
        let op = self.in_flight.enter();
        let map = Arc::clone(&self.map);
        Rows::spawn(self.name, move |sink| {
            let _op = op;
            let guard = map.read();
            let Some(map) = guard.as_ref() else {
                sink.fail(BackendError::Closed);
                return;
            };
            for (key, value) in map {
                if !sink.push(Row::decode(key.as_slice(), value.as_slice())) {
                    return;
                }
            }
        })
    }
}
