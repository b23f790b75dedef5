use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rows::{Row, RowError, RowField, RowKey, RowValue};
use rusqlite::{params, Connection, OpenFlags};
use tracing::debug;

use super::{Backend, InFlight, RowSink, Rows};
use crate::error::{BackendError, BackendResult};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Single-file transactional B-tree store backed by SQLite.
///
/// Rows live in one `WITHOUT ROWID` table keyed by the row key, so the
/// table itself is the B-tree. Each [`set`](Backend::set) is one
/// transaction. Scans open their own read-only connection and see a
/// consistent snapshot while writes continue.
#[derive(Debug)]
pub struct BoltBackend {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
    in_flight: Arc<InFlight>,
}

impl BoltBackend {
    /// Opens or creates the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> BackendResult<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|err| BackendError::open(&path, err))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             CREATE TABLE IF NOT EXISTS rows (
                 key   BLOB PRIMARY KEY NOT NULL,
                 value BLOB NOT NULL
             ) WITHOUT ROWID;",
        )
        .map_err(|err| BackendError::open(&path, err))?;
        debug!(backend = "bolt", path = %path.display(), "opened database");
        Ok(Self {
            path,
            conn: Mutex::new(Some(conn)),
            in_flight: Arc::default(),
        })
    }
}

fn scan(path: &Path, sink: &RowSink) -> rusqlite::Result<()> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    let mut stmt = conn.prepare("SELECT key, value FROM rows ORDER BY key")?;
    let mut records = stmt.query([])?;
    while let Some(record) = records.next()? {
        if !sink.push(decode(record)) {
            break;
        }
    }
    Ok(())
}

fn decode(record: &rusqlite::Row<'_>) -> Row {
    match (blob(record, 0, RowField::Key), blob(record, 1, RowField::Value)) {
        (Ok(key), Ok(value)) => Row::new(RowKey::decode(key), RowValue::decode(value)),
        (Err(err), _) | (_, Err(err)) => Row::failed(err),
    }
}

fn blob<'r>(
    record: &'r rusqlite::Row<'_>,
    idx: usize,
    field: RowField,
) -> Result<&'r [u8], RowError> {
    record
        .get_ref(idx)
        .map_err(|err| err.to_string())
        .and_then(|value| value.as_blob().map_err(|err| err.to_string()))
        .map_err(|reason| RowError::Decode { field, reason })
}

impl Backend for BoltBackend {
    fn name(&self) -> &'static str {
        "bolt"
    }

    fn close(&self, force: bool) -> BackendResult<()> {
        if !force {
            self.in_flight.wait_idle();
        }
        let conn = self.conn.lock().take().ok_or(BackendError::Closed)?;
        conn.close().map_err(|(_, err)| err)?;
        Ok(())
    }

    fn set(&self, rows: &[Row]) -> BackendResult<()> {
        let _op = self.in_flight.enter();
        if rows.iter().any(|row| row.key.is_empty()) {
            return Err(BackendError::EmptyKey);
        }
        let mut guard = self.conn.lock();
        let conn = guard.as_mut().ok_or(BackendError::Closed)?;
        let tx = conn.transaction()?;
        {
            let mut stmt =
                tx.prepare_cached("INSERT OR REPLACE INTO rows (key, value) VALUES (?1, ?2)")?;
            for row in rows {
                stmt.execute(params![row.key.bytes(), row.value.bytes()])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, key: &RowKey) -> BackendResult<()> {
        let _op = self.in_flight.enter();
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or(BackendError::Closed)?;
        conn.execute("DELETE FROM rows WHERE key = ?1", params![key.as_slice()])?;
        Ok(())
    }

    fn rows(&self) -> Rows {
        if self.conn.lock().is_none() {
            return Rows::failed(RowError::Source {
                reason: BackendError::Closed.to_string(),
            });
        }
        let op = self.in_flight.enter();
        let path = self.path.clone();
        Rows::spawn(self.name(), move |sink| {
            let _op = op;
            if let Err(err) = scan(&path, sink) {
                sink.fail(err);
            }
        })
    }
}
