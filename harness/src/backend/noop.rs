use parking_lot::Mutex;
use rows::{Row, RowKey};

use super::{Backend, Rows};
use crate::error::BackendResult;

/// Stores nothing; only counts rows.
///
/// Measures the harness's own overhead.
#[derive(Debug, Default)]
pub struct NoopBackend {
    count: Mutex<u64>,
}

impl NoopBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows currently counted.
    pub fn len(&self) -> u64 {
        *self.count.lock()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Backend for NoopBackend {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn close(&self, _force: bool) -> BackendResult<()> {
        Ok(())
    }

    fn set(&self, rows: &[Row]) -> BackendResult<()> {
        *self.count.lock() += rows.len() as u64;
        Ok(())
    }

    fn delete(&self, _key: &RowKey) -> BackendResult<()> {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        Ok(())
    }

    fn rows(&self) -> Rows {
        let count = self.len();
        Rows::spawn(self.name(), move |sink| {
            for _ in 0..count {
                if !sink.push(Row::default()) {
                    return;
                }
            }
        })
    }
}
