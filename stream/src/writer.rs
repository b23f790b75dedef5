//! Block stream writer.

use std::io::{BufWriter, Write};

use rows::Row;

use crate::error::{StreamError, StreamResult};

/// Writes blocks in the little-endian stream format.
///
/// Writes are buffered. Call [`finish`](Self::finish) to flush and recover
/// the inner writer; dropping the writer flushes on a best-effort basis.
#[derive(Debug)]
pub struct BlockWriter<W: Write> {
    inner: BufWriter<W>,
    bytes_written: u64,
}

impl<W: Write> BlockWriter<W> {
    /// Creates a new `BlockWriter`.
    pub fn new(inner: W) -> Self {
        Self {
            inner: BufWriter::new(inner),
            bytes_written: 0,
        }
    }

    /// Returns the number of bytes written so far.
    #[must_use]
    pub const fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Writes the row count that opens a block.
    ///
    /// The caller must follow with exactly `rows` key/value pairs.
    pub fn write_row_count(&mut self, rows: usize) -> StreamResult<()> {
        self.write_len(rows)
    }

    /// Writes one length-prefixed field (a key or a value).
    pub fn write_field(&mut self, bytes: &[u8]) -> StreamResult<()> {
        self.write_len(bytes.len())?;
        self.inner.write_all(bytes)?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    /// Writes a complete block from decoded rows.
    pub fn write_block(&mut self, rows: &[Row]) -> StreamResult<()> {
        self.write_row_count(rows.len())?;
        for row in rows {
            self.write_field(&row.key.bytes())?;
            self.write_field(&row.value.bytes())?;
        }
        Ok(())
    }

    /// Flushes buffered bytes and returns the inner writer.
    pub fn finish(self) -> StreamResult<W> {
        self.inner
            .into_inner()
            .map_err(|err| StreamError::Io(err.into_error()))
    }

    fn write_len(&mut self, len: usize) -> StreamResult<()> {
        let value = i64::try_from(len).map_err(|_| StreamError::LengthOverflow { length: len })?;
        self.inner.write_all(&value.to_le_bytes())?;
        self.bytes_written += 8;
        Ok(())
    }
}
