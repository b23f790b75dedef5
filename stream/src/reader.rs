//! Block stream reader with bounded decoding.

use std::io::{self, BufReader, Read};

use rows::Row;

use crate::error::{LimitKind, StreamError, StreamField, StreamResult};
use crate::limits::StreamLimits;

/// Reads blocks of rows from a little-endian block stream.
///
/// The reader never trusts a length prefix: each one is validated against
/// [`StreamLimits`] before a buffer is allocated for it.
#[derive(Debug)]
pub struct BlockReader<R: Read> {
    inner: BufReader<R>,
    limits: StreamLimits,
    blocks_read: u64,
    finished: bool,
}

impl<R: Read> BlockReader<R> {
    /// Creates a reader with default limits.
    pub fn new(inner: R) -> Self {
        Self::with_limits(inner, StreamLimits::default())
    }

    /// Creates a reader with explicit limits.
    pub fn with_limits(inner: R, limits: StreamLimits) -> Self {
        Self {
            inner: BufReader::new(inner),
            limits,
            blocks_read: 0,
            finished: false,
        }
    }

    /// Returns the number of complete blocks read so far.
    #[must_use]
    pub const fn blocks_read(&self) -> u64 {
        self.blocks_read
    }

    /// Reads the next block.
    ///
    /// Returns `Ok(None)` when input ends cleanly on a block boundary. Input
    /// that ends anywhere else is [`StreamError::Truncated`].
    pub fn read_block(&mut self) -> StreamResult<Option<Vec<Row>>> {
        let Some(count) = self.read_row_count()? else {
            return Ok(None);
        };

        let mut rows = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let key_len = self.read_len(
                StreamField::KeyLength,
                LimitKind::KeyLength,
                self.limits.max_key_len,
            )?;
            let key = self.read_bytes(key_len, StreamField::Key)?;
            let value_len = self.read_len(
                StreamField::ValueLength,
                LimitKind::ValueLength,
                self.limits.max_value_len,
            )?;
            let value = self.read_bytes(value_len, StreamField::Value)?;
            rows.push(Row::decode(&key, &value));
        }

        self.blocks_read += 1;
        Ok(Some(rows))
    }

    fn read_row_count(&mut self) -> StreamResult<Option<usize>> {
        let mut buf = [0u8; 8];
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
        match filled {
            0 => Ok(None),
            8 => {
                let value = i64::from_le_bytes(buf);
                check_len(
                    value,
                    StreamField::RowCount,
                    LimitKind::RowsPerBlock,
                    self.limits.max_rows_per_block,
                )
                .map(Some)
            }
            _ => Err(self.truncated(StreamField::RowCount)),
        }
    }

    fn read_len(&mut self, field: StreamField, kind: LimitKind, limit: usize) -> StreamResult<usize> {
        let mut buf = [0u8; 8];
        self.fill(&mut buf, field)?;
        check_len(i64::from_le_bytes(buf), field, kind, limit)
    }

    fn read_bytes(&mut self, len: usize, field: StreamField) -> StreamResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.fill(&mut buf, field)?;
        Ok(buf)
    }

    fn fill(&mut self, buf: &mut [u8], field: StreamField) -> StreamResult<()> {
        self.inner.read_exact(buf).map_err(|err| {
            if err.kind() == io::ErrorKind::UnexpectedEof {
                self.truncated(field)
            } else {
                StreamError::Io(err)
            }
        })
    }

    const fn truncated(&self, field: StreamField) -> StreamError {
        StreamError::Truncated {
            block: self.blocks_read,
            field,
        }
    }
}

fn check_len(value: i64, field: StreamField, kind: LimitKind, limit: usize) -> StreamResult<usize> {
    let Ok(actual) = u64::try_from(value) else {
        return Err(StreamError::NegativeLength { field, value });
    };
    let exceeded = StreamError::LimitsExceeded {
        kind,
        limit,
        actual,
    };
    if actual > limit as u64 {
        return Err(exceeded);
    }
    usize::try_from(actual).map_err(|_| exceeded)
}

/// Yields blocks until clean end of input or the first error.
impl<R: Read> Iterator for BlockReader<R> {
    type Item = StreamResult<Vec<Row>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_block() {
            Ok(Some(rows)) => Some(Ok(rows)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}
