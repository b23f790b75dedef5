//! Binary block stream format for kvbench workloads.
//!
//! A stream is a sequence of blocks with no header, terminator, or checksum:
//!
//! ```text
//! block  := i64 row_count, row_count * record
//! record := i64 key_len, key_len bytes, i64 value_len, value_len bytes
//! ```
//!
//! All integers are little-endian. A stream ends at end of input, which must
//! fall on a block boundary.
//!
//! # Design Principles
//!
//! - **Stable format** - Generated fixtures stay readable across releases.
//! - **Bounded decoding** - All length fields are validated against limits before allocation.
//! - **No workload knowledge** - This crate frames rows; it does not generate them.
//!
//! # Example
//!
//! ```
//! use rows::Row;
//! use stream::{BlockReader, BlockWriter};
//!
//! let mut writer = BlockWriter::new(Vec::new());
//! writer.write_block(&[Row::decode(b"key", b"value")]).unwrap();
//! let bytes = writer.finish().unwrap();
//!
//! let mut reader = BlockReader::new(bytes.as_slice());
//! let block = reader.read_block().unwrap().unwrap();
//! assert_eq!(block[0].key.as_slice(), b"key");
//! assert!(reader.read_block().unwrap().is_none());
//! ```

mod error;
mod limits;
mod reader;
mod writer;

pub use error::{LimitKind, StreamError, StreamField, StreamResult};
pub use limits::StreamLimits;
pub use reader::BlockReader;
pub use writer::BlockWriter;

/// Size in bytes of every length prefix in the stream.
pub const LENGTH_PREFIX_SIZE: usize = std::mem::size_of::<i64>();
