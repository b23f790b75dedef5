//! Row key/value types for the kvbench harness.
//!
//! Keys and values are opaque byte sequences. Decoding and encoding both copy
//! the bytes, so every row that passes through a backend costs roughly what a
//! real row format would.
//!
//! # Design Principles
//!
//! - **Opaque** - No format to violate; decoding never fails.
//! - **Owned** - A decoded row never borrows from the buffer it came from.
//! - **In-band errors** - A bad record becomes an error-bearing [`Row`], not a
//!   stopped scan.

mod error;
mod types;

pub use error::{RowError, RowField};
pub use types::{Row, RowKey, RowValue};
