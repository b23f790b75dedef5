//! Concurrent write/scan benchmark harness for key/value backends.
//!
//! A [`Benchmark`] owns one [`Backend`] and, per run, a writer task and a
//! poller task:
//!
//! - the writer applies each queued batch with [`Backend::set`]
//! - the poller times a full [`Backend::rows`] scan every poll interval
//!
//! Each `set` and each scan is raced against its budget. The first task to
//! exceed a budget aborts the run through the shared [`Watchdog`]; the other
//! task notices and stops.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use crossbeam_channel::bounded;
//! use harness::{Benchmark, BenchmarkConfig, NoopBackend, RunOptions};
//! use rows::Row;
//!
//! let backend = Arc::new(NoopBackend::new());
//! let mut bench = Benchmark::with_backend("noop", backend, BenchmarkConfig::default());
//!
//! let (tx, rx) = bounded(4);
//! bench.run(rx, RunOptions::default()).unwrap();
//! tx.send(vec![Row::decode(b"k", b"v")]).unwrap();
//! drop(tx);
//!
//! let report = bench.wait();
//! assert!(!report.aborted);
//! assert_eq!(report.write.rows, 1);
//! ```

pub mod backend;
mod benchmark;
mod error;
mod stats;
mod watchdog;

pub use backend::{
    Backend, BackendKind, BoltBackend, KvBackend, LevelDbBackend, NoopBackend, RowSink, Rows,
};
pub use benchmark::{Benchmark, BenchmarkConfig, RunOptions};
pub use error::{BackendError, BackendResult, HarnessError, HarnessResult};
pub use stats::{ReadStats, RunReport, WriteStats};
pub use watchdog::{Race, Watchdog};
