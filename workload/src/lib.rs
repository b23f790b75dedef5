//! Deterministic workload generation and paced replay for kvbench.
//!
//! This crate provides:
//!
//! - [`Random`], a seeded, lock-protected pseudo-random source
//! - [`generate`] / [`Random::write`], which emit a block stream of random rows
//!   after checking the workload against the replay limits
//! - [`Random::send`], which replays a block stream onto a bounded queue at a
//!   controlled pace
//!
//! # Design Principles
//!
//! - **Reproducible** - A seed fully determines the generated stream.
//! - **Explicit state** - No process-wide RNG; one [`Random`] per run, passed
//!   to whoever needs it.
//! - **Lower-bound pacing** - Batches are never pushed closer together than
//!   [`Pacing::min`].
//!
//! # Example
//!
//! ```
//! use crossbeam_channel::unbounded;
//! use workload::{generate, Pacing, Random, WorkloadSpec};
//!
//! let spec = WorkloadSpec { blocks: 3, ..WorkloadSpec::default() };
//! let mut bytes = Vec::new();
//! generate(&spec, &mut bytes).unwrap();
//!
//! let (tx, rx) = unbounded();
//! Random::new(spec.seed).send(&tx, bytes.as_slice(), &Pacing::none()).unwrap();
//! drop(tx);
//! assert_eq!(rx.iter().count(), 3);
//! ```

mod error;
mod generate;
mod random;
mod replay;

pub use error::{WorkloadError, WorkloadResult};
pub use generate::{generate, GenerateSummary, WorkloadSpec};
pub use random::Random;
pub use replay::{Pacing, ReplaySummary};
