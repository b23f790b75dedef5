//! Workload stream generation.

use std::io::Write;
use std::ops::Range;

use stream::{BlockWriter, LimitKind, StreamLimits};
use tracing::info;

use crate::error::{WorkloadError, WorkloadResult};
use crate::random::Random;

/// Parameters of one generated workload.
///
/// Every range is half-open. An empty range such as `32..32` always yields
/// its start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadSpec {
    /// Seed for [`generate`].
    pub seed: u64,
    /// Number of blocks to emit.
    pub blocks: u64,
    /// Rows per block.
    pub rows_per_block: Range<u64>,
    /// Key length in bytes.
    pub key_len: Range<u64>,
    /// Value length in bytes.
    pub value_len: Range<u64>,
}

impl WorkloadSpec {
    /// Fails if any block this spec can draw would be rejected when read
    /// back under `limits`.
    ///
    /// A spec with no blocks always passes.
    pub fn check(&self, limits: &StreamLimits) -> WorkloadResult<()> {
        if self.blocks == 0 {
            return Ok(());
        }
        let bounds = [
            (LimitKind::RowsPerBlock, &self.rows_per_block, limits.max_rows_per_block),
            (LimitKind::KeyLength, &self.key_len, limits.max_key_len),
            (LimitKind::ValueLength, &self.value_len, limits.max_value_len),
        ];
        for (kind, range, limit) in bounds {
            let requested = largest(range);
            if usize::try_from(requested).map_or(true, |n| n > limit) {
                return Err(WorkloadError::ExceedsLimits {
                    kind,
                    limit,
                    requested,
                });
            }
        }
        Ok(())
    }
}

/// Largest value [`Random::int`] can return for `range`.
fn largest(range: &Range<u64>) -> u64 {
    range.end.saturating_sub(1).max(range.start)
}

impl Default for WorkloadSpec {
    fn default() -> Self {
        Self {
            seed: 0,
            blocks: 200,
            rows_per_block: 1..1000,
            key_len: 32..32,
            value_len: 512..1024,
        }
    }
}

/// Totals for a generated stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateSummary {
    pub blocks: u64,
    pub rows: u64,
    pub bytes: u64,
}

impl Random {
    /// Writes the workload described by `spec` to `writer`.
    ///
    /// `spec.seed` is not consulted; the stream is driven by this source's
    /// current state. Draw order per row is key length, key bytes, value
    /// length, value bytes, so a given seed always yields the same stream.
    ///
    /// Checks `spec` against [`StreamLimits::default`], the limits
    /// [`send`](Self::send) replays with. See
    /// [`write_with_limits`](Self::write_with_limits).
    pub fn write<W: Write>(&self, writer: W, spec: &WorkloadSpec) -> WorkloadResult<GenerateSummary> {
        self.write_with_limits(writer, spec, &StreamLimits::default())
    }

    /// Like [`write`](Self::write), but refuses up front, before drawing
    /// or writing anything, a `spec` that could produce a block `limits`
    /// would reject on replay.
    pub fn write_with_limits<W: Write>(
        &self,
        writer: W,
        spec: &WorkloadSpec,
        limits: &StreamLimits,
    ) -> WorkloadResult<GenerateSummary> {
        spec.check(limits)?;
        let mut out = BlockWriter::new(writer);
        let mut summary = GenerateSummary::default();

        for _ in 0..spec.blocks {
            let rows = self.draw(&spec.rows_per_block);
            out.write_row_count(to_usize(rows)?)?;
            for _ in 0..rows {
                let key_len = self.draw(&spec.key_len);
                out.write_field(&self.bytes(to_usize(key_len)?))?;
                let value_len = self.draw(&spec.value_len);
                out.write_field(&self.bytes(to_usize(value_len)?))?;
            }
            summary.blocks += 1;
            summary.rows += rows;
        }

        summary.bytes = out.bytes_written();
        out.finish()?;
        Ok(summary)
    }

    fn draw(&self, range: &Range<u64>) -> u64 {
        self.int(range.start, range.end)
    }
}

/// Generates the workload for `spec` from a fresh source seeded with
/// `spec.seed`, checked against [`StreamLimits::default`].
pub fn generate<W: Write>(spec: &WorkloadSpec, writer: W) -> WorkloadResult<GenerateSummary> {
    let summary = Random::new(spec.seed).write(writer, spec)?;
    info!(
        seed = spec.seed,
        blocks = summary.blocks,
        rows = summary.rows,
        bytes = summary.bytes,
        "generated workload"
    );
    Ok(summary)
}

fn to_usize(value: u64) -> WorkloadResult<usize> {
    usize::try_from(value).map_err(|_| WorkloadError::LengthTooLarge { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stream::BlockReader;

    fn small_spec() -> WorkloadSpec {
        WorkloadSpec {
            seed: 99,
            blocks: 4,
            rows_per_block: 2..6,
            key_len: 1..8,
            value_len: 0..16,
        }
    }

    #[test]
    fn same_seed_same_stream() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        generate(&small_spec(), &mut a).unwrap();
        generate(&small_spec(), &mut b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn summary_matches_stream() {
        let mut bytes = Vec::new();
        let summary = generate(&small_spec(), &mut bytes).unwrap();
        assert_eq!(summary.blocks, 4);
        assert_eq!(summary.bytes, bytes.len() as u64);

        let blocks: Vec<_> = BlockReader::new(bytes.as_slice())
            .collect::<Result<_, _>>()
            .unwrap();
        let rows: usize = blocks.iter().map(Vec::len).sum();
        assert_eq!(summary.rows, rows as u64);
    }

    #[test]
    fn zero_blocks_is_empty_stream() {
        let spec = WorkloadSpec {
            blocks: 0,
            ..small_spec()
        };
        let mut bytes = Vec::new();
        let summary = generate(&spec, &mut bytes).unwrap();
        assert!(bytes.is_empty());
        assert_eq!(summary, GenerateSummary::default());
    }

    #[test]
    fn fixed_lengths_are_exact() {
        let spec = WorkloadSpec {
            seed: 1,
            blocks: 3,
            rows_per_block: 5..5,
            key_len: 32..32,
            value_len: 10..10,
        };
        let mut bytes = Vec::new();
        generate(&spec, &mut bytes).unwrap();
        for block in BlockReader::new(bytes.as_slice()) {
            let block = block.unwrap();
            assert_eq!(block.len(), 5);
            assert!(block.iter().all(|row| row.key.len() == 32 && row.value.len() == 10));
        }
    }

    #[test]
    fn spec_at_the_limit_replays() {
        let limits = StreamLimits::for_testing();
        let spec = WorkloadSpec {
            seed: 3,
            blocks: 2,
            rows_per_block: 1..limits.max_rows_per_block as u64 + 1,
            key_len: limits.max_key_len as u64..limits.max_key_len as u64,
            value_len: 0..limits.max_value_len as u64 + 1,
        };
        let mut bytes = Vec::new();
        Random::new(3)
            .write_with_limits(&mut bytes, &spec, &limits)
            .unwrap();
        let blocks = BlockReader::with_limits(bytes.as_slice(), limits)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn spec_past_the_limit_is_refused_before_writing() {
        let limits = StreamLimits::for_testing();
        let over = limits.max_rows_per_block as u64 + 1;
        let spec = WorkloadSpec {
            seed: 3,
            blocks: 1,
            rows_per_block: over..over,
            key_len: 0..0,
            value_len: 0..0,
        };
        let mut bytes = Vec::new();
        let err = Random::new(3)
            .write_with_limits(&mut bytes, &spec, &limits)
            .unwrap_err();
        assert!(matches!(
            err,
            WorkloadError::ExceedsLimits {
                kind: LimitKind::RowsPerBlock,
                requested,
                ..
            } if requested == over
        ));
        assert!(bytes.is_empty());
    }

    #[test]
    fn default_limits_bound_generate() {
        let max = StreamLimits::default().max_rows_per_block as u64;
        let at = WorkloadSpec {
            blocks: 1,
            rows_per_block: max..max,
            ..small_spec()
        };
        assert!(at.check(&StreamLimits::default()).is_ok());

        // One row past the default replay limit.
        let past = WorkloadSpec {
            rows_per_block: max + 1..max + 1,
            key_len: 0..0,
            value_len: 0..0,
            ..at
        };
        let mut bytes = Vec::new();
        assert!(matches!(
            generate(&past, &mut bytes),
            Err(WorkloadError::ExceedsLimits { .. })
        ));
        assert!(bytes.is_empty());

        let huge_value = WorkloadSpec {
            value_len: (64 << 20) + 1..(64 << 20) + 2,
            ..small_spec()
        };
        assert!(matches!(
            huge_value.check(&StreamLimits::default()),
            Err(WorkloadError::ExceedsLimits {
                kind: LimitKind::ValueLength,
                ..
            })
        ));
    }

    #[test]
    fn empty_spec_passes_any_limits() {
        let spec = WorkloadSpec {
            blocks: 0,
            rows_per_block: u64::MAX..u64::MAX,
            ..small_spec()
        };
        assert!(spec.check(&StreamLimits::for_testing()).is_ok());
    }

    #[test]
    fn default_spec_matches_cli_defaults() {
        let spec = WorkloadSpec::default();
        assert_eq!(spec.blocks, 200);
        assert_eq!(spec.rows_per_block, 1..1000);
        assert_eq!(spec.key_len, 32..32);
        assert_eq!(spec.value_len, 512..1024);
    }
}
