//! Paced replay of a block stream onto a queue.

use std::io::Read;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use rows::Row;
use stream::{BlockReader, StreamLimits};
use tracing::debug;

use crate::error::{WorkloadError, WorkloadResult};
use crate::random::Random;

/// Inter-arrival bounds for replayed batches.
///
/// `min` is a hard lower bound on the spacing between pushes. `max` is only
/// a target: a slow reader or a full queue can stretch spacing past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub min: Duration,
    pub max: Duration,
}

impl Pacing {
    #[must_use]
    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// No delay between batches.
    #[must_use]
    pub const fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(1))
    }
}

/// Totals for one replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub batches: u64,
    pub rows: u64,
    /// Time spent sleeping to honor the pacing lower bound.
    pub paced: Duration,
}

impl Random {
    /// Replays `reader` onto `queue` with default stream limits.
    ///
    /// See [`send_with_limits`](Self::send_with_limits).
    pub fn send<R: Read>(
        &self,
        queue: &Sender<Vec<Row>>,
        reader: R,
        pacing: &Pacing,
    ) -> WorkloadResult<ReplaySummary> {
        self.send_with_limits(queue, reader, pacing, &StreamLimits::default())
    }

    /// Reads `reader` block by block and pushes each decoded batch onto
    /// `queue`.
    ///
    /// Before every push after the first a target delay is drawn from
    /// `[pacing.min, pacing.max)`; if less than that has passed since the
    /// previous push completed, the remainder is slept. Ends with `Ok` when
    /// the stream ends on a block boundary.
    pub fn send_with_limits<R: Read>(
        &self,
        queue: &Sender<Vec<Row>>,
        reader: R,
        pacing: &Pacing,
        limits: &StreamLimits,
    ) -> WorkloadResult<ReplaySummary> {
        let mut blocks = BlockReader::with_limits(reader, limits.clone());
        let mut summary = ReplaySummary::default();
        let mut last_push: Option<Instant> = None;

        while let Some(rows) = blocks.read_block()? {
            if let Some(last) = last_push {
                let target = self.delay(pacing);
                if let Some(rest) = target.checked_sub(last.elapsed()) {
                    thread::sleep(rest);
                    summary.paced += rest;
                }
            }

            let len = rows.len() as u64;
            queue.send(rows).map_err(|_| WorkloadError::QueueClosed {
                batches_sent: summary.batches,
            })?;
            last_push = Some(Instant::now());
            summary.batches += 1;
            summary.rows += len;
        }

        debug!(
            batches = summary.batches,
            rows = summary.rows,
            paced_ms = summary.paced.as_millis() as u64,
            "replay reached end of stream"
        );
        Ok(summary)
    }

    /// Draws a target inter-arrival delay in `[pacing.min, pacing.max)`.
    pub fn delay(&self, pacing: &Pacing) -> Duration {
        Duration::from_nanos(self.int(nanos(pacing.min), nanos(pacing.max)))
    }
}

fn nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{bounded, unbounded};
    use stream::{BlockWriter, StreamError};

    fn stream_of(blocks: &[Vec<Row>]) -> Vec<u8> {
        let mut writer = BlockWriter::new(Vec::new());
        for block in blocks {
            writer.write_block(block).unwrap();
        }
        writer.finish().unwrap()
    }

    #[test]
    fn delay_within_pacing_bounds() {
        let rnd = Random::new(1);
        let pacing = Pacing::new(Duration::from_millis(5), Duration::from_millis(10));
        for _ in 0..100 {
            let d = rnd.delay(&pacing);
            assert!(d >= pacing.min && d < pacing.max);
        }
    }

    #[test]
    fn degenerate_pacing_is_exact() {
        let rnd = Random::new(1);
        let pacing = Pacing::new(Duration::from_millis(3), Duration::from_millis(3));
        assert_eq!(rnd.delay(&pacing), Duration::from_millis(3));
        assert_eq!(rnd.delay(&Pacing::none()), Duration::ZERO);
    }

    #[test]
    fn replays_blocks_in_order() {
        let blocks = vec![vec![Row::decode(b"a", b"1")], vec![Row::decode(b"b", b"2")]];
        let bytes = stream_of(&blocks);
        let (tx, rx) = unbounded();
        let summary = Random::new(0)
            .send(&tx, bytes.as_slice(), &Pacing::none())
            .unwrap();
        drop(tx);
        assert_eq!(summary.batches, 2);
        assert_eq!(summary.rows, 2);
        assert_eq!(rx.iter().collect::<Vec<_>>(), blocks);
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let mut bytes = stream_of(&[vec![Row::decode(b"key", b"value")]]);
        bytes.pop();
        let (tx, _rx) = unbounded();
        let err = Random::new(0)
            .send(&tx, bytes.as_slice(), &Pacing::none())
            .unwrap_err();
        assert!(matches!(
            err,
            WorkloadError::Stream(StreamError::Truncated { .. })
        ));
    }

    #[test]
    fn closed_queue_stops_replay() {
        let bytes = stream_of(&[vec![], vec![]]);
        let (tx, rx) = bounded(1);
        drop(rx);
        let err = Random::new(0)
            .send(&tx, bytes.as_slice(), &Pacing::none())
            .unwrap_err();
        assert!(matches!(err, WorkloadError::QueueClosed { batches_sent: 0 }));
    }

    #[test]
    fn explicit_limits_apply() {
        let bytes = stream_of(&[vec![Row::decode(&[0u8; 300], b"")]]);
        let (tx, _rx) = unbounded();
        let err = Random::new(0)
            .send_with_limits(
                &tx,
                bytes.as_slice(),
                &Pacing::none(),
                &StreamLimits::for_testing(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            WorkloadError::Stream(StreamError::LimitsExceeded { .. })
        ));
    }
}
