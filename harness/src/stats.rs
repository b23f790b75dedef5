//! Per-run throughput statistics.

use std::time::Duration;

/// Accumulated by the writer task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    /// Batches received from the queue before any abort.
    pub row_sets: u64,
    /// Rows in batches that were set successfully.
    pub rows: u64,
    /// Sum of the gaps between consecutive batch arrivals.
    pub inter_arrival: Duration,
    /// Sum of successful `set` durations.
    pub write_time: Duration,
}

/// Accumulated by the poller task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadStats {
    /// Completed full scans.
    pub scans: u64,
    /// Rows seen across all scans.
    pub rows: u64,
    /// Sum of scan durations.
    pub read_time: Duration,
}

/// Outcome of one benchmark run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Whether a watchdog timeout ended the run.
    pub aborted: bool,
    pub write: WriteStats,
    pub read: ReadStats,
}

impl WriteStats {
    /// Mean gap between batch arrivals, `None` with fewer than two batches.
    pub fn avg_inter_arrival(&self) -> Option<Duration> {
        let gaps = self.row_sets.checked_sub(1).filter(|&n| n > 0)?;
        Some(div(self.inter_arrival, gaps))
    }

    /// Mean write time per row in nanoseconds.
    pub fn ns_per_write(&self) -> Option<u64> {
        per_row(self.write_time, self.rows)
    }
}

impl ReadStats {
    /// Mean scan time per row in nanoseconds.
    pub fn ns_per_read(&self) -> Option<u64> {
        per_row(self.read_time, self.rows)
    }
}

fn div(total: Duration, n: u64) -> Duration {
    let nanos = total.as_nanos() / u128::from(n);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

fn per_row(total: Duration, rows: u64) -> Option<u64> {
    (rows > 0).then(|| {
        let nanos = total.as_nanos() / u128::from(rows);
        u64::try_from(nanos).unwrap_or(u64::MAX)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_divisors_short_circuit() {
        let write = WriteStats::default();
        assert_eq!(write.avg_inter_arrival(), None);
        assert_eq!(write.ns_per_write(), None);
        assert_eq!(ReadStats::default().ns_per_read(), None);
    }

    #[test]
    fn single_batch_has_no_inter_arrival() {
        let write = WriteStats {
            row_sets: 1,
            rows: 10,
            ..WriteStats::default()
        };
        assert_eq!(write.avg_inter_arrival(), None);
    }

    #[test]
    fn inter_arrival_averages_over_gaps() {
        let write = WriteStats {
            row_sets: 3,
            inter_arrival: Duration::from_millis(100),
            ..WriteStats::default()
        };
        assert_eq!(write.avg_inter_arrival(), Some(Duration::from_millis(50)));
    }

    #[test]
    fn per_row_rates() {
        let write = WriteStats {
            rows: 4,
            write_time: Duration::from_nanos(1000),
            ..WriteStats::default()
        };
        assert_eq!(write.ns_per_write(), Some(250));

        let read = ReadStats {
            scans: 2,
            rows: 10,
            read_time: Duration::from_micros(1),
        };
        assert_eq!(read.ns_per_read(), Some(100));
    }
}
