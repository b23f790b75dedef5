//! Concurrent writer/poller orchestration.
//!
//! A run has two tasks. The writer drains a queue of row batches into the
//! backend. The poller repeatedly times full scans until the writer is done.
//! Both operations are raced against a budget; whichever task sees its
//! budget exceeded aborts the run through the shared [`Watchdog`].

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::RwLock;
use rows::Row;
use tracing::{debug, error, info};

use crate::backend::{Backend, BackendKind};
use crate::error::{HarnessError, HarnessResult};
use crate::stats::{ReadStats, RunReport, WriteStats};
use crate::watchdog::{Race, Watchdog};

/// Backend-independent harness settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BenchmarkConfig {
    /// Serialize every `set` against every scan with one read/write lock.
    pub shared_lock: bool,
}

/// Per-run knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Log progress each time more than this many rows were written since
    /// the last progress line. Zero disables progress lines.
    pub log_every: u64,
    /// Budget for a single `set`.
    pub write_timeout: Duration,
    /// Pause between scans.
    pub poll_interval: Duration,
    /// Budget for a single full scan.
    pub read_timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            log_every: 0,
            write_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
        }
    }
}

/// A backend under benchmark.
pub struct Benchmark {
    id: String,
    backend: Arc<dyn Backend>,
    lock: Option<Arc<RwLock<()>>>,
    watchdog: Arc<Watchdog>,
    active: Option<ActiveRun>,
}

struct ActiveRun {
    writer: JoinHandle<WriteStats>,
    poller: JoinHandle<ReadStats>,
}

/// What the writer and poller share.
#[derive(Clone)]
struct Shared {
    id: String,
    backend: Arc<dyn Backend>,
    lock: Option<Arc<RwLock<()>>>,
    watchdog: Arc<Watchdog>,
    options: RunOptions,
}

/// Single-fire handoff from writer to poller.
///
/// Dropping without firing also releases the poller.
struct Completion(Sender<()>);

impl Completion {
    fn fire(self) {
        let _ = self.0.send(());
    }
}

impl Benchmark {
    /// Opens the backend named `id` with its database at `path`.
    pub fn open(id: &str, path: impl AsRef<Path>) -> HarnessResult<Self> {
        let kind: BackendKind = id.parse()?;
        let backend = kind.open(path.as_ref())?;
        info!(backend = kind.id(), path = %path.as_ref().display(), "opened backend");
        Ok(Self::with_backend(
            kind.id(),
            backend,
            BenchmarkConfig {
                shared_lock: kind.shared_lock(),
            },
        ))
    }

    /// Benchmarks an already-open backend.
    pub fn with_backend(
        id: impl Into<String>,
        backend: Arc<dyn Backend>,
        config: BenchmarkConfig,
    ) -> Self {
        Self {
            id: id.into(),
            backend,
            lock: config.shared_lock.then(Arc::default),
            watchdog: Arc::new(Watchdog::new()),
            active: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// The abort flag shared by every run of this benchmark.
    ///
    /// Once aborted, later runs stop at their first check.
    pub fn watchdog(&self) -> &Arc<Watchdog> {
        &self.watchdog
    }

    /// Starts the writer and poller for batches arriving on `queue`.
    ///
    /// Returns once both tasks are running. A previous run that is still
    /// active is waited for first. Close the sending side of `queue` to end
    /// the run normally.
    pub fn run(&mut self, queue: Receiver<Vec<Row>>, options: RunOptions) -> HarnessResult<()> {
        if self.active.is_some() {
            let report = self.wait();
            debug!(backend = %self.id, ?report, "previous run finished");
        }

        let shared = Shared {
            id: self.id.clone(),
            backend: Arc::clone(&self.backend),
            lock: self.lock.clone(),
            watchdog: Arc::clone(&self.watchdog),
            options,
        };
        let (done_tx, done_rx) = bounded(1);

        let poller = {
            let shared = shared.clone();
            thread::Builder::new()
                .name("kvbench-poller".to_string())
                .spawn(move || run_poller(&shared, &done_rx))
                .map_err(|source| HarnessError::Spawn {
                    name: "poller",
                    source,
                })?
        };
        let completion = Completion(done_tx);
        let writer = thread::Builder::new()
            .name("kvbench-writer".to_string())
            .spawn(move || run_writer(&shared, &queue, completion));
        let writer = match writer {
            Ok(handle) => handle,
            Err(source) => {
                // The completion sender was dropped with the closure.
                let _ = poller.join();
                return Err(HarnessError::Spawn {
                    name: "writer",
                    source,
                });
            }
        };

        self.active = Some(ActiveRun { writer, poller });
        Ok(())
    }

    /// Blocks until the current run's tasks finish and reports on it.
    ///
    /// Without an active run, returns empty stats and the abort flag.
    pub fn wait(&mut self) -> RunReport {
        let mut report = RunReport::default();
        if let Some(run) = self.active.take() {
            report.write = run.writer.join().unwrap_or_else(|_| {
                error!(backend = %self.id, "writer task panicked");
                WriteStats::default()
            });
            report.read = run.poller.join().unwrap_or_else(|_| {
                error!(backend = %self.id, "poller task panicked");
                ReadStats::default()
            });
        }
        report.aborted = self.watchdog.is_aborted();
        report
    }

    /// Closes the backend.
    ///
    /// Unless `force` is set, waits for the active run and for the
    /// backend's in-flight operations first.
    pub fn close(&mut self, force: bool) -> HarnessResult<()> {
        if !force {
            let _ = self.wait();
        }
        self.backend.close(force)?;
        info!(backend = %self.id, force, "closed backend");
        Ok(())
    }
}

impl fmt::Debug for Benchmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Benchmark")
            .field("id", &self.id)
            .field("shared_lock", &self.lock.is_some())
            .field("aborted", &self.watchdog.is_aborted())
            .field("running", &self.active.is_some())
            .finish_non_exhaustive()
    }
}

fn run_writer(shared: &Shared, queue: &Receiver<Vec<Row>>, completion: Completion) -> WriteStats {
    let options = &shared.options;
    let mut stats = WriteStats::default();
    let mut last_arrival: Option<Instant> = None;
    let mut since_log = 0u64;
    let mut drained = false;

    loop {
        let Ok(batch) = queue.recv() else {
            drained = true;
            break;
        };
        // Batches that arrive after an abort are not counted.
        if shared.watchdog.is_aborted() {
            break;
        }

        let arrived = Instant::now();
        if let Some(prev) = last_arrival {
            stats.inter_arrival += arrived - prev;
        }
        last_arrival = Some(arrived);
        stats.row_sets += 1;

        let count = batch.len() as u64;
        let backend = Arc::clone(&shared.backend);
        let lock = shared.lock.clone();
        let started = Instant::now();
        let outcome = shared.watchdog.race(options.write_timeout, move || {
            let _guard = lock.as_ref().map(|lock| lock.write());
            backend.set(&batch)
        });
        match outcome {
            Race::Completed(Ok(())) => {
                stats.write_time += started.elapsed();
                stats.rows += count;
                since_log += count;
            }
            Race::Completed(Err(err)) => {
                error!(backend = %shared.id, error = %err, "set failed");
                break;
            }
            Race::TimedOut => {
                shared
                    .watchdog
                    .abort(format!("write timeout reached: {:?}", options.write_timeout));
                break;
            }
            Race::Lost => {
                error!(backend = %shared.id, "set panicked");
                break;
            }
        }

        if options.log_every > 0 && since_log > options.log_every {
            info!(
                backend = %shared.id,
                rows = stats.rows,
                row_sets = stats.row_sets,
                "write progress"
            );
            since_log = 0;
        }
    }

    completion.fire();
    if drained {
        info!(
            backend = %shared.id,
            avg_inter_arrival = ?stats.avg_inter_arrival(),
            rows = stats.rows,
            ns_per_write = ?stats.ns_per_write(),
            "writer finished"
        );
    }
    stats
}

fn run_poller(shared: &Shared, done: &Receiver<()>) -> ReadStats {
    let options = &shared.options;
    let mut stats = ReadStats::default();

    loop {
        if shared.watchdog.is_aborted() {
            break;
        }
        match done.recv_timeout(options.poll_interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                info!(
                    backend = %shared.id,
                    scans = stats.scans,
                    rows = stats.rows,
                    ns_per_read = ?stats.ns_per_read(),
                    "poller finished"
                );
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        let backend = Arc::clone(&shared.backend);
        let lock = shared.lock.clone();
        let outcome = shared.watchdog.race(options.read_timeout, move || {
            let _guard = lock.as_ref().map(|lock| lock.read());
            backend.timing()
        });
        match outcome {
            Race::Completed((rows, elapsed)) => {
                stats.scans += 1;
                stats.rows += rows;
                stats.read_time += elapsed;
                debug!(backend = %shared.id, rows, ?elapsed, "scan complete");
            }
            Race::TimedOut => {
                shared
                    .watchdog
                    .abort(format!("read timeout reached: {:?}", options.read_timeout));
                break;
            }
            Race::Lost => {
                error!(backend = %shared.id, "scan panicked");
                break;
            }
        }
    }
    stats
}
