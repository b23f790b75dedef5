use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use crossbeam_channel::bounded;
use harness::{Benchmark, RunOptions, RunReport};
use serde::Serialize;
use stream::StreamLimits;
use tracing::{error, info, warn, Level};
use workload::{Pacing, Random, ReplaySummary, WorkloadError, WorkloadSpec};

/// Batches buffered between the replay and the writer.
const QUEUE_CAPACITY: usize = 100;

/// Multi-letter flags that may also be spelled with a single dash.
const SINGLE_DASH_FLAGS: [&str; 11] = [
    "b0", "b1", "k0", "k1", "v0", "v1", "d0", "d1", "wlog", "mw", "mr",
];

#[derive(Parser, Debug)]
#[command(
    name = "kvbench",
    version,
    about = "Key/value storage benchmark",
    long_about = "Key/value storage benchmark.\n\n\
        Running a benchmark takes two steps. First generate a workload file \
        with -o; given identical options and seed the file is identical. \
        Then replay it into a backend with -i, -b and -f while the database \
        is scanned every poll interval. Passing both -o and -i generates and \
        then benchmarks in one go.\n\n\
        Multi-letter flags such as --b0, --d1 and --mw also accept a single \
        dash (-b0, -d1, -mw) and have descriptive aliases listed below. \
        Replay refuses blocks over the --limit-* sizes, and generation \
        refuses a workload that could produce one."
)]
struct Cli {
    /// Pseudo-random seed.
    #[arg(short = 'r', long, default_value_t = 0)]
    seed: u64,

    /// Number of blocks to generate.
    #[arg(short = 'n', long, default_value_t = 200)]
    blocks: u64,
    /// Minimum rows per block.
    #[arg(long, visible_alias = "min-rows", default_value_t = 1)]
    b0: u64,
    /// Maximum rows per block (exclusive).
    #[arg(long, visible_alias = "max-rows", default_value_t = 1000)]
    b1: u64,
    /// Minimum key length in bytes.
    #[arg(long, visible_alias = "min-key", default_value_t = 32)]
    k0: u64,
    /// Maximum key length in bytes (exclusive).
    #[arg(long, visible_alias = "max-key", default_value_t = 32)]
    k1: u64,
    /// Minimum value length in bytes.
    #[arg(long, visible_alias = "min-value", default_value_t = 512)]
    v0: u64,
    /// Maximum value length in bytes (exclusive).
    #[arg(long, visible_alias = "max-value", default_value_t = 1024)]
    v1: u64,
    /// Write a generated workload to this path.
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Replay the workload at this path into a backend.
    #[arg(short = 'i', long)]
    input: Option<PathBuf>,
    /// Backend to benchmark: bolt, kv, kv-mu, leveldb or noop.
    #[arg(short = 'b', long)]
    backend: Option<String>,
    /// Database path.
    #[arg(short = 'f', long)]
    db: Option<PathBuf>,
    /// Minimum inter-arrival time between batches, in milliseconds.
    #[arg(long, visible_alias = "min-delay", default_value_t = 500)]
    d0: u64,
    /// Target maximum inter-arrival time, in milliseconds (not guaranteed).
    #[arg(long, visible_alias = "max-delay", default_value_t = 1000)]
    d1: u64,
    /// Scan the database at this interval, in milliseconds.
    #[arg(short = 'p', long, default_value_t = 10_000)]
    poll: u64,
    /// Log write progress every this many rows (0 disables).
    #[arg(long, visible_alias = "log-every", default_value_t = 0)]
    wlog: u64,
    /// Write timeout per batch, in milliseconds.
    #[arg(long, visible_alias = "write-timeout", default_value_t = 60_000)]
    mw: u64,
    /// Read timeout per scan, in milliseconds.
    #[arg(long, visible_alias = "read-timeout", default_value_t = 60_000)]
    mr: u64,
    /// Largest rows per block accepted on replay [default: 1048576].
    #[arg(long, value_name = "ROWS")]
    limit_rows: Option<usize>,
    /// Largest key length in bytes accepted on replay [default: 1048576].
    #[arg(long, value_name = "BYTES")]
    limit_key: Option<usize>,
    /// Largest value length in bytes accepted on replay [default: 67108864].
    #[arg(long, value_name = "BYTES")]
    limit_value: Option<usize>,
    /// Write a JSON run summary to this path.
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Log per-scan detail.
    #[arg(short = 'v', long)]
    verbose: bool,
}

impl Cli {
    fn workload(&self) -> WorkloadSpec {
        WorkloadSpec {
            seed: self.seed,
            blocks: self.blocks,
            rows_per_block: self.b0..self.b1,
            key_len: self.k0..self.k1,
            value_len: self.v0..self.v1,
        }
    }

    fn limits(&self) -> StreamLimits {
        let defaults = StreamLimits::default();
        StreamLimits {
            max_rows_per_block: self.limit_rows.unwrap_or(defaults.max_rows_per_block),
            max_key_len: self.limit_key.unwrap_or(defaults.max_key_len),
            max_value_len: self.limit_value.unwrap_or(defaults.max_value_len),
        }
    }

    fn pacing(&self) -> Pacing {
        Pacing::new(Duration::from_millis(self.d0), Duration::from_millis(self.d1))
    }

    fn run_options(&self) -> RunOptions {
        RunOptions {
            log_every: self.wlog,
            write_timeout: Duration::from_millis(self.mw),
            poll_interval: Duration::from_millis(self.poll),
            read_timeout: Duration::from_millis(self.mr),
        }
    }
}

/// Rewrites `-b0` style flags to `--b0`, leaving everything after `--`
/// untouched.
fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut operands = false;
    args.into_iter()
        .map(|arg| {
            if operands {
                return arg;
            }
            let Some(text) = arg.to_str() else {
                return arg;
            };
            if text == "--" {
                operands = true;
                return arg;
            }
            let name = text
                .strip_prefix('-')
                .filter(|rest| !rest.starts_with('-'))
                .map(|rest| rest.split_once('=').map_or(rest, |(name, _)| name));
            match name {
                Some(name) if SINGLE_DASH_FLAGS.contains(&name) => format!("-{text}").into(),
                _ => arg,
            }
        })
        .collect()
}

/// Machine-readable outcome of a benchmark run.
#[derive(Debug, Serialize)]
struct Summary {
    backend: String,
    seed: u64,
    aborted: bool,
    batches_replayed: Option<u64>,
    row_sets: u64,
    rows_written: u64,
    avg_inter_arrival_ns: Option<u64>,
    ns_per_write: Option<u64>,
    scans: u64,
    rows_scanned: u64,
    ns_per_read: Option<u64>,
}

impl Summary {
    fn new(backend: &str, seed: u64, replay: Option<ReplaySummary>, report: &RunReport) -> Self {
        Self {
            backend: backend.to_string(),
            seed,
            aborted: report.aborted,
            batches_replayed: replay.map(|r| r.batches),
            row_sets: report.write.row_sets,
            rows_written: report.write.rows,
            avg_inter_arrival_ns: report
                .write
                .avg_inter_arrival()
                .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)),
            ns_per_write: report.write.ns_per_write(),
            scans: report.read.scans,
            rows_scanned: report.read.rows,
            ns_per_read: report.read.ns_per_read(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse_from(normalize_args(std::env::args_os()));
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    if cli.output.is_none() && cli.input.is_none() {
        Cli::command().print_help().context("print usage")?;
        return Ok(());
    }

    // One source drives both generation and replay pacing.
    let rnd = Random::new(cli.seed);

    if let Some(output) = &cli.output {
        write_workload(&rnd, output, &cli.workload(), &cli.limits())?;
    }
    if let Some(input) = &cli.input {
        run_benchmark(&rnd, &cli, input)?;
    }
    Ok(())
}

fn write_workload(
    rnd: &Random,
    path: &Path,
    spec: &WorkloadSpec,
    limits: &StreamLimits,
) -> Result<()> {
    spec.check(limits).context("workload would not replay; raise the --limit-* flags")?;
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    info!(path = %path.display(), "writing workload");
    let summary = rnd
        .write_with_limits(file, spec, limits)
        .with_context(|| format!("write workload to {}", path.display()))?;
    info!(
        blocks = summary.blocks,
        rows = summary.rows,
        bytes = summary.bytes,
        "workload written"
    );
    Ok(())
}

fn run_benchmark(rnd: &Random, cli: &Cli, input: &Path) -> Result<()> {
    let Some(id) = cli.backend.as_deref() else {
        println!("missing required -b <backend> argument");
        return Ok(());
    };
    let Some(db) = cli.db.as_deref() else {
        println!("missing required -f <database> argument");
        return Ok(());
    };

    let mut bench =
        Benchmark::open(id, db).with_context(|| format!("open {id} at {}", db.display()))?;
    let file = File::open(input).with_context(|| format!("open {}", input.display()))?;

    let (tx, rx) = bounded(QUEUE_CAPACITY);
    bench.run(rx, cli.run_options()).context("start benchmark")?;

    info!(path = %input.display(), "reading workload");
    let replay = match rnd.send_with_limits(&tx, file, &cli.pacing(), &cli.limits()) {
        Ok(summary) => Some(summary),
        Err(WorkloadError::QueueClosed { batches_sent }) => {
            warn!(batches_sent, "writer stopped before the workload was fully replayed");
            None
        }
        Err(err) => {
            error!(error = %err, "replay failed");
            None
        }
    };
    drop(tx);

    let report = bench.wait();
    // An abandoned operation may never finish; do not wait for it.
    bench
        .close(report.aborted)
        .with_context(|| format!("close {id}"))?;

    if let Some(path) = &cli.summary {
        write_summary(path, &Summary::new(id, cli.seed, replay, &report))?;
    }
    Ok(())
}

fn write_summary(path: &Path, summary: &Summary) -> Result<()> {
    let contents = serde_json::to_string_pretty(summary).context("serialize summary")?;
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_match_documented_values() {
        let cli = Cli::try_parse_from(["kvbench"]).unwrap();
        let spec = cli.workload();
        assert_eq!(spec.blocks, 200);
        assert_eq!(spec.rows_per_block, 1..1000);
        assert_eq!(spec.key_len, 32..32);
        assert_eq!(spec.value_len, 512..1024);
        assert_eq!(cli.pacing(), Pacing::default());

        let options = cli.run_options();
        assert_eq!(options.poll_interval, Duration::from_secs(10));
        assert_eq!(options.write_timeout, Duration::from_secs(60));
        assert_eq!(options.read_timeout, Duration::from_secs(60));
        assert_eq!(options.log_every, 0);
    }

    #[test]
    fn short_flags_parse() {
        let cli = Cli::try_parse_from([
            "kvbench", "-r", "99", "-n", "3", "-i", "in.dat", "-b", "kv", "-f", "kv.db", "-p",
            "250",
        ])
        .unwrap();
        assert_eq!(cli.seed, 99);
        assert_eq!(cli.blocks, 3);
        assert_eq!(cli.backend.as_deref(), Some("kv"));
        assert_eq!(cli.run_options().poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn generate_then_benchmark_writes_summary() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("rows.dat");
        let summary = dir.path().join("summary.json");
        let args: Vec<OsString> = vec![
            "kvbench".into(),
            "-n".into(),
            "4".into(),
            "--b1".into(),
            "10".into(),
            "--d0".into(),
            "0".into(),
            "--d1".into(),
            "0".into(),
            "-b".into(),
            "kv".into(),
            "-f".into(),
            dir.path().join("kv.db").into(),
            "--summary".into(),
            summary.clone().into(),
        ];
        let cli = Cli::try_parse_from(args).unwrap();

        let rnd = Random::new(cli.seed);
        write_workload(&rnd, &data, &cli.workload(), &cli.limits()).unwrap();
        run_benchmark(&rnd, &cli, &data).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&summary).unwrap()).unwrap();
        assert_eq!(json["backend"], "kv");
        assert_eq!(json["aborted"], false);
        assert_eq!(json["row_sets"], 4);
        assert_eq!(json["batches_replayed"], 4);
    }

    #[test]
    fn go_style_flags_parse() {
        let args = ["kvbench", "-b0", "5", "-b1=9", "-mw", "250", "-wlog", "10", "-b", "kv"]
            .map(OsString::from);
        let cli = Cli::try_parse_from(normalize_args(args)).unwrap();
        assert_eq!(cli.workload().rows_per_block, 5..9);
        assert_eq!(cli.run_options().write_timeout, Duration::from_millis(250));
        assert_eq!(cli.run_options().log_every, 10);
        assert_eq!(cli.backend.as_deref(), Some("kv"));
    }

    #[test]
    fn normalize_leaves_other_args_alone() {
        let args = ["kvbench", "-b", "b0", "--", "-mw"].map(OsString::from);
        assert_eq!(normalize_args(args.clone()), args.to_vec());
    }

    #[test]
    fn descriptive_aliases_parse() {
        let cli = Cli::try_parse_from([
            "kvbench",
            "--min-rows",
            "2",
            "--max-rows",
            "4",
            "--min-delay",
            "0",
            "--max-delay",
            "0",
            "--read-timeout",
            "30",
        ])
        .unwrap();
        assert_eq!(cli.workload().rows_per_block, 2..4);
        assert_eq!(cli.pacing(), Pacing::none());
        assert_eq!(cli.run_options().read_timeout, Duration::from_millis(30));
    }

    #[test]
    fn limit_flags_override_defaults() {
        let cli = Cli::try_parse_from(["kvbench"]).unwrap();
        assert_eq!(cli.limits(), StreamLimits::default());

        let cli =
            Cli::try_parse_from(["kvbench", "--limit-rows", "2000000", "--limit-value", "16"])
                .unwrap();
        let limits = cli.limits();
        assert_eq!(limits.max_rows_per_block, 2_000_000);
        assert_eq!(limits.max_key_len, StreamLimits::default().max_key_len);
        assert_eq!(limits.max_value_len, 16);
    }

    #[test]
    fn oversized_workload_is_refused_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("rows.dat");
        let cli = Cli::try_parse_from([
            "kvbench", "-n", "1", "--b0", "5", "--b1", "5", "--limit-rows", "4",
        ])
        .unwrap();
        let err = write_workload(&Random::new(0), &data, &cli.workload(), &cli.limits())
            .unwrap_err();
        assert!(format!("{err:#}").contains("rows per block"));
        assert!(!data.exists());
    }

    #[test]
    fn raised_limits_generate_and_replay() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("rows.dat");
        let summary = dir.path().join("summary.json");
        let args: Vec<OsString> = vec![
            "kvbench".into(),
            "-n".into(),
            "2".into(),
            "--b0".into(),
            "3".into(),
            "--b1".into(),
            "3".into(),
            "--v0".into(),
            "100".into(),
            "--v1".into(),
            "101".into(),
            "--limit-rows".into(),
            "3".into(),
            "--limit-value".into(),
            "100".into(),
            "--d0".into(),
            "0".into(),
            "--d1".into(),
            "0".into(),
            "-b".into(),
            "noop".into(),
            "-f".into(),
            dir.path().join("noop.db").into(),
            "--summary".into(),
            summary.clone().into(),
        ];
        let cli = Cli::try_parse_from(args).unwrap();

        let rnd = Random::new(cli.seed);
        write_workload(&rnd, &data, &cli.workload(), &cli.limits()).unwrap();
        run_benchmark(&rnd, &cli, &data).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&summary).unwrap()).unwrap();
        assert_eq!(json["batches_replayed"], 2);
        assert_eq!(json["rows_written"], 6);
    }

    #[test]
    fn missing_backend_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::try_parse_from(["kvbench", "-i", "unused.dat"]).unwrap();
        run_benchmark(&Random::new(0), &cli, &dir.path().join("unused.dat")).unwrap();
    }

    #[test]
    fn missing_input_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::try_parse_from(["kvbench", "-b", "noop", "-f", "db"]).unwrap();
        assert!(run_benchmark(&Random::new(0), &cli, &dir.path().join("absent.dat")).is_err());
    }
}
