//! Binary entry point for the pixelbench benchmarks.
//!
//! The `worker` subcommand is not meant for direct use - it is the child
//! process the sweep driver spawns once per configuration cell, configured
//! entirely through environment variables.

use std::num::NonZero;
use std::process::ExitCode;
use std::thread;

use argh::FromArgs;
use new_zealand::nz;
use pixelbench::{
    PARALLELISM_LEVELS, ProcessCellExecutor, SweepPlan, WorkerConfig, render_report, run_sweep,
    run_with_engine, run_worker,
};
use pixelpipe::{Engine, EngineOptions, OutputFormat, SourceImage};
use tracing_subscriber::EnvFilter;

/// Dimensions of the synthetic source the demand harness transforms.
const DEMAND_SOURCE_WIDTH: u32 = 2048;
const DEMAND_SOURCE_HEIGHT: u32 = 1536;

/// Default admission limit of the demand harness.
const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Latency benchmarks for the pixelpipe image transform engine.
#[derive(FromArgs)]
struct Args {
    /// the benchmark to run
    #[argh(subcommand)]
    command: Subcommand,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Subcommand {
    Sweep(SweepArgs),
    Worker(WorkerArgs),
    Demand(DemandArgs),
}

/// Sweep worker-pool size and concurrency-limit combinations across all
/// output formats, one isolated worker process per cell.
#[derive(FromArgs)]
#[argh(subcommand, name = "sweep")]
struct SweepArgs {}

/// Execute one isolated measurement run (spawned by the sweep driver;
/// configured via PIXELBENCH_* environment variables).
#[derive(FromArgs)]
#[argh(subcommand, name = "worker")]
struct WorkerArgs {}

/// Replay a fixed task mix through a bounded-capacity pool.
#[derive(FromArgs)]
#[argh(subcommand, name = "demand")]
struct DemandArgs {
    /// maximum number of tasks in flight (default 4)
    #[argh(option)]
    max_concurrent: Option<usize>,

    /// engine worker thread count (default: available parallelism)
    #[argh(option)]
    pool_size: Option<usize>,

    /// engine concurrency limit (default: available parallelism)
    #[argh(option)]
    concurrency: Option<usize>,
}

// Binary entry point - mutations would require subprocess testing which is impractical.
#[cfg_attr(test, mutants::skip)]
fn main() -> ExitCode {
    // Diagnostics go to stderr so a worker's stdout stays a clean protocol
    // channel and a driver's stdout stays a clean report.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Args = argh::from_env();

    match args.command {
        Subcommand::Sweep(SweepArgs {}) => run_sweep_command(),
        Subcommand::Worker(WorkerArgs {}) => run_worker_command(),
        Subcommand::Demand(demand) => run_demand_command(&demand),
    }
}

fn run_sweep_command() -> ExitCode {
    let executor = match ProcessCellExecutor::from_current_exe() {
        Ok(executor) => executor,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("Pixelbench concurrency sweep");
    println!("Testing worker-pool size and concurrency-limit combinations");
    println!(
        "Formats: {}",
        OutputFormat::ALL.map(|format| format.to_string()).join(", ")
    );
    println!(
        "Parallelism levels: {}",
        PARALLELISM_LEVELS.map(|level| level.to_string()).join(", ")
    );

    let results = run_sweep(&SweepPlan::standard(), &executor);

    print!("{}", render_report(&results));

    ExitCode::SUCCESS
}

fn run_worker_command() -> ExitCode {
    let config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run_worker(&config) {
        Ok(report) => {
            // Exactly one line on stdout - this is the driver protocol.
            println!(
                "{}",
                serde_json::to_string(&report).expect("report serialization cannot fail")
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_demand_command(args: &DemandArgs) -> ExitCode {
    let default_parallelism = thread::available_parallelism().unwrap_or(nz!(1));

    let Some(max_concurrent) = positive(
        args.max_concurrent,
        "--max-concurrent",
        nz!(DEFAULT_MAX_CONCURRENT),
    ) else {
        return ExitCode::FAILURE;
    };
    let Some(pool_size) = positive(args.pool_size, "--pool-size", default_parallelism) else {
        return ExitCode::FAILURE;
    };
    let Some(concurrency_limit) = positive(args.concurrency, "--concurrency", default_parallelism)
    else {
        return ExitCode::FAILURE;
    };

    // Measurements must pay the decode cost every time, so the
    // decoded-source cache stays off for the demand harness.
    let engine = Engine::new(EngineOptions {
        worker_threads: pool_size,
        concurrency_limit,
        cache: false,
    });

    let source = match SourceImage::synthetic(DEMAND_SOURCE_WIDTH, DEMAND_SOURCE_HEIGHT) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run_with_engine(&engine, &source, max_concurrent) {
        Ok(summary) => {
            print!("{}", summary.render());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Resolves an optional flag to a positive value, reporting a zero to
/// stderr.
fn positive(value: Option<usize>, flag: &str, default: NonZero<usize>) -> Option<NonZero<usize>> {
    match value {
        None => Some(default),
        Some(value) => {
            let positive = NonZero::new(value);
            if positive.is_none() {
                eprintln!("Error: {flag} must be positive");
            }
            positive
        }
    }
}
