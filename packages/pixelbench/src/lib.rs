//! Measures how the latency of a parallel image-transform workload responds
//! to two independent concurrency controls: the engine's worker-thread-pool
//! size and its internal concurrency limit.
//!
//! Two measurement harnesses share the same primitives:
//!
//! * The **configuration sweep** enumerates an explicit list of tunable
//!   pairs per output format and measures each cell in a freshly spawned
//!   worker process, so one cell's configuration can never leak into
//!   another. Results are ranked per parallelism level and reported as
//!   plain tables on stdout.
//! * The **bounded-demand harness** replays a fixed mix of
//!   (size class, format) tasks through a fixed-capacity task pool,
//!   reporting mean latency per task class and total elapsed wall-clock
//!   time.
//!
//! The crate is a library plus the `pixelbench` binary; the binary's
//! `worker` subcommand is the child-process entry point spawned by the
//! sweep driver.

mod demand;
mod driver;
mod measure;
mod pool;
mod record;
mod report;
mod tunables;
mod worker;

pub use demand::*;
pub use driver::*;
pub use measure::*;
pub use pool::*;
pub use record::*;
pub use report::*;
pub use tunables::*;
pub use worker::*;
