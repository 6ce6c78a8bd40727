//! Demonstrates the sliding-window admission of the bounded task pool.
//!
//! Twelve simulated tasks of ~20ms each run at three different capacities;
//! the total elapsed time shrinks as the admission limit rises, while the
//! task count and per-task cost stay fixed.

#![allow(missing_docs, reason = "No need for API documentation in example code")]

use std::num::NonZero;
use std::thread;
use std::time::{Duration, Instant};

use new_zealand::nz;
use pixelbench::run_bounded;

const TASK_COUNT: usize = 12;
const TASK_COST: Duration = Duration::from_millis(20);

fn main() {
    println!("Bounded Pool Demo");
    println!("=================");
    println!();
    println!("{TASK_COUNT} tasks of {TASK_COST:?} each, at rising admission limits:");
    println!();

    for capacity in [nz!(1), nz!(3), nz!(12)] {
        let elapsed = timed_run(capacity);
        println!("capacity {:>2}: {elapsed:>6.0?} total", capacity.get());
    }

    println!();
    println!("Bounded pool demo completed successfully!");
}

fn timed_run(capacity: NonZero<usize>) -> Duration {
    let start = Instant::now();

    run_bounded(capacity, (0..TASK_COUNT).collect(), |_| {
        thread::sleep(TASK_COST);
    });

    start.elapsed()
}
