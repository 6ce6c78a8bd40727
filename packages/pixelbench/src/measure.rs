use std::collections::BTreeMap;
use std::thread;
use std::time::Instant;

/// Measures the mean completion time of an operation across a sequence of
/// parallelism levels.
///
/// Levels are executed in the order given, one batch per level. For each
/// level `p`, a shared start instant is captured, `p` invocations of the
/// operation are issued concurrently in a scoped thread group, and every
/// invocation's completion time is taken as `now - shared start`. The batch
/// joins before the next level begins, and the level's entry in the result
/// is the arithmetic mean of its completion times in milliseconds.
///
/// Fail-fast: the first failing invocation fails the whole measurement.
/// Invocations already issued in the same batch still run to completion
/// (the join barrier is unconditional), but no further level is started and
/// no partial means are returned.
///
/// Levels must be positive - a zero level would have no samples to average.
///
/// # Errors
///
/// Returns the first operation failure, in batch order.
///
/// # Example
///
/// ```
/// use pixelbench::measure_levels;
///
/// let means = measure_levels::<std::convert::Infallible, _>(&[1, 4], || {
///     std::hint::black_box((0..100).sum::<u32>());
///     Ok(())
/// })?;
///
/// assert_eq!(means.keys().copied().collect::<Vec<_>>(), vec![1, 4]);
/// # Ok::<(), std::convert::Infallible>(())
/// ```
pub fn measure_levels<E, F>(levels: &[u32], op: F) -> Result<BTreeMap<u32, f64>, E>
where
    E: Send,
    F: Fn() -> Result<(), E> + Sync,
{
    let mut means = BTreeMap::new();

    for &level in levels {
        let shared_start = Instant::now();

        let completions = thread::scope(|scope| {
            let handles = (0..level)
                .map(|_| {
                    scope.spawn(|| {
                        op()?;
                        Ok(shared_start.elapsed().as_secs_f64() * 1000.0)
                    })
                })
                .collect::<Vec<_>>();

            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .expect("measured operations report failures as results, not panics")
                })
                .collect::<Vec<Result<f64, E>>>()
        });

        let mut total_ms = 0.0;
        for completion in completions {
            total_ms += completion?;
        }

        means.insert(level, total_ms / f64::from(level));
    }

    Ok(means)
}
