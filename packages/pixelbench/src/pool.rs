use std::collections::VecDeque;
use std::num::NonZero;
use std::sync::Mutex;
use std::thread;

/// Runs every task through a fixed-capacity worker pool and returns the
/// results in task order.
///
/// At most `capacity` tasks are in flight at any moment. Admission is a
/// sliding window over a shared queue: the moment any task completes, its
/// worker pulls the next queued task, without waiting for the rest of the
/// batch. The call returns when the last task has completed.
///
/// This is an explicit admission primitive rather than an unbounded
/// fan-out, so harnesses built on it can make hard claims about their
/// maximum concurrency.
///
/// # Example
///
/// ```
/// use new_zealand::nz;
/// use pixelbench::run_bounded;
///
/// let doubled = run_bounded(nz!(2), vec![1, 2, 3, 4], |n| n * 2);
/// assert_eq!(doubled, vec![2, 4, 6, 8]);
/// ```
pub fn run_bounded<T, R, F>(capacity: NonZero<usize>, tasks: Vec<T>, op: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    let task_count = tasks.len();
    let queue = Mutex::new(tasks.into_iter().enumerate().collect::<VecDeque<_>>());
    let results = Mutex::new((0..task_count).map(|_| None).collect::<Vec<Option<R>>>());

    // More workers than tasks would only idle.
    let worker_count = capacity.get().min(task_count);

    thread::scope(|scope| {
        for _ in 0..worker_count {
            scope.spawn(|| {
                loop {
                    let next = queue
                        .lock()
                        .expect("queue access never panics, so the mutex cannot be poisoned")
                        .pop_front();

                    let Some((index, task)) = next else {
                        break;
                    };

                    let result = op(task);

                    *results
                        .lock()
                        .expect("result storage never panics, so the mutex cannot be poisoned")
                        .get_mut(index)
                        .expect("index came from enumerating the very vector we write into") =
                        Some(result);
                }
            });
        }
    });

    results
        .into_inner()
        .expect("all workers have joined, so the mutex cannot be poisoned or held")
        .into_iter()
        .map(|result| result.expect("the scope ends only after every queued task was executed"))
        .collect()
}
