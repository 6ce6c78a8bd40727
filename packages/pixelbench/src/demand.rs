use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZero;
use std::time::{Duration, Instant};

use pixelpipe::{Engine, OutputFormat, ResizeFit, SourceImage, TransformError, TransformRequest};

use crate::run_bounded;

/// Sources with more pixels than this are rejected by demand-harness
/// transforms. Far above anything the harness generates; the limit guards
/// against misconfigured custom sources.
pub const DEMAND_INPUT_PIXEL_LIMIT: u64 = 300_000_000;

/// How many times each (size class, format) combination appears in the
/// task mix.
pub const TASKS_PER_COMBINATION: usize = 4;

/// The formats exercised by the bounded-demand harness.
pub const DEMAND_FORMATS: [OutputFormat; 3] =
    [OutputFormat::Jpeg, OutputFormat::WebP, OutputFormat::Avif];

/// Identifies one of the fixed target size classes.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[non_exhaustive]
pub enum SizeClassId {
    /// Thumbnail-sized output.
    Small,

    /// Mid-sized output.
    Medium,

    /// Near-original output.
    Large,
}

impl SizeClassId {
    /// The full definition of this size class.
    #[must_use]
    pub fn profile(self) -> &'static SizeClass {
        match self {
            Self::Small => &SIZE_CLASSES[0],
            Self::Medium => &SIZE_CLASSES[1],
            Self::Large => &SIZE_CLASSES[2],
        }
    }
}

impl fmt::Display for SizeClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        };

        // pad() rather than write_str() so summary columns can align us.
        f.pad(name)
    }
}

/// One target size class of the demand workload.
#[derive(Debug)]
pub struct SizeClass {
    /// Which class this is.
    pub id: SizeClassId,

    /// Width of the target box, in pixels.
    pub width: u32,

    /// Height of the target box, in pixels.
    pub height: u32,

    /// Declared share of real-world traffic, in percent. Carried as
    /// documentation of the intended distribution; the generated task mix
    /// replicates every combination equally and does not apply it.
    pub weight: u32,
}

/// The fixed size classes, weighted toward smaller outputs the way real
/// request traffic is.
pub const SIZE_CLASSES: [SizeClass; 3] = [
    SizeClass {
        id: SizeClassId::Small,
        width: 400,
        height: 300,
        weight: 70,
    },
    SizeClass {
        id: SizeClassId::Medium,
        width: 1200,
        height: 900,
        weight: 25,
    },
    SizeClass {
        id: SizeClassId::Large,
        width: 2400,
        height: 1800,
        weight: 5,
    },
];

/// One task of the demand workload: transform the source into a size
/// class's target box and encode it in a format.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DemandTask {
    /// The target size class.
    pub size_class: SizeClassId,

    /// The output format.
    pub format: OutputFormat,
}

/// Builds the demand task mix: every (size class, format) combination,
/// replicated [`TASKS_PER_COMBINATION`] times, in declaration order.
#[must_use]
pub fn build_task_mix() -> Vec<DemandTask> {
    let mut tasks = Vec::with_capacity(
        SIZE_CLASSES
            .len()
            .saturating_mul(DEMAND_FORMATS.len())
            .saturating_mul(TASKS_PER_COMBINATION),
    );

    for class in &SIZE_CLASSES {
        for format in DEMAND_FORMATS {
            for _ in 0..TASKS_PER_COMBINATION {
                tasks.push(DemandTask {
                    size_class: class.id,
                    format,
                });
            }
        }
    }

    tasks
}

/// The result of one demand-harness run.
#[derive(Clone, Debug)]
pub struct DemandSummary {
    /// Mean completion time in milliseconds per task class, measured from
    /// the shared start instant captured before the first admission.
    pub mean_latency_ms: BTreeMap<(SizeClassId, OutputFormat), f64>,

    /// Wall-clock time from pool start to last task completion.
    pub total: Duration,

    /// The admission limit the run was executed with.
    pub max_concurrent: NonZero<usize>,
}

impl DemandSummary {
    /// Renders the summary as a plain-text table.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_to(&mut out)
            .expect("writing to a String cannot fail");
        out
    }

    fn render_to(&self, out: &mut impl fmt::Write) -> fmt::Result {
        let rule = "=".repeat(80);

        writeln!(out, "{rule}")?;
        writeln!(
            out,
            "DEMAND RESULTS: mean completion time (ms) per task class, max {} concurrent",
            self.max_concurrent
        )?;
        writeln!(out, "{rule}")?;

        for ((size_class, format), mean) in &self.mean_latency_ms {
            writeln!(out, "{size_class:<8} {format:<6} {mean:>10.1}")?;
        }

        writeln!(out)?;
        writeln!(
            out,
            "Total elapsed: {:.0} ms",
            self.total.as_secs_f64() * 1000.0
        )
    }
}

/// Drives a task mix through a fixed-capacity pool, measuring completion
/// times against a single shared start instant captured before the first
/// task is admitted.
///
/// Failure of any one task fails the whole run - this harness favors
/// simplicity of measurement over resilience. Tasks already admitted still
/// run to completion, but no summary is produced.
///
/// # Errors
///
/// Returns the first task failure, in task order.
pub fn run_task_mix<E, F>(
    tasks: Vec<DemandTask>,
    max_concurrent: NonZero<usize>,
    op: F,
) -> Result<DemandSummary, E>
where
    E: Send,
    F: Fn(DemandTask) -> Result<(), E> + Sync,
{
    let shared_start = Instant::now();

    let outcomes = run_bounded(max_concurrent, tasks, |task| {
        let completion = op(task).map(|()| shared_start.elapsed().as_secs_f64() * 1000.0);
        (task, completion)
    });

    let total = shared_start.elapsed();

    let mut accumulated: BTreeMap<(SizeClassId, OutputFormat), (f64, u32)> = BTreeMap::new();

    for (task, completion) in outcomes {
        let completion_ms = completion?;

        let entry = accumulated
            .entry((task.size_class, task.format))
            .or_insert((0.0, 0));
        entry.0 += completion_ms;
        entry.1 += 1;
    }

    let mean_latency_ms = accumulated
        .into_iter()
        .map(|(key, (sum, count))| (key, sum / f64::from(count)))
        .collect();

    Ok(DemandSummary {
        mean_latency_ms,
        total,
        max_concurrent,
    })
}

/// Runs the standard demand mix against a real engine.
///
/// Targets use fit-within-box semantics, so undersized sources are never
/// enlarged; encode options come from the service table.
///
/// # Errors
///
/// Returns the first transform failure; no partial aggregation is
/// performed.
pub fn run_with_engine(
    engine: &Engine,
    source: &SourceImage,
    max_concurrent: NonZero<usize>,
) -> Result<DemandSummary, TransformError> {
    run_task_mix(build_task_mix(), max_concurrent, |task| {
        let class = task.size_class.profile();

        engine
            .transform(&TransformRequest {
                source: source.clone(),
                target_width: class.width,
                target_height: class.height,
                fit: ResizeFit::Within,
                options: task.format.service_options(),
                max_pixels: DEMAND_INPUT_PIXEL_LIMIT,
            })
            .map(drop)
    })
}

#[cfg(test)]
mod tests {
    use std::thread;

    use new_zealand::nz;

    use super::*;

    #[test]
    fn mix_replicates_every_combination_equally() {
        let tasks = build_task_mix();

        assert_eq!(tasks.len(), 36);

        for class in &SIZE_CLASSES {
            for format in DEMAND_FORMATS {
                let count = tasks
                    .iter()
                    .filter(|t| t.size_class == class.id && t.format == format)
                    .count();

                // Replication is flat; the declared weights do not skew it.
                assert_eq!(count, TASKS_PER_COMBINATION, "{}/{format}", class.id);
            }
        }
    }

    #[test]
    fn mix_is_ordered_class_major() {
        let tasks = build_task_mix();

        assert_eq!(
            tasks.first().copied(),
            Some(DemandTask {
                size_class: SizeClassId::Small,
                format: OutputFormat::Jpeg,
            })
        );
        assert_eq!(
            tasks.last().copied(),
            Some(DemandTask {
                size_class: SizeClassId::Large,
                format: OutputFormat::Avif,
            })
        );
    }

    #[test]
    fn size_classes_grow_and_weights_shrink() {
        assert_eq!(SIZE_CLASSES[0].width, 400);
        assert_eq!(SIZE_CLASSES[2].height, 1800);
        assert_eq!(
            SIZE_CLASSES.iter().map(|c| c.weight).sum::<u32>(),
            100,
            "weights describe a complete traffic distribution"
        );
    }

    #[test]
    fn admission_limited_total_elapsed() {
        // 12 tasks of ~5ms at 3 concurrent take ~4 waves of ~5ms.
        let tasks = vec![
            DemandTask {
                size_class: SizeClassId::Small,
                format: OutputFormat::Jpeg,
            };
            12
        ];

        let summary = run_task_mix::<String, _>(tasks, nz!(3), |_| {
            thread::sleep(std::time::Duration::from_millis(5));
            Ok(())
        })
        .unwrap();

        let total_ms = summary.total.as_secs_f64() * 1000.0;
        assert!(total_ms >= 20.0, "total {total_ms} below the wave floor");
        assert!(total_ms < 200.0, "total {total_ms} suggests serialization");
    }

    #[test]
    fn completions_are_measured_from_the_shared_start() {
        let tasks = vec![
            DemandTask {
                size_class: SizeClassId::Small,
                format: OutputFormat::Jpeg,
            };
            12
        ];

        let summary = run_task_mix::<String, _>(tasks, nz!(3), |_| {
            thread::sleep(std::time::Duration::from_millis(5));
            Ok(())
        })
        .unwrap();

        let mean = summary.mean_latency_ms[&(SizeClassId::Small, OutputFormat::Jpeg)];

        // Later waves complete ever further from the shared start, so the
        // mean must exceed the cost of a single task.
        assert!(mean > 7.0, "mean {mean} looks like per-task timing");
    }

    #[test]
    fn one_failing_task_fails_the_run() {
        let tasks = build_task_mix();

        let result = run_task_mix(tasks, nz!(4), |task| {
            if task.format == OutputFormat::Avif {
                Err("no encoder".to_string())
            } else {
                Ok(())
            }
        });

        assert_eq!(result.unwrap_err(), "no encoder");
    }

    #[test]
    fn summary_renders_every_class() {
        let summary = run_task_mix::<String, _>(build_task_mix(), nz!(8), |_| Ok(())).unwrap();

        let rendered = summary.render();

        assert!(rendered.contains("small"));
        assert!(rendered.contains("large"));
        assert!(rendered.contains("avif"));
        assert!(rendered.contains("Total elapsed"));
        assert!(rendered.contains("max 8 concurrent"));
    }
}
