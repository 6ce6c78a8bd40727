use pixelpipe::{Engine, EngineOptions, ResizeFit, SourceImage, TransformError, TransformRequest};

use crate::{WorkerConfig, WorkerReport, measure_levels};

/// The fixed target box of every sweep transform.
const SWEEP_TARGET_WIDTH: u32 = 720;
const SWEEP_TARGET_HEIGHT: u32 = 480;

/// Sources with more pixels than this are rejected by sweep transforms.
const SWEEP_INPUT_PIXEL_LIMIT: u64 = 67_108_864;

/// Executes one isolated measurement run: builds an engine from the
/// configured tunables, then measures the mean transform completion time
/// at every configured parallelism level, in ascending order.
///
/// The engine is constructed once, before any measurement, and owns the
/// configured tunables for the whole run - the process-isolation boundary
/// around this function is what keeps the configuration exclusive.
///
/// Fail-fast: any transform failure invalidates the run. No partial means
/// are ever reported.
///
/// # Errors
///
/// Returns the first transform failure.
pub fn run_worker(config: &WorkerConfig) -> Result<WorkerReport, TransformError> {
    let engine = Engine::new(EngineOptions {
        worker_threads: config.tunables.pool_size,
        concurrency_limit: config.tunables.concurrency_limit,
        cache: true,
    });

    let source = SourceImage::synthetic(config.source_width, config.source_height)?;
    let options = config.format.sweep_options();

    let means = measure_levels(&config.levels, || {
        engine
            .transform(&TransformRequest {
                source: source.clone(),
                target_width: SWEEP_TARGET_WIDTH,
                target_height: SWEEP_TARGET_HEIGHT,
                fit: ResizeFit::Cover,
                options,
                max_pixels: SWEEP_INPUT_PIXEL_LIMIT,
            })
            .map(drop)
    })?;

    Ok(WorkerReport { means })
}

#[cfg(test)]
mod tests {
    use std::num::NonZero;

    use pixelpipe::OutputFormat;

    use crate::TunablePair;

    use super::*;

    fn tiny_config(levels: Vec<u32>) -> WorkerConfig {
        WorkerConfig {
            tunables: TunablePair {
                pool_size: NonZero::new(2).unwrap(),
                concurrency_limit: NonZero::new(4).unwrap(),
            },
            format: OutputFormat::Jpeg,
            levels,
            source_width: 64,
            source_height: 48,
        }
    }

    #[test]
    fn run_measures_every_configured_level() {
        let report = run_worker(&tiny_config(vec![1, 2])).unwrap();

        assert_eq!(report.means.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert!(report.means.values().all(|&mean| mean > 0.0));
    }

    #[test]
    fn run_with_no_levels_reports_no_means() {
        let report = run_worker(&tiny_config(Vec::new())).unwrap();

        assert!(report.means.is_empty());
    }
}
