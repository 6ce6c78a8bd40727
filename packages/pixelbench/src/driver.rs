use std::io;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;
use tracing::{info, warn};

use crate::{MeasurementRecord, ResultSet, SweepCell, SweepPlan, WorkerConfig, WorkerReport};

/// Errors that can make a single sweep cell produce no measurement.
///
/// Cell errors never abort a sweep - the driver logs them and moves on to
/// the next cell.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CellError {
    /// The worker process could not be spawned at all.
    #[error("worker process could not be started: {source}")]
    Spawn {
        /// The underlying spawn failure.
        source: io::Error,
    },

    /// The worker process started but terminated unsuccessfully.
    #[error("worker process failed: {status}")]
    Failed {
        /// The worker's termination status.
        status: ExitStatus,
    },

    /// The worker terminated successfully but its output is not a valid
    /// measurement report.
    #[error("worker output is not a valid report: {problem}")]
    MalformedReport {
        /// A human-readable description of the problem.
        problem: String,
    },
}

/// Executes one sweep cell and produces its measurement.
///
/// The production implementation is [`ProcessCellExecutor`]; the seam
/// exists so the sweep loop itself can be exercised without spawning
/// processes.
pub trait CellExecutor {
    /// Executes the cell, returning its measurement record.
    ///
    /// # Errors
    ///
    /// Returns a [`CellError`] when the cell produced no usable
    /// measurement.
    fn execute(&self, cell: &SweepCell) -> Result<MeasurementRecord, CellError>;
}

/// Runs each cell in a freshly spawned worker process.
///
/// The worker receives its configuration through environment variables and
/// reports back over stdout, so one cell's process-wide state can never
/// leak into another cell's measurement. The worker's stderr passes
/// through to the driver's stderr.
#[derive(Debug)]
pub struct ProcessCellExecutor {
    program: PathBuf,
}

impl ProcessCellExecutor {
    /// An executor that re-invokes the given program with the `worker`
    /// subcommand.
    #[must_use]
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    /// An executor that re-invokes the currently running binary.
    ///
    /// # Errors
    ///
    /// Returns an error when the path of the current executable cannot be
    /// determined.
    pub fn from_current_exe() -> io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }
}

impl CellExecutor for ProcessCellExecutor {
    // Mutations to process execution cause subprocess hangs in tests.
    #[cfg_attr(test, mutants::skip)]
    fn execute(&self, cell: &SweepCell) -> Result<MeasurementRecord, CellError> {
        let config = WorkerConfig::new(cell.tunables, cell.format);

        let output = Command::new(&self.program)
            .arg("worker")
            .envs(config.env_assignments())
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|source| CellError::Spawn { source })?;

        if !output.status.success() {
            return Err(CellError::Failed {
                status: output.status,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let report = parse_worker_stdout(&stdout, &config.levels)?;

        Ok(MeasurementRecord {
            tunables: cell.tunables,
            format: cell.format,
            means: report.means,
        })
    }
}

/// Parses a worker's stdout into its report.
///
/// The report is the last non-empty line, which tolerates stray output
/// ahead of it. Reports carrying a parallelism level the worker was not
/// asked to exercise are rejected; missing levels are tolerated here and
/// surface as placeholders in the report.
pub(crate) fn parse_worker_stdout(
    stdout: &str,
    requested_levels: &[u32],
) -> Result<WorkerReport, CellError> {
    let line = stdout
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| CellError::MalformedReport {
            problem: "worker produced no output".to_string(),
        })?;

    let report: WorkerReport =
        serde_json::from_str(line.trim()).map_err(|e| CellError::MalformedReport {
            problem: e.to_string(),
        })?;

    if let Some(unrequested) = report
        .means
        .keys()
        .find(|level| !requested_levels.contains(level))
    {
        return Err(CellError::MalformedReport {
            problem: format!("report contains unrequested parallelism level {unrequested}"),
        });
    }

    Ok(report)
}

/// Runs a sweep plan strictly sequentially, one isolated execution per
/// cell, and accumulates the measurements.
///
/// Cells never overlap: the next cell starts only after the previous
/// worker has terminated, keeping per-cell wall-clock attribution
/// unambiguous and process-wide tunables exclusive to one measurement at a
/// time. A failed cell is logged and skipped; the sweep continues and the
/// cell is simply absent from the result set.
pub fn run_sweep(plan: &SweepPlan, executor: &dyn CellExecutor) -> ResultSet {
    let mut results = ResultSet::new();

    for cell in plan.cells() {
        info!(
            format = %cell.format,
            pool_size = cell.tunables.pool_size.get(),
            concurrency_limit = cell.tunables.concurrency_limit.get(),
            "measuring cell"
        );

        match executor.execute(cell) {
            Ok(record) => results.append(record),
            Err(error) => {
                warn!(
                    format = %cell.format,
                    pool_size = cell.tunables.pool_size.get(),
                    concurrency_limit = cell.tunables.concurrency_limit.get(),
                    error = %error,
                    "cell produced no measurement, continuing sweep"
                );
            }
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use std::num::NonZero;

    use pixelpipe::OutputFormat;

    use crate::TunablePair;

    use super::*;

    struct StubExecutor<F>
    where
        F: Fn(&SweepCell) -> Result<MeasurementRecord, CellError>,
    {
        respond: F,
    }

    impl<F> CellExecutor for StubExecutor<F>
    where
        F: Fn(&SweepCell) -> Result<MeasurementRecord, CellError>,
    {
        fn execute(&self, cell: &SweepCell) -> Result<MeasurementRecord, CellError> {
            (self.respond)(cell)
        }
    }

    fn cell(pool_size: usize, format: OutputFormat) -> SweepCell {
        SweepCell {
            tunables: TunablePair {
                pool_size: NonZero::new(pool_size).unwrap(),
                concurrency_limit: NonZero::new(1).unwrap(),
            },
            format,
        }
    }

    fn record_for(cell: &SweepCell) -> MeasurementRecord {
        MeasurementRecord {
            tunables: cell.tunables,
            format: cell.format,
            means: [(1, 10.0)].into_iter().collect(),
        }
    }

    #[test]
    fn failed_cells_are_skipped_and_the_sweep_continues() {
        let plan = SweepPlan::from_cells(vec![
            cell(1, OutputFormat::Jpeg),
            cell(2, OutputFormat::Jpeg),
            cell(3, OutputFormat::Jpeg),
        ]);

        let executor = StubExecutor {
            respond: |cell: &SweepCell| {
                if cell.tunables.pool_size.get() == 2 {
                    Err(CellError::MalformedReport {
                        problem: "stub".to_string(),
                    })
                } else {
                    Ok(record_for(cell))
                }
            },
        };

        let results = run_sweep(&plan, &executor);

        assert_eq!(results.record_count(), 2);

        let pools = results
            .records(OutputFormat::Jpeg)
            .iter()
            .map(|r| r.tunables.pool_size.get())
            .collect::<Vec<_>>();
        assert_eq!(pools, vec![1, 3]);
    }

    #[test]
    fn two_cells_one_stub_failure_yields_one_record() {
        let plan = SweepPlan::from_cells(vec![
            cell(1, OutputFormat::Jpeg),
            cell(2, OutputFormat::Jpeg),
        ]);

        let executor = StubExecutor {
            respond: |cell: &SweepCell| {
                if cell.tunables.pool_size.get() == 1 {
                    Err(CellError::Spawn {
                        source: io::Error::other("stub"),
                    })
                } else {
                    Ok(record_for(cell))
                }
            },
        };

        let results = run_sweep(&plan, &executor);

        assert_eq!(results.record_count(), 1);
        assert_eq!(
            crate::best_for_level(results.records(OutputFormat::Jpeg), 1)
                .unwrap()
                .tunables
                .pool_size
                .get(),
            2
        );
    }

    #[test]
    fn all_cells_failing_yields_an_empty_result_set() {
        let plan = SweepPlan::from_cells(vec![cell(1, OutputFormat::Png)]);

        let executor = StubExecutor {
            respond: |_: &SweepCell| {
                Err(CellError::MalformedReport {
                    problem: "stub".to_string(),
                })
            },
        };

        assert!(run_sweep(&plan, &executor).is_empty());
    }

    #[test]
    fn records_land_in_their_format_group() {
        let plan = SweepPlan::from_cells(vec![
            cell(1, OutputFormat::Jpeg),
            cell(1, OutputFormat::Png),
        ]);

        let executor = StubExecutor {
            respond: |cell: &SweepCell| Ok(record_for(cell)),
        };

        let results = run_sweep(&plan, &executor);

        assert_eq!(
            results.formats().collect::<Vec<_>>(),
            vec![OutputFormat::Jpeg, OutputFormat::Png]
        );
    }

    #[test]
    fn stdout_parsing_accepts_a_single_json_line() {
        let report = parse_worker_stdout(r#"{"means":{"1":10.0,"4":12.5}}"#, &[1, 4]).unwrap();

        assert_eq!(report.means, [(1, 10.0), (4, 12.5)].into_iter().collect());
    }

    #[test]
    fn stdout_parsing_takes_the_last_non_empty_line() {
        let stdout = "warming up\n\n{\"means\":{\"1\":3.0}}\n";

        let report = parse_worker_stdout(stdout, &[1]).unwrap();
        assert_eq!(report.means, [(1, 3.0)].into_iter().collect());
    }

    #[test]
    fn stdout_parsing_rejects_garbage() {
        assert!(matches!(
            parse_worker_stdout("not json", &[1]),
            Err(CellError::MalformedReport { .. })
        ));
        assert!(matches!(
            parse_worker_stdout("", &[1]),
            Err(CellError::MalformedReport { .. })
        ));
    }

    #[test]
    fn stdout_parsing_rejects_unrequested_levels() {
        let result = parse_worker_stdout(r#"{"means":{"1":10.0,"2":11.0}}"#, &[1, 4]);

        assert!(matches!(result, Err(CellError::MalformedReport { .. })));
    }

    #[test]
    fn stdout_parsing_tolerates_missing_levels() {
        let report = parse_worker_stdout(r#"{"means":{"1":10.0}}"#, &[1, 4]).unwrap();

        assert_eq!(report.means.len(), 1);
    }

    #[test]
    fn missing_map_is_a_parse_error() {
        assert!(matches!(
            parse_worker_stdout(r"{}", &[1]),
            Err(CellError::MalformedReport { .. })
        ));
    }
}
