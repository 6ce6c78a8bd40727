use std::env;
use std::num::NonZero;

use pixelpipe::OutputFormat;
use thiserror::Error;

/// Parallelism levels exercised by every sweep worker, in ascending order.
///
/// Each level is the number of transforms issued concurrently within one
/// measurement batch.
pub const PARALLELISM_LEVELS: [u32; 6] = [1, 4, 8, 16, 32, 64];

/// Default dimensions of the synthetic source image a worker transforms.
const DEFAULT_SOURCE_WIDTH: u32 = 2048;
const DEFAULT_SOURCE_HEIGHT: u32 = 1536;

/// One engine configuration under test: a worker-thread-pool size paired
/// with an internal concurrency limit.
///
/// A pair is immutable and bound to exactly one isolated worker execution.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TunablePair {
    /// Number of worker threads in the engine's pool.
    pub pool_size: NonZero<usize>,

    /// The engine's internal concurrency limit.
    pub concurrency_limit: NonZero<usize>,
}

impl TunablePair {
    /// Creates a pair from the two tunables.
    #[must_use]
    pub fn new(pool_size: NonZero<usize>, concurrency_limit: NonZero<usize>) -> Self {
        Self {
            pool_size,
            concurrency_limit,
        }
    }

    /// The product of the two tunables - a proxy for the total theoretical
    /// parallel capacity of the configuration, used to order report rows.
    #[must_use]
    pub fn total_threads(&self) -> usize {
        self.pool_size
            .get()
            .saturating_mul(self.concurrency_limit.get())
    }
}

/// The tunable pairs measured by the standard sweep, in measurement order.
///
/// This is an explicit list, not a full cartesian product: large pools skip
/// some concurrency steps, and the 9- and 10-thread pools were added at the
/// end to probe around typical core counts.
#[must_use]
pub fn standard_pairs() -> Vec<TunablePair> {
    const FULL_CONCURRENCY_STEPS: [usize; 7] = [1, 2, 4, 8, 16, 32, 64];

    let mut pairs = Vec::new();

    for pool_size in [1, 2, 4] {
        for limit in FULL_CONCURRENCY_STEPS {
            pairs.push(pair(pool_size, limit));
        }
    }

    for limit in [1, 2, 4, 8] {
        pairs.push(pair(8, limit));
    }

    for pool_size in [16, 64, 9, 10] {
        for limit in FULL_CONCURRENCY_STEPS {
            pairs.push(pair(pool_size, limit));
        }
    }

    pairs
}

fn pair(pool_size: usize, concurrency_limit: usize) -> TunablePair {
    TunablePair {
        pool_size: NonZero::new(pool_size).expect("sweep tunables are positive by construction"),
        concurrency_limit: NonZero::new(concurrency_limit)
            .expect("sweep tunables are positive by construction"),
    }
}

/// One cell of a sweep: a tunable pair measured for one output format.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SweepCell {
    /// The configuration under test.
    pub tunables: TunablePair,

    /// The output format under test.
    pub format: OutputFormat,
}

/// An ordered list of sweep cells, processed strictly sequentially by the
/// driver.
///
/// Duplicates and omissions are the caller's prerogative - the plan is
/// whatever list it was built from.
#[derive(Clone, Debug)]
pub struct SweepPlan {
    cells: Vec<SweepCell>,
}

impl SweepPlan {
    /// The standard plan: every output format, each measured across
    /// [`standard_pairs()`], formats in the order of [`OutputFormat::ALL`].
    #[must_use]
    pub fn standard() -> Self {
        let pairs = standard_pairs();

        let cells = OutputFormat::ALL
            .into_iter()
            .flat_map(|format| {
                pairs
                    .iter()
                    .map(move |&tunables| SweepCell { tunables, format })
            })
            .collect();

        Self { cells }
    }

    /// A plan consisting of exactly the given cells, in the given order.
    #[must_use]
    pub fn from_cells(cells: Vec<SweepCell>) -> Self {
        Self { cells }
    }

    /// The cells of this plan, in measurement order.
    #[must_use]
    pub fn cells(&self) -> &[SweepCell] {
        &self.cells
    }

    /// Number of cells in the plan.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the plan has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Environment variable carrying the worker-thread-pool size.
pub const ENV_POOL_SIZE: &str = "PIXELBENCH_POOL_SIZE";

/// Environment variable carrying the internal concurrency limit.
pub const ENV_CONCURRENCY: &str = "PIXELBENCH_CONCURRENCY";

/// Environment variable carrying the output format name.
pub const ENV_FORMAT: &str = "PIXELBENCH_FORMAT";

/// Environment variable carrying the comma-separated parallelism levels.
pub const ENV_LEVELS: &str = "PIXELBENCH_LEVELS";

/// Environment variable carrying the synthetic source dimensions, as
/// `WIDTHxHEIGHT`.
pub const ENV_SOURCE: &str = "PIXELBENCH_SOURCE";

/// The complete configuration of one isolated worker run.
///
/// The driver passes this to the worker process through environment
/// variables; the worker reads it exactly once at startup.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// The configuration under test.
    pub tunables: TunablePair,

    /// The output format under test.
    pub format: OutputFormat,

    /// Parallelism levels to measure, ascending.
    pub levels: Vec<u32>,

    /// Width of the synthetic source image, in pixels.
    pub source_width: u32,

    /// Height of the synthetic source image, in pixels.
    pub source_height: u32,
}

impl WorkerConfig {
    /// A worker configuration for the given cell, with the standard
    /// parallelism levels and source dimensions.
    #[must_use]
    pub fn new(tunables: TunablePair, format: OutputFormat) -> Self {
        Self {
            tunables,
            format,
            levels: PARALLELISM_LEVELS.to_vec(),
            source_width: DEFAULT_SOURCE_WIDTH,
            source_height: DEFAULT_SOURCE_HEIGHT,
        }
    }

    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error when a required variable is absent or any variable
    /// fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the configuration through the given variable lookup.
    ///
    /// This is the testable core of [`from_env()`](Self::from_env).
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let pool_size = parse_tunable(ENV_POOL_SIZE, &required(&lookup, ENV_POOL_SIZE)?)?;
        let concurrency_limit =
            parse_tunable(ENV_CONCURRENCY, &required(&lookup, ENV_CONCURRENCY)?)?;

        let format_value = required(&lookup, ENV_FORMAT)?;
        let format = format_value
            .parse::<OutputFormat>()
            .map_err(|e| ConfigError::InvalidValue {
                name: ENV_FORMAT,
                value: format_value.clone(),
                problem: e.to_string(),
            })?;

        let levels = match lookup(ENV_LEVELS) {
            Some(value) => parse_levels(&value)?,
            None => PARALLELISM_LEVELS.to_vec(),
        };

        let (source_width, source_height) = match lookup(ENV_SOURCE) {
            Some(value) => parse_source(&value)?,
            None => (DEFAULT_SOURCE_WIDTH, DEFAULT_SOURCE_HEIGHT),
        };

        Ok(Self {
            tunables: TunablePair {
                pool_size,
                concurrency_limit,
            },
            format,
            levels,
            source_width,
            source_height,
        })
    }

    /// The environment variable assignments that communicate this
    /// configuration to a worker process.
    #[must_use]
    pub fn env_assignments(&self) -> Vec<(&'static str, String)> {
        vec![
            (ENV_POOL_SIZE, self.tunables.pool_size.to_string()),
            (ENV_CONCURRENCY, self.tunables.concurrency_limit.to_string()),
            (ENV_FORMAT, self.format.to_string()),
            (
                ENV_LEVELS,
                self.levels
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            (
                ENV_SOURCE,
                format!("{}x{}", self.source_width, self.source_height),
            ),
        ]
    }
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    lookup(name).ok_or(ConfigError::MissingVariable { name })
}

fn parse_tunable(name: &'static str, value: &str) -> Result<NonZero<usize>, ConfigError> {
    value
        .parse::<NonZero<usize>>()
        .map_err(|e| ConfigError::InvalidValue {
            name,
            value: value.to_string(),
            problem: e.to_string(),
        })
}

fn parse_levels(value: &str) -> Result<Vec<u32>, ConfigError> {
    let invalid = |problem: &str| ConfigError::InvalidValue {
        name: ENV_LEVELS,
        value: value.to_string(),
        problem: problem.to_string(),
    };

    let levels = value
        .split(',')
        .map(|part| part.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| invalid(&e.to_string()))?;

    if levels.is_empty() {
        return Err(invalid("at least one level is required"));
    }

    if levels.contains(&0) {
        return Err(invalid("levels must be positive"));
    }

    if !levels.is_sorted_by(|a, b| a < b) {
        return Err(invalid("levels must be strictly ascending"));
    }

    Ok(levels)
}

fn parse_source(value: &str) -> Result<(u32, u32), ConfigError> {
    let invalid = |problem: &str| ConfigError::InvalidValue {
        name: ENV_SOURCE,
        value: value.to_string(),
        problem: problem.to_string(),
    };

    let (width, height) = value
        .split_once('x')
        .ok_or_else(|| invalid("expected WIDTHxHEIGHT"))?;

    let width = width
        .parse::<u32>()
        .map_err(|e| invalid(&e.to_string()))?;
    let height = height
        .parse::<u32>()
        .map_err(|e| invalid(&e.to_string()))?;

    if width == 0 || height == 0 {
        return Err(invalid("dimensions must be positive"));
    }

    Ok((width, height))
}

/// Errors that can occur when reading a worker configuration from the
/// environment.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("required environment variable {name} is not set")]
    MissingVariable {
        /// Name of the missing variable.
        name: &'static str,
    },

    /// An environment variable is set but does not parse.
    #[error("environment variable {name} has invalid value '{value}': {problem}")]
    InvalidValue {
        /// Name of the offending variable.
        name: &'static str,

        /// The value that failed to parse.
        value: String,

        /// A human-readable description of the problem.
        problem: String,
    },
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fmt::Debug;

    use new_zealand::nz;
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(ConfigError: Send, Sync, Debug);

    fn lookup_from(entries: &[(&'static str, &str)]) -> impl Fn(&str) -> Option<String> + '_ {
        let map = entries
            .iter()
            .map(|&(k, v)| (k, v.to_string()))
            .collect::<HashMap<_, _>>();

        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn standard_pairs_match_the_published_list() {
        let pairs = standard_pairs();

        assert_eq!(pairs.len(), 53);
        assert_eq!(pairs.first().copied(), Some(pair(1, 1)));
        assert_eq!(pairs.last().copied(), Some(pair(10, 64)));

        // The 8-thread pool only probes up to its own size.
        let eight = pairs
            .iter()
            .filter(|p| p.pool_size.get() == 8)
            .collect::<Vec<_>>();
        assert_eq!(eight.len(), 4);
    }

    #[test]
    fn standard_plan_covers_every_format() {
        let plan = SweepPlan::standard();

        assert_eq!(plan.len(), 53 * OutputFormat::ALL.len());
        assert_eq!(plan.cells().first().unwrap().format, OutputFormat::Jpeg);
        assert_eq!(plan.cells().last().unwrap().format, OutputFormat::Avif);
    }

    #[test]
    fn total_threads_is_the_product() {
        assert_eq!(pair(4, 8).total_threads(), 32);
        assert_eq!(pair(1, 1).total_threads(), 1);
    }

    #[test]
    fn config_round_trips_through_the_environment_channel() {
        let config = WorkerConfig::new(pair(4, 8), OutputFormat::WebP);

        let assignments = config.env_assignments();
        let entries = assignments
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .collect::<Vec<_>>();

        let parsed = WorkerConfig::from_lookup(lookup_from(&entries)).unwrap();

        assert_eq!(parsed.tunables, config.tunables);
        assert_eq!(parsed.format, config.format);
        assert_eq!(parsed.levels, config.levels);
        assert_eq!(parsed.source_width, config.source_width);
        assert_eq!(parsed.source_height, config.source_height);
    }

    #[test]
    fn missing_variable_is_reported_by_name() {
        let error = WorkerConfig::from_lookup(lookup_from(&[
            (ENV_POOL_SIZE, "4"),
            (ENV_CONCURRENCY, "8"),
        ]))
        .unwrap_err();

        assert!(error.to_string().contains(ENV_FORMAT));
    }

    #[test]
    fn zero_tunable_is_rejected() {
        let error = WorkerConfig::from_lookup(lookup_from(&[
            (ENV_POOL_SIZE, "0"),
            (ENV_CONCURRENCY, "8"),
            (ENV_FORMAT, "jpeg"),
        ]))
        .unwrap_err();

        assert!(matches!(error, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn unknown_format_is_rejected() {
        let error = WorkerConfig::from_lookup(lookup_from(&[
            (ENV_POOL_SIZE, "4"),
            (ENV_CONCURRENCY, "8"),
            (ENV_FORMAT, "gif"),
        ]))
        .unwrap_err();

        assert!(matches!(
            error,
            ConfigError::InvalidValue {
                name: ENV_FORMAT,
                ..
            }
        ));
    }

    #[test]
    fn optional_levels_override_the_default() {
        let config = WorkerConfig::from_lookup(lookup_from(&[
            (ENV_POOL_SIZE, "4"),
            (ENV_CONCURRENCY, "8"),
            (ENV_FORMAT, "jpeg"),
            (ENV_LEVELS, "1,4"),
        ]))
        .unwrap();

        assert_eq!(config.levels, vec![1, 4]);
    }

    #[test]
    fn unordered_levels_are_rejected() {
        let error = parse_levels("4,1").unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue { .. }));

        let error = parse_levels("4,4").unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn source_dimensions_parse() {
        assert_eq!(parse_source("320x240").unwrap(), (320, 240));
        assert!(parse_source("320").is_err());
        assert!(parse_source("0x240").is_err());
        assert!(parse_source("320x").is_err());
    }

    #[test]
    fn tunable_pair_construction() {
        let tunables = TunablePair::new(nz!(4), nz!(8));
        assert_eq!(tunables.pool_size.get(), 4);
        assert_eq!(tunables.concurrency_limit.get(), 8);
    }
}
