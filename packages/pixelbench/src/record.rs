use std::collections::BTreeMap;

use pixelpipe::OutputFormat;
use serde::{Deserialize, Serialize};

use crate::TunablePair;

/// The wire form of a worker's measurement result.
///
/// A worker emits exactly one of these as a single JSON line on stdout.
/// The mapping goes from parallelism level to mean completion time in
/// milliseconds and, on success, contains an entry for every level the
/// worker was asked to exercise - never any other.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct WorkerReport {
    /// Mean completion time in milliseconds, per parallelism level.
    pub means: BTreeMap<u32, f64>,
}

/// One complete measurement: the configuration that was applied, the format
/// that was exercised and the mean completion time per parallelism level.
///
/// Records are created once per successful worker run and never mutated.
#[derive(Clone, Debug, PartialEq)]
pub struct MeasurementRecord {
    /// The configuration the worker applied.
    pub tunables: TunablePair,

    /// The output format the worker exercised.
    pub format: OutputFormat,

    /// Mean completion time in milliseconds, per parallelism level.
    pub means: BTreeMap<u32, f64>,
}

impl MeasurementRecord {
    /// The mean completion time at the given parallelism level, if the
    /// record has one.
    #[must_use]
    pub fn mean_at(&self, level: u32) -> Option<f64> {
        self.means.get(&level).copied()
    }
}

/// The accumulated measurements of one sweep, grouped by output format.
///
/// Append-only: the driver adds records as cells complete and the reporter
/// consumes the set read-only. Groups appear in the order their format was
/// first seen, and records within a group keep their append order.
#[derive(Clone, Debug, Default)]
pub struct ResultSet {
    groups: Vec<(OutputFormat, Vec<MeasurementRecord>)>,
}

impl ResultSet {
    /// Creates an empty result set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record to its format's group, creating the group if this
    /// is the first record for the format.
    pub fn append(&mut self, record: MeasurementRecord) {
        match self
            .groups
            .iter_mut()
            .find(|(format, _)| *format == record.format)
        {
            Some((_, records)) => records.push(record),
            None => self.groups.push((record.format, vec![record])),
        };
    }

    /// The formats that have at least one record, in first-seen order.
    pub fn formats(&self) -> impl Iterator<Item = OutputFormat> + '_ {
        self.groups.iter().map(|(format, _)| *format)
    }

    /// The records for the given format, in append order.
    #[must_use]
    pub fn records(&self, format: OutputFormat) -> &[MeasurementRecord] {
        self.groups
            .iter()
            .find(|(f, _)| *f == format)
            .map_or(&[], |(_, records)| records)
    }

    /// Total number of records across all formats.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.groups.iter().map(|(_, records)| records.len()).sum()
    }

    /// Whether the set has no records at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Selects the best configuration at the given parallelism level: the
/// record with the minimum mean among those that measured the level.
///
/// Records missing the level are excluded. Ties go to the earliest record
/// in the slice, so with records in append order the first-listed
/// configuration wins.
#[must_use]
pub fn best_for_level(records: &[MeasurementRecord], level: u32) -> Option<&MeasurementRecord> {
    let mut best: Option<(&MeasurementRecord, f64)> = None;

    for record in records {
        let Some(mean) = record.mean_at(level) else {
            continue;
        };

        match best {
            // Strictly-smaller replacement keeps the first of any tie.
            Some((_, best_mean)) if mean >= best_mean => {}
            _ => best = Some((record, mean)),
        }
    }

    best.map(|(record, _)| record)
}

#[cfg(test)]
mod tests {
    use std::num::NonZero;

    use super::*;

    fn record(
        pool_size: usize,
        concurrency_limit: usize,
        format: OutputFormat,
        means: &[(u32, f64)],
    ) -> MeasurementRecord {
        MeasurementRecord {
            tunables: TunablePair {
                pool_size: NonZero::new(pool_size).unwrap(),
                concurrency_limit: NonZero::new(concurrency_limit).unwrap(),
            },
            format,
            means: means.iter().copied().collect(),
        }
    }

    #[test]
    fn wire_report_round_trips() {
        let report = WorkerReport {
            means: [(1, 10.5), (4, 20.25)].into_iter().collect(),
        };

        let line = serde_json::to_string(&report).unwrap();
        assert_eq!(line, r#"{"means":{"1":10.5,"4":20.25}}"#);

        let parsed: WorkerReport = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, report);
    }

    #[test]
    fn result_set_groups_by_format_in_first_seen_order() {
        let mut results = ResultSet::new();

        results.append(record(1, 1, OutputFormat::Png, &[(1, 5.0)]));
        results.append(record(1, 1, OutputFormat::Jpeg, &[(1, 6.0)]));
        results.append(record(2, 1, OutputFormat::Png, &[(1, 7.0)]));

        assert_eq!(
            results.formats().collect::<Vec<_>>(),
            vec![OutputFormat::Png, OutputFormat::Jpeg]
        );
        assert_eq!(results.records(OutputFormat::Png).len(), 2);
        assert_eq!(results.records(OutputFormat::Jpeg).len(), 1);
        assert_eq!(results.record_count(), 3);
        assert!(results.records(OutputFormat::Avif).is_empty());
    }

    #[test]
    fn best_picks_the_minimum_mean() {
        let records = vec![
            record(1, 1, OutputFormat::Jpeg, &[(1, 30.0), (4, 50.0)]),
            record(2, 2, OutputFormat::Jpeg, &[(1, 10.0), (4, 60.0)]),
            record(4, 4, OutputFormat::Jpeg, &[(1, 20.0), (4, 40.0)]),
        ];

        let best = best_for_level(&records, 1).unwrap();
        assert_eq!(best.tunables.pool_size.get(), 2);

        let best = best_for_level(&records, 4).unwrap();
        assert_eq!(best.tunables.pool_size.get(), 4);
    }

    #[test]
    fn best_excludes_records_missing_the_level() {
        let records = vec![
            record(1, 1, OutputFormat::Jpeg, &[(1, 1.0)]),
            record(2, 2, OutputFormat::Jpeg, &[(1, 5.0), (4, 9.0)]),
        ];

        let best = best_for_level(&records, 4).unwrap();
        assert_eq!(best.tunables.pool_size.get(), 2);
    }

    #[test]
    fn best_of_no_measurements_is_none() {
        let records = vec![record(1, 1, OutputFormat::Jpeg, &[(1, 1.0)])];

        assert!(best_for_level(&records, 64).is_none());
        assert!(best_for_level(&[], 1).is_none());
    }

    #[test]
    fn ties_go_to_the_first_listed_record() {
        let records = vec![
            record(1, 8, OutputFormat::Jpeg, &[(1, 10.0)]),
            record(8, 1, OutputFormat::Jpeg, &[(1, 10.0)]),
        ];

        let best = best_for_level(&records, 1).unwrap();
        assert_eq!(best.tunables.pool_size.get(), 1);
    }
}
