use std::fmt;

use itertools::Itertools;
use pixelpipe::OutputFormat;

use crate::{MeasurementRecord, PARALLELISM_LEVELS, ResultSet, best_for_level};

const RULE_WIDTH: usize = 100;

/// Renders the complete sweep report: one latency table and
/// best-configuration section per format, followed by a cross-format
/// comparison of the best configurations per parallelism level.
///
/// This is a pure reduction over the result set - rendering the same set
/// twice produces identical text.
#[must_use]
pub fn render_report(results: &ResultSet) -> String {
    let mut out = String::new();
    render_to(&mut out, results).expect("writing to a String cannot fail");
    out
}

fn render_to(out: &mut impl fmt::Write, results: &ResultSet) -> fmt::Result {
    for format in results.formats() {
        render_format_results(out, format, results.records(format))?;
    }

    render_comparison(out, results)
}

fn render_format_results(
    out: &mut impl fmt::Write,
    format: OutputFormat,
    records: &[MeasurementRecord],
) -> fmt::Result {
    let rule = "=".repeat(RULE_WIDTH);
    let format_name = format.to_string().to_uppercase();

    writeln!(out)?;
    writeln!(out, "{rule}")?;
    writeln!(
        out,
        "RESULTS [{format_name}]: Mean completion time (ms) for N parallel operations"
    )?;
    writeln!(out, "{rule}")?;

    let header = ["Pool", "Conc", "Threads"]
        .into_iter()
        .map(str::to_string)
        .chain(PARALLELISM_LEVELS.iter().map(|level| format!("{level} ops")))
        .map(|cell| format!("{cell:>8}"))
        .join(" | ");
    writeln!(out, "{header}")?;
    writeln!(out, "{}", "-".repeat(RULE_WIDTH))?;

    // Rows are ordered by total theoretical parallel capacity; the sort is
    // stable, so equal products keep their measurement order.
    let mut sorted = records.iter().collect::<Vec<_>>();
    sorted.sort_by_key(|record| record.tunables.total_threads());

    for record in sorted {
        let row = [
            record.tunables.pool_size.to_string(),
            record.tunables.concurrency_limit.to_string(),
            record.tunables.total_threads().to_string(),
        ]
        .into_iter()
        .chain(PARALLELISM_LEVELS.iter().map(|&level| {
            record
                .mean_at(level)
                .map_or_else(|| "-".to_string(), |mean| format!("{mean:.1}"))
        }))
        .map(|cell| format!("{cell:>8}"))
        .join(" | ");
        writeln!(out, "{row}")?;
    }

    writeln!(out)?;
    writeln!(out, "{rule}")?;
    writeln!(out, "BEST CONFIGURATION [{format_name}] PER PARALLELISM LEVEL")?;
    writeln!(out, "{rule}")?;

    for &level in &PARALLELISM_LEVELS {
        let Some(best) = best_for_level(records, level) else {
            continue;
        };

        let mean = best
            .mean_at(level)
            .expect("selection only returns records that measured the level");

        writeln!(
            out,
            "{level} parallel ops: pool={}, concurrency={} ({mean:.1}ms)",
            best.tunables.pool_size, best.tunables.concurrency_limit
        )?;
    }

    Ok(())
}

fn render_comparison(out: &mut impl fmt::Write, results: &ResultSet) -> fmt::Result {
    let rule = "=".repeat(RULE_WIDTH);

    writeln!(out)?;
    writeln!(out, "{rule}")?;
    writeln!(out, "COMPARISON: Best configs across formats")?;
    writeln!(out, "{rule}")?;

    for &level in &PARALLELISM_LEVELS {
        writeln!(out)?;
        writeln!(out, "{level} parallel operations:")?;

        for format in results.formats() {
            let Some(best) = best_for_level(results.records(format), level) else {
                continue;
            };

            let mean = best
                .mean_at(level)
                .expect("selection only returns records that measured the level");

            writeln!(
                out,
                "  {format:<6}: pool={}, concurrency={} ({mean:.1}ms)",
                best.tunables.pool_size, best.tunables.concurrency_limit
            )?;
        }
    }

    Ok(())
}
