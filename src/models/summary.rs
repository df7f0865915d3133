use crate::errors::{ForecastError, ForecastResult};
use crate::state::{ConfidenceLevel, PathEnsemble, SummaryStats};
use rayon::prelude::*;

/// Order statistics of one day's column.
#[derive(Debug, Clone, Copy)]
struct ColumnStats {
    median: f64,
    lower: f64,
    upper: f64,
}

/// Reduce an ensemble to medians and a two-sided percentile band.
///
/// GBM terminal prices are log-normal, so everything here is order based:
/// the median and the `(1-c)/2`, `(1+c)/2` percentiles of each day's column.
/// Percentiles interpolate linearly between the closest ranks.
///
/// The ensemble is read only; each column is copied before sorting.
pub fn summarize(ensemble: &PathEnsemble, confidence: ConfidenceLevel) -> ForecastResult<SummaryStats> {
    if ensemble.is_empty() {
        return Err(ForecastError::EmptyEnsemble(format!(
            "{} paths x {} days",
            ensemble.path_count(),
            ensemble.horizon_days()
        )));
    }

    if let Some(bad) = ensemble.paths().flatten().find(|v| !v.is_finite()) {
        return Err(ForecastError::Numerical(format!("ensemble contains {bad}")));
    }

    let lower_pct = confidence.lower_percentile();
    let upper_pct = confidence.upper_percentile();

    let columns: Vec<ColumnStats> = (0..ensemble.horizon_days())
        .into_par_iter()
        .map(|day| {
            let mut column: Vec<f64> = ensemble.column(day).collect();
            column.sort_unstable_by(f64::total_cmp);
            ColumnStats {
                median: percentile_sorted(&column, 50.0),
                lower: percentile_sorted(&column, lower_pct),
                upper: percentile_sorted(&column, upper_pct),
            }
        })
        .collect();

    let Some(&terminal) = columns.last() else {
        return Err(ForecastError::EmptyEnsemble("no days".into()));
    };

    Ok(SummaryStats {
        confidence_level: confidence,
        median_terminal: terminal.median,
        ci_lower: terminal.lower,
        ci_upper: terminal.upper,
        median_path: columns.iter().map(|c| c.median).collect(),
        upper_band: columns.iter().map(|c| c.upper).collect(),
        lower_band: columns.iter().map(|c| c.lower).collect(),
    })
}

/// Linear-interpolation percentile of an ascending, non-empty slice.
/// `pct` is in [0, 100].
#[inline]
fn percentile_sorted(sorted: &[f64], pct: f64) -> f64 {
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
