use crate::errors::{ForecastError, ForecastResult};

// ── Price Series ──

/// One daily close as delivered by the market data feed.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PricePoint {
    pub timestamp_ms: i64,
    pub close: f64,
}

/// Time-ascending closing prices. Immutable once built.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Wrap feed output. Timestamps must be strictly ascending; prices are
    /// taken as delivered.
    pub fn new(points: Vec<PricePoint>) -> ForecastResult<Self> {
        if let Some(w) = points.windows(2).find(|w| w[1].timestamp_ms <= w[0].timestamp_ms) {
            return Err(ForecastError::MarketData(format!(
                "timestamps not ascending: {} followed by {}",
                w[0].timestamp_ms, w[1].timestamp_ms
            )));
        }
        Ok(Self { points })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn closes(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.close)
    }

    #[inline]
    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    #[inline]
    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }
}

#[cfg(test)]
impl PriceSeries {
    /// Daily series starting at the epoch, for tests that only care about closes.
    pub fn from_closes(closes: &[f64]) -> Self {
        const DAY_MS: i64 = 86_400_000;
        Self {
            points: closes
                .iter()
                .enumerate()
                .map(|(i, &close)| PricePoint { timestamp_ms: i as i64 * DAY_MS, close })
                .collect(),
        }
    }
}

// ── Model Parameters ──

/// Calibrated GBM parameters. `mu` and `sigma` are annualized.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ModelParameters {
    pub initial_price: f64,
    pub mu: f64,
    pub sigma: f64,
}

impl ModelParameters {
    /// Checks `initial_price > 0`, finite `mu`, finite non-negative `sigma`.
    pub fn validate(&self) -> ForecastResult<()> {
        if !(self.initial_price > 0.0) || !self.initial_price.is_finite() {
            return Err(ForecastError::InvalidPrice(format!(
                "initial price must be positive and finite, got {}",
                self.initial_price
            )));
        }
        if !self.mu.is_finite() || !self.sigma.is_finite() {
            return Err(ForecastError::Numerical(format!(
                "non-finite parameters: mu={}, sigma={}",
                self.mu, self.sigma
            )));
        }
        if self.sigma < 0.0 {
            return Err(ForecastError::Numerical(format!(
                "sigma must be non-negative, got {}",
                self.sigma
            )));
        }
        Ok(())
    }
}

// ── Simulation Config ──

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    /// Number of days per path, including day 0 (the seed price).
    pub horizon_days: usize,
    pub path_count: usize,
    /// Length of one step in years.
    pub day_fraction: f64,
    /// Base seed for the per-path streams. None draws one from OS entropy.
    pub seed: Option<u64>,
    /// Dedicated thread count. None uses the global rayon pool.
    pub workers: Option<usize>,
}

impl SimulationConfig {
    /// Config with one step per calendar day of a year of `annualization` days.
    pub fn new(horizon_days: usize, path_count: usize, annualization: f64) -> Self {
        Self {
            horizon_days,
            path_count,
            day_fraction: 1.0 / annualization,
            seed: None,
            workers: None,
        }
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }

    pub fn validate(&self) -> ForecastResult<()> {
        if self.horizon_days < 1 {
            return Err(ForecastError::InvalidConfig("horizon_days must be at least 1".into()));
        }
        if self.path_count < 1 {
            return Err(ForecastError::InvalidConfig("path_count must be at least 1".into()));
        }
        if !(self.day_fraction > 0.0) || !self.day_fraction.is_finite() {
            return Err(ForecastError::InvalidConfig(format!(
                "day_fraction must be positive and finite, got {}",
                self.day_fraction
            )));
        }
        if self.workers == Some(0) {
            return Err(ForecastError::InvalidConfig("workers must be at least 1".into()));
        }
        Ok(())
    }
}

// ── Confidence Level ──

/// Two-sided coverage of the reported interval, in (0, 1).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(transparent)]
pub struct ConfidenceLevel(f64);

impl ConfidenceLevel {
    pub fn new(level: f64) -> ForecastResult<Self> {
        if !(level > 0.0 && level < 1.0) {
            return Err(ForecastError::InvalidConfig(format!(
                "confidence level must be in (0, 1), got {level}"
            )));
        }
        Ok(Self(level))
    }

    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Lower percentile in [0, 100]. 0.95 -> 2.5.
    #[inline]
    pub fn lower_percentile(self) -> f64 {
        (1.0 - self.0) / 2.0 * 100.0
    }

    /// Upper percentile in [0, 100]. 0.95 -> 97.5.
    #[inline]
    pub fn upper_percentile(self) -> f64 {
        (1.0 + self.0) / 2.0 * 100.0
    }
}

impl Default for ConfidenceLevel {
    fn default() -> Self {
        Self(0.95)
    }
}

// ── Path Ensemble ──

/// Simulated trajectories, row-major `(path_count, horizon_days)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathEnsemble {
    values: Vec<f64>,
    path_count: usize,
    horizon_days: usize,
}

impl PathEnsemble {
    pub(crate) fn from_raw(values: Vec<f64>, path_count: usize, horizon_days: usize) -> Self {
        debug_assert_eq!(values.len(), path_count * horizon_days);
        Self { values, path_count, horizon_days }
    }

    #[inline]
    pub fn path_count(&self) -> usize {
        self.path_count
    }

    #[inline]
    pub fn horizon_days(&self) -> usize {
        self.horizon_days
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.path_count == 0 || self.horizon_days == 0
    }

    /// Rows in order. Yields nothing when the horizon is zero.
    pub fn paths(&self) -> std::slice::ChunksExact<'_, f64> {
        self.values.chunks_exact(self.horizon_days.max(1))
    }

    /// The first `n` rows, used to bound what a renderer draws.
    pub fn sample(&self, n: usize) -> impl Iterator<Item = &[f64]> + '_ {
        self.paths().take(n)
    }

    /// Values of day `day` across all paths.
    pub fn column(&self, day: usize) -> impl Iterator<Item = f64> + '_ {
        self.paths().map(move |row| row[day])
    }
}

#[cfg(test)]
impl PathEnsemble {
    /// Build from explicit rows. Rows must share one length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        let path_count = rows.len();
        let horizon_days = rows.first().map_or(0, Vec::len);
        assert!(rows.iter().all(|r| r.len() == horizon_days), "ragged rows");
        let values = if horizon_days == 0 { Vec::new() } else { rows.concat() };
        Self { values, path_count, horizon_days }
    }
}

// ── Summary Statistics ──

/// Order statistics of an ensemble. All band vectors have one entry per day.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SummaryStats {
    pub confidence_level: ConfidenceLevel,
    pub median_terminal: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub median_path: Vec<f64>,
    pub upper_band: Vec<f64>,
    pub lower_band: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_rejects_unordered_timestamps() {
        let points = vec![
            PricePoint { timestamp_ms: 10, close: 1.0 },
            PricePoint { timestamp_ms: 10, close: 2.0 },
        ];
        assert!(matches!(PriceSeries::new(points), Err(ForecastError::MarketData(_))));
    }

    #[test]
    fn test_confidence_percentiles() {
        let c = ConfidenceLevel::default();
        assert!((c.lower_percentile() - 2.5).abs() < 1e-12);
        assert!((c.upper_percentile() - 97.5).abs() < 1e-12);

        let c = ConfidenceLevel::new(0.9).unwrap();
        assert!((c.lower_percentile() - 5.0).abs() < 1e-12);
        assert!((c.upper_percentile() - 95.0).abs() < 1e-12);
    }

    #[test]
    fn test_confidence_bounds() {
        for bad in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
            assert!(
                matches!(ConfidenceLevel::new(bad), Err(ForecastError::InvalidConfig(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_parameters_validation() {
        let ok = ModelParameters { initial_price: 100.0, mu: 0.1, sigma: 0.0 };
        assert!(ok.validate().is_ok());

        let bad_price = ModelParameters { initial_price: 0.0, ..ok };
        assert!(matches!(bad_price.validate(), Err(ForecastError::InvalidPrice(_))));

        let nan_sigma = ModelParameters { sigma: f64::NAN, ..ok };
        assert!(matches!(nan_sigma.validate(), Err(ForecastError::Numerical(_))));

        let inf_mu = ModelParameters { mu: f64::INFINITY, ..ok };
        assert!(matches!(inf_mu.validate(), Err(ForecastError::Numerical(_))));
    }

    #[test]
    fn test_ensemble_accessors() {
        let e = PathEnsemble::from_rows(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        assert_eq!(e.path_count(), 2);
        assert_eq!(e.horizon_days(), 3);
        assert_eq!(e.paths().nth(1), Some(&[4.0, 5.0, 6.0][..]));
        assert_eq!(e.paths().nth(2), None);
        assert_eq!(e.column(2).collect::<Vec<_>>(), vec![3.0, 6.0]);
        assert_eq!(e.sample(1).count(), 1);
        assert_eq!(e.sample(10).count(), 2);
    }

    #[test]
    fn test_zero_horizon_ensemble_has_no_rows() {
        let e = PathEnsemble::from_rows(vec![vec![], vec![]]);
        assert!(e.is_empty());
        assert_eq!(e.paths().count(), 0);
    }
}
