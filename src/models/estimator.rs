use crate::errors::{ForecastError, ForecastResult};
use crate::state::{ModelParameters, PriceSeries};
use statrs::statistics::Statistics;

/// Fewest period returns that give a defined sample standard deviation.
const MIN_RETURNS: usize = 2;

/// Calibrate GBM parameters from a closing-price series.
///
/// mu    = mean(r) * annualization
/// sigma = stddev(r) * sqrt(annualization)
///
/// where r_t = p_t / p_{t-1} - 1 and stddev is the sample (n-1) estimator.
/// `annualization` is the number of periods per year: 365 for assets that
/// trade every day, 252 for exchange calendars.
///
/// Pure function. A constant series is valid and gives mu = sigma = 0.
pub fn estimate(prices: &PriceSeries, annualization: f64) -> ForecastResult<ModelParameters> {
    if !(annualization > 0.0) || !annualization.is_finite() {
        return Err(ForecastError::InvalidConfig(format!(
            "annualization must be positive and finite, got {annualization}"
        )));
    }

    if prices.is_empty() {
        return Err(ForecastError::InsufficientData("empty price series".into()));
    }

    let closes: Vec<f64> = prices.closes().collect();
    let returns = simple_returns(&closes);
    if returns.len() < MIN_RETURNS {
        return Err(ForecastError::InsufficientData(format!(
            "{} returns from {} prices, need at least {MIN_RETURNS}",
            returns.len(),
            closes.len()
        )));
    }

    let Some(&initial_price) = closes.last() else {
        return Err(ForecastError::InsufficientData("empty price series".into()));
    };

    let mu = returns.iter().mean() * annualization;
    let sigma = returns.iter().std_dev() * annualization.sqrt();

    let params = ModelParameters { initial_price, mu, sigma };
    params.validate()?;

    tracing::debug!(
        returns = returns.len(),
        initial_price,
        mu,
        sigma,
        "parameters estimated"
    );

    Ok(params)
}

/// Period-over-period simple returns. One fewer element than `closes`.
#[inline]
fn simple_returns(closes: &[f64]) -> Vec<f64> {
    closes.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAILY: f64 = 365.0;

    #[test]
    fn test_constant_series_has_zero_drift_and_vol() {
        let series = PriceSeries::from_closes(&[100.0, 100.0, 100.0, 100.0]);
        let params = estimate(&series, DAILY).unwrap();
        assert_eq!(params.mu, 0.0);
        assert_eq!(params.sigma, 0.0);
        assert_eq!(params.initial_price, 100.0);
    }

    #[test]
    fn test_known_returns() {
        // returns +10%, -10%
        let series = PriceSeries::from_closes(&[100.0, 110.0, 99.0]);
        let params = estimate(&series, DAILY).unwrap();

        let expected_sigma = 0.02_f64.sqrt() * DAILY.sqrt();
        assert!(params.mu.abs() < 1e-9, "mu={}", params.mu);
        assert!((params.sigma - expected_sigma).abs() < 1e-9, "sigma={}", params.sigma);
        assert_eq!(params.initial_price, 99.0);
    }

    #[test]
    fn test_annualization_is_a_parameter() {
        let series = PriceSeries::from_closes(&[100.0, 101.0, 100.5, 102.0, 103.0]);
        let crypto = estimate(&series, 365.0).unwrap();
        let equities = estimate(&series, 252.0).unwrap();

        assert!((crypto.mu / equities.mu - 365.0 / 252.0).abs() < 1e-9);
        assert!((crypto.sigma / equities.sigma - (365.0_f64 / 252.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_trending_series_is_finite() {
        let closes: Vec<f64> = (0..200).map(|i| 100.0 * (1.0 + 0.01 * (i as f64).sin())).collect();
        let params = estimate(&PriceSeries::from_closes(&closes), DAILY).unwrap();
        assert!(params.mu.is_finite());
        assert!(params.sigma.is_finite());
        assert!(params.sigma > 0.0);
    }

    #[test]
    fn test_short_series_is_insufficient() {
        for closes in [&[][..], &[100.0][..], &[100.0, 101.0][..]] {
            let err = estimate(&PriceSeries::from_closes(closes), DAILY).unwrap_err();
            assert!(
                matches!(err, ForecastError::InsufficientData(_)),
                "{} prices gave {err:?}",
                closes.len()
            );
        }
    }

    #[test]
    fn test_non_positive_last_price() {
        let series = PriceSeries::from_closes(&[100.0, 110.0, -5.0]);
        let err = estimate(&series, DAILY).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidPrice(_)), "got {err:?}");
    }

    #[test]
    fn test_zero_price_in_history_is_numerical() {
        // 0 -> 100 is an infinite return
        let series = PriceSeries::from_closes(&[100.0, 0.0, 100.0]);
        let err = estimate(&series, DAILY).unwrap_err();
        assert!(matches!(err, ForecastError::Numerical(_)), "got {err:?}");
    }

    #[test]
    fn test_nan_price_is_numerical() {
        let series = PriceSeries::from_closes(&[100.0, f64::NAN, 101.0, 102.0]);
        let err = estimate(&series, DAILY).unwrap_err();
        assert!(matches!(err, ForecastError::Numerical(_)), "got {err:?}");
    }

    #[test]
    fn test_bad_annualization() {
        let series = PriceSeries::from_closes(&[100.0, 101.0, 102.0]);
        for bad in [0.0, -365.0, f64::INFINITY, f64::NAN] {
            let err = estimate(&series, bad).unwrap_err();
            assert!(matches!(err, ForecastError::InvalidConfig(_)), "{bad} gave {err:?}");
        }
    }
}
