//! Geometric Brownian Motion path generation.

use crate::errors::{ForecastError, ForecastResult};
use crate::state::{ModelParameters, PathEnsemble, SimulationConfig};
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use rand_pcg::Pcg64;
use rayon::prelude::*;

/// Odd 64-bit constant spacing the per-path seeds apart.
const STREAM_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Per-step exponent terms, computed once per ensemble.
///
/// price[t] = price[t-1] * exp(drift + vol * z),  z ~ N(0, 1)
///
/// which is exp of N(mu * dt, sigma * sqrt(dt)).
#[derive(Debug, Clone, Copy)]
struct StepTerms {
    drift: f64,
    vol: f64,
}

impl StepTerms {
    fn new(params: &ModelParameters, dt: f64) -> Self {
        Self {
            drift: params.mu * dt,
            vol: params.sigma * dt.sqrt(),
        }
    }

    /// Fill one row. Day 0 is the seed price, each later day one step.
    #[inline]
    fn fill_path(&self, row: &mut [f64], initial_price: f64, mut rng: Pcg64) {
        let mut price = initial_price;
        row[0] = price;
        for slot in &mut row[1..] {
            let z: f64 = StandardNormal.sample(&mut rng);
            price *= (self.drift + self.vol * z).exp();
            *slot = price;
        }
    }
}

/// Independent generator for path `index`.
///
/// Each path owns its own stream, so the ensemble does not depend on how
/// rayon splits the rows between threads.
#[inline]
fn path_rng(base_seed: u64, index: usize) -> Pcg64 {
    Pcg64::seed_from_u64(base_seed.wrapping_add((index as u64).wrapping_mul(STREAM_STRIDE)))
}

/// Simulate `config.path_count` GBM trajectories of `config.horizon_days` days.
///
/// Paths are generated in parallel. With `config.seed` set the result is
/// bit-reproducible for any worker count.
pub fn simulate(params: &ModelParameters, config: &SimulationConfig) -> ForecastResult<PathEnsemble> {
    config.validate()?;
    params.validate()?;

    let horizon = config.horizon_days;
    let len = config.path_count.checked_mul(horizon).ok_or_else(|| {
        ForecastError::InvalidConfig(format!(
            "ensemble of {} x {horizon} does not fit in memory",
            config.path_count
        ))
    })?;

    let base_seed = match config.seed {
        Some(s) => s,
        None => {
            let s: u64 = rand::random();
            tracing::info!(seed = s, "no simulation seed configured, drew one from entropy");
            s
        }
    };

    let step = StepTerms::new(params, config.day_fraction);
    let initial_price = params.initial_price;
    let mut values = vec![0.0_f64; len];

    let fill = |values: &mut [f64]| {
        values
            .par_chunks_mut(horizon)
            .enumerate()
            .for_each(|(i, row)| step.fill_path(row, initial_price, path_rng(base_seed, i)));
    };

    match config.workers {
        Some(n) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| ForecastError::InvalidConfig(format!("failed to create thread pool: {e}")))?;
            pool.install(|| fill(&mut values));
        }
        None => fill(&mut values),
    }

    tracing::debug!(
        paths = config.path_count,
        days = horizon,
        seed = base_seed,
        "ensemble simulated"
    );

    Ok(PathEnsemble::from_raw(values, config.path_count, horizon))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(initial_price: f64, mu: f64, sigma: f64) -> ModelParameters {
        ModelParameters { initial_price, mu, sigma }
    }

    fn config(horizon_days: usize, path_count: usize, seed: u64) -> SimulationConfig {
        SimulationConfig::new(horizon_days, path_count, 365.0).with_seed(Some(seed))
    }

    #[test]
    fn test_single_day_is_initial_price() {
        let e = simulate(&params(123.45, 0.5, 0.8), &config(1, 1, 7)).unwrap();
        assert_eq!(e.path_count(), 1);
        assert_eq!(e.horizon_days(), 1);
        assert_eq!(e.paths().next(), Some(&[123.45][..]));
    }

    #[test]
    fn test_deterministic_with_seed() {
        let p = params(100.0, 0.5, 0.8);
        let a = simulate(&p, &config(30, 500, 42)).unwrap();
        let b = simulate(&p, &config(30, 500, 42)).unwrap();
        assert_eq!(a, b);

        let c = simulate(&p, &config(30, 500, 43)).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_worker_count_does_not_change_output() {
        let p = params(100.0, 0.2, 0.6);
        let single = simulate(&p, &config(30, 257, 9).with_workers(Some(1))).unwrap();
        let multi = simulate(&p, &config(30, 257, 9).with_workers(Some(4))).unwrap();
        let global = simulate(&p, &config(30, 257, 9)).unwrap();
        assert_eq!(single, multi);
        assert_eq!(single, global);
    }

    #[test]
    fn test_zero_drift_zero_vol_is_constant() {
        let e = simulate(&params(100.0, 0.0, 0.0), &config(30, 1000, 1)).unwrap();
        assert_eq!(e.path_count(), 1000);
        for row in e.paths() {
            assert!(row.iter().all(|&v| v == 100.0));
        }
    }

    #[test]
    fn test_paths_start_at_initial_and_stay_positive() {
        let e = simulate(&params(100.0, -0.5, 1.5), &config(60, 200, 3)).unwrap();
        assert!(e.column(0).all(|v| v == 100.0));
        for row in e.paths() {
            assert!(row.iter().all(|&v| v > 0.0 && v.is_finite()));
        }
    }

    #[test]
    fn test_log_terminal_mean_matches_drift() {
        let (mu, sigma, days) = (0.5, 0.8, 30);
        let e = simulate(&params(100.0, mu, sigma), &config(days, 10_000, 2024)).unwrap();

        let n = e.path_count() as f64;
        let mean_log = e.column(days - 1).map(|v| (v / 100.0).ln()).sum::<f64>() / n;
        let expected = (days - 1) as f64 * mu / 365.0;
        assert!((mean_log - expected).abs() < 0.01, "mean log return {mean_log}, expected {expected}");
    }

    #[test]
    fn test_unseeded_runs_differ() {
        let p = params(100.0, 0.1, 0.5);
        let cfg = SimulationConfig::new(10, 50, 365.0);
        let a = simulate(&p, &cfg).unwrap();
        let b = simulate(&p, &cfg).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_invalid_config() {
        let p = params(100.0, 0.1, 0.2);
        let cases = [
            config(0, 10, 1),
            config(10, 0, 1),
            config(10, 10, 1).with_workers(Some(0)),
            SimulationConfig { day_fraction: 0.0, ..config(10, 10, 1) },
            SimulationConfig { day_fraction: f64::NAN, ..config(10, 10, 1) },
        ];
        for cfg in cases {
            let err = simulate(&p, &cfg).unwrap_err();
            assert!(matches!(err, ForecastError::InvalidConfig(_)), "{cfg:?} gave {err:?}");
        }
    }

    #[test]
    fn test_invalid_parameters() {
        let cfg = config(10, 10, 1);
        assert!(matches!(
            simulate(&params(0.0, 0.1, 0.2), &cfg),
            Err(ForecastError::InvalidPrice(_))
        ));
        assert!(matches!(
            simulate(&params(100.0, 0.1, f64::NAN), &cfg),
            Err(ForecastError::Numerical(_))
        ));
    }
}
