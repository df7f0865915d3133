use crate::config::AssetSpec;
use crate::errors::ForecastResult;
use crate::models::{estimate, simulate, summarize};
use crate::state::{ConfidenceLevel, ModelParameters, PathEnsemble, PriceSeries, SimulationConfig, SummaryStats};
use chrono::{DateTime, NaiveDate};
use std::fmt::Write;

/// Everything one pipeline run needs besides the prices.
#[derive(Debug, Clone, Copy)]
pub struct ForecastSettings {
    pub annualization: f64,
    pub simulation: SimulationConfig,
    pub confidence: ConfidenceLevel,
}

/// Output of one Estimate -> Simulate -> Summarize run.
#[derive(Debug, Clone)]
pub struct Forecast {
    pub params: ModelParameters,
    pub ensemble: PathEnsemble,
    pub summary: SummaryStats,
}

/// Run the core pipeline for one asset. Fails on the first error, no retries.
pub fn run_forecast(prices: &PriceSeries, settings: &ForecastSettings) -> ForecastResult<Forecast> {
    let params = estimate(prices, settings.annualization)?;
    let ensemble = simulate(&params, &settings.simulation)?;
    let summary = summarize(&ensemble, settings.confidence)?;
    Ok(Forecast { params, ensemble, summary })
}

/// Serializable view of a finished forecast, served by the results API.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ForecastReport {
    pub asset: String,
    pub ticker: String,
    pub history_start: Option<NaiveDate>,
    pub history_end: Option<NaiveDate>,
    pub observations: usize,
    pub horizon_days: usize,
    pub path_count: usize,
    pub params: ModelParameters,
    pub summary: SummaryStats,
}

impl ForecastReport {
    pub fn new(asset: &AssetSpec, prices: &PriceSeries, forecast: &Forecast) -> Self {
        let to_date = |ms: i64| DateTime::from_timestamp_millis(ms).map(|dt| dt.date_naive());
        Self {
            asset: asset.label.clone(),
            ticker: asset.ticker.clone(),
            history_start: prices.first().and_then(|p| to_date(p.timestamp_ms)),
            history_end: prices.last().and_then(|p| to_date(p.timestamp_ms)),
            observations: prices.len(),
            horizon_days: forecast.ensemble.horizon_days(),
            path_count: forecast.ensemble.path_count(),
            params: forecast.params,
            summary: forecast.summary.clone(),
        }
    }
}

/// Human-readable block printed after each asset.
pub fn format_report(label: &str, start: NaiveDate, forecast: &Forecast) -> String {
    let s = &forecast.summary;
    let p = &forecast.params;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{label} Forecast ({} Days from {}):",
        forecast.ensemble.horizon_days(),
        start.format("%Y-%m-%d")
    );
    let _ = writeln!(out, "Starting Price: {}", format_usd(p.initial_price));
    let _ = writeln!(out, "Median Price: {}", format_usd(s.median_terminal));
    let _ = writeln!(
        out,
        "{:.0}% CI: [{}, {}]",
        s.confidence_level.value() * 100.0,
        format_usd(s.ci_lower),
        format_usd(s.ci_upper)
    );
    let _ = writeln!(out, "Annualized Return (mu): {:.2}%", p.mu * 100.0);
    let _ = writeln!(out, "Annualized Volatility (sigma): {:.2}%", p.sigma * 100.0);
    out.push_str(&"-".repeat(50));
    out
}

/// `$1,234,567.89`
fn format_usd(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{frac_part}")
}
