use crate::errors::{ForecastError, ForecastResult};
use crate::forecast::ForecastSettings;
use crate::render::chart::Rgb;
use crate::state::{ConfidenceLevel, SimulationConfig};
use chrono::{DateTime, NaiveDate, Utc};
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_ASSETS: &str = "BTC:BTCUSDT:#FF9900,ETH:ETHUSDT:#00B7EB,SOL:SOLUSDT:#00FFAA,BNB:BNBUSDT:#FFD700";

/// One asset to forecast: display label, exchange ticker, chart color.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetSpec {
    pub label: String,
    pub ticker: String,
    pub color: Rgb,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub binance_base_url: String,
    pub fetch_max_retries: u32,
    pub assets: Vec<AssetSpec>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub forecast: ForecastSettings,
    pub render_sample_paths: usize,
    pub output_dir: PathBuf,
    pub server_port: Option<u16>,
}

impl AppConfig {
    pub fn from_env() -> ForecastResult<Self> {
        dotenvy::dotenv().ok();

        let start_date = parse_date("START_DATE", &env_var_or("START_DATE", "2024-01-01"))?;
        let end_date = parse_date("END_DATE", &env_var_or("END_DATE", "2024-10-12"))?;
        if start_date >= end_date {
            return Err(ForecastError::Config(format!(
                "START_DATE {start_date} must be before END_DATE {end_date}"
            )));
        }

        let horizon_days: usize = parse_var("HORIZON_DAYS", "30")?;
        let path_count: usize = parse_var("PATH_COUNT", "10000")?;
        let annualization: f64 = parse_var("ANNUALIZATION", "365")?;
        if !(annualization > 0.0) || !annualization.is_finite() {
            return Err(ForecastError::Config(format!(
                "ANNUALIZATION must be positive, got {annualization}"
            )));
        }

        let confidence = ConfidenceLevel::new(parse_var("CONFIDENCE_LEVEL", "0.95")?)
            .map_err(|e| ForecastError::Config(format!("CONFIDENCE_LEVEL: {e}")))?;

        let seed = optional_var::<u64>("SIM_SEED")?;
        let workers = optional_var::<usize>("SIM_WORKERS")?;

        let simulation = SimulationConfig::new(horizon_days, path_count, annualization)
            .with_seed(seed)
            .with_workers(workers);
        simulation
            .validate()
            .map_err(|e| ForecastError::Config(format!("simulation: {e}")))?;

        Ok(Self {
            binance_base_url: env_var_or("BINANCE_BASE_URL", "https://api.binance.com"),
            fetch_max_retries: parse_var("FETCH_MAX_RETRIES", "3")?,
            assets: parse_assets(&env_var_or("FORECAST_ASSETS", DEFAULT_ASSETS))?,
            start_date,
            end_date,
            forecast: ForecastSettings {
                annualization,
                simulation,
                confidence,
            },
            render_sample_paths: parse_var("RENDER_SAMPLE_PATHS", "100")?,
            output_dir: PathBuf::from(env_var_or("OUTPUT_DIR", "forecasts")),
            server_port: optional_var::<u16>("SERVER_PORT")?,
        })
    }

    /// Start of the history window, midnight UTC.
    pub fn history_start(&self) -> DateTime<Utc> {
        midnight_utc(self.start_date)
    }

    /// End of the history window, midnight UTC. Candles opening later are dropped.
    pub fn history_end(&self) -> DateTime<Utc> {
        midnight_utc(self.end_date)
    }
}

/// Parse `LABEL:TICKER:#RRGGBB` entries separated by commas.
/// Labels must be unique ignoring case; they key reports and chart files.
pub fn parse_assets(entries: &str) -> ForecastResult<Vec<AssetSpec>> {
    let assets = entries
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let parts: SmallVec<[&str; 3]> = entry.split(':').map(str::trim).collect();
            let [label, ticker, color] = parts[..] else {
                return Err(ForecastError::Config(format!(
                    "FORECAST_ASSETS: expected LABEL:TICKER:#RRGGBB, got {entry:?}"
                )));
            };
            if label.is_empty() || ticker.is_empty() {
                return Err(ForecastError::Config(format!("FORECAST_ASSETS: empty field in {entry:?}")));
            }
            let color = Rgb::from_hex(color)
                .ok_or_else(|| ForecastError::Config(format!("FORECAST_ASSETS: bad color {color:?}")))?;
            Ok(AssetSpec {
                label: label.to_string(),
                ticker: ticker.to_uppercase(),
                color,
            })
        })
        .collect::<ForecastResult<Vec<_>>>()?;

    if assets.is_empty() {
        return Err(ForecastError::Config("FORECAST_ASSETS: no assets configured".into()));
    }

    let mut seen = BTreeSet::new();
    if let Some(dup) = assets.iter().find(|a| !seen.insert(a.label.to_uppercase())) {
        return Err(ForecastError::Config(format!(
            "FORECAST_ASSETS: duplicate label {:?}",
            dup.label
        )));
    }
    Ok(assets)
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn parse_date(key: &str, value: &str) -> ForecastResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| ForecastError::Config(format!("{key}: {e}")))
}

fn parse_var<T>(key: &str, default: &str) -> ForecastResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_var_or(key, default)
        .parse::<T>()
        .map_err(|e| ForecastError::Config(format!("{key}: {e}")))
}

/// Unset or empty means None.
fn optional_var<T>(key: &str) -> ForecastResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ForecastError::Config(format!("{key}: {e}"))),
        _ => Ok(None),
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
