use crate::config::AssetSpec;
use crate::errors::{ForecastError, ForecastResult};
use crate::state::{PathEnsemble, SummaryStats};
use chrono::{Days, NaiveDate};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// Opacity of the confidence band fill.
const BAND_ALPHA: f64 = 0.25;

const BACKGROUND: &str = "rgb(40, 40, 40)";
const GRID: &str = "rgba(255, 255, 255, 0.1)";

/// An asset's line color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Parse `#RRGGBB`.
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }

    pub fn rgba(self, alpha: f64) -> String {
        format!("rgba({}, {}, {}, {alpha})", self.0, self.1, self.2)
    }
}

/// Writes one Plotly figure document per asset.
///
/// The figure holds the first `sample_paths` trajectories, the dashed median
/// path and the filled confidence band, on a dark layout with a date axis.
/// Rendering never feeds back into the statistics.
pub struct ChartRenderer {
    output_dir: PathBuf,
    sample_paths: usize,
}

impl ChartRenderer {
    pub fn new(output_dir: PathBuf, sample_paths: usize) -> Self {
        Self { output_dir, sample_paths }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `<output_dir>/<label>_forecast.json` and return its path.
    pub async fn render(
        &self,
        asset: &AssetSpec,
        start: NaiveDate,
        ensemble: &PathEnsemble,
        summary: &SummaryStats,
    ) -> ForecastResult<PathBuf> {
        let figure = build_figure(asset, start, ensemble, summary, self.sample_paths)?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self
            .output_dir
            .join(format!("{}_forecast.json", asset.label.to_lowercase()));
        tokio::fs::write(&path, serde_json::to_vec_pretty(&figure)?).await?;

        tracing::debug!(asset = %asset.label, path = %path.display(), "chart written");
        Ok(path)
    }
}

/// One date label per simulated day, starting at `start`.
fn date_axis(start: NaiveDate, days: usize) -> ForecastResult<Vec<String>> {
    (0..days as u64)
        .map(|d| {
            start
                .checked_add_days(Days::new(d))
                .map(|date| date.format("%Y-%m-%d").to_string())
                .ok_or_else(|| ForecastError::Render(format!("date overflow at {start} + {d} days")))
        })
        .collect()
}

fn build_figure(
    asset: &AssetSpec,
    start: NaiveDate,
    ensemble: &PathEnsemble,
    summary: &SummaryStats,
    sample_paths: usize,
) -> ForecastResult<Value> {
    if summary.median_path.len() != ensemble.horizon_days() {
        return Err(ForecastError::Render(format!(
            "summary covers {} days, ensemble {}",
            summary.median_path.len(),
            ensemble.horizon_days()
        )));
    }

    let dates = date_axis(start, ensemble.horizon_days())?;
    let color = asset.color.hex();

    let mut traces: Vec<Value> = ensemble
        .sample(sample_paths)
        .map(|row| {
            json!({
                "type": "scatter",
                "x": dates,
                "y": row,
                "mode": "lines",
                "line": { "color": color, "width": 0.8 },
                "opacity": 0.3,
                "showlegend": false,
            })
        })
        .collect();

    traces.push(json!({
        "type": "scatter",
        "x": dates,
        "y": summary.median_path,
        "mode": "lines",
        "line": { "color": color, "width": 2.5, "dash": "dash" },
        "name": format!("{} Median", asset.label),
    }));

    // Band polygon: upper edge forward, lower edge back.
    let band_x: Vec<&String> = dates.iter().chain(dates.iter().rev()).collect();
    let band_y: Vec<f64> = summary
        .upper_band
        .iter()
        .chain(summary.lower_band.iter().rev())
        .copied()
        .collect();

    traces.push(json!({
        "type": "scatter",
        "x": band_x,
        "y": band_y,
        "fill": "toself",
        "fillcolor": asset.color.rgba(BAND_ALPHA),
        "line": { "color": "rgba(255,255,255,0)" },
        "name": format!("{:.0}% CI", summary.confidence_level.value() * 100.0),
    }));

    Ok(json!({
        "data": traces,
        "layout": {
            "title": {
                "text": format!("{} Price Forecast (Monte Carlo Simulation)", asset.label),
                "font": { "color": "white" },
            },
            "xaxis": {
                "title": { "text": "Date", "font": { "color": "white" } },
                "gridcolor": GRID,
                "gridwidth": 0.5,
            },
            "yaxis": {
                "title": { "text": "Price (USD)", "font": { "color": "white" } },
                "gridcolor": GRID,
                "gridwidth": 0.5,
            },
            "plot_bgcolor": BACKGROUND,
            "paper_bgcolor": BACKGROUND,
            "font": { "color": "white" },
            "showlegend": true,
            "margin": { "l": 50, "r": 50, "t": 50, "b": 50 },
        },
    }))
}
