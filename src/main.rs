mod config;
mod errors;
mod feeds;
mod forecast;
mod models;
mod render;
mod server;
mod state;

use crate::config::{AppConfig, AssetSpec};
use crate::errors::ForecastResult;
use crate::feeds::binance::BinanceClient;
use crate::forecast::{format_report, run_forecast, ForecastReport};
use crate::render::chart::ChartRenderer;
use crate::server::ServerState;
use crate::state::PriceSeries;
use std::collections::BTreeMap;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("gbm_forecast starting");

    let cfg = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        assets = cfg.assets.len(),
        start = %cfg.start_date,
        end = %cfg.end_date,
        horizon_days = cfg.forecast.simulation.horizon_days,
        path_count = cfg.forecast.simulation.path_count,
        annualization = cfg.forecast.annualization,
        confidence = cfg.forecast.confidence.value(),
        "configuration loaded"
    );

    let client = BinanceClient::new(&cfg.binance_base_url, cfg.fetch_max_retries);
    let renderer = ChartRenderer::new(cfg.output_dir.clone(), cfg.render_sample_paths);

    // Fetch every history concurrently; each result is handled on its own below.
    let (start, end) = (cfg.history_start(), cfg.history_end());
    let histories = futures_util::future::join_all(
        cfg.assets
            .iter()
            .map(|asset| client.fetch_daily_closes(&asset.ticker, start, end)),
    )
    .await;

    let mut reports: BTreeMap<String, ForecastReport> = BTreeMap::new();
    for (asset, history) in cfg.assets.iter().zip(histories) {
        match process_asset(asset, history, &cfg, &renderer).await {
            Ok(report) => {
                reports.insert(asset.label.to_uppercase(), report);
            }
            Err(e) => {
                // One asset failing must not abort the batch
                tracing::error!(asset = %asset.label, error = %e, "forecast failed");
            }
        }
    }

    tracing::info!(
        succeeded = reports.len(),
        failed = cfg.assets.len() - reports.len(),
        "batch complete"
    );

    if let Some(port) = cfg.server_port {
        let state = Arc::new(ServerState { reports });
        if let Err(e) = server::serve(state, renderer.output_dir(), port).await {
            tracing::error!("server error: {e}");
            std::process::exit(1);
        }
    }
}

/// Estimate, simulate, summarize, report and render one asset.
async fn process_asset(
    asset: &AssetSpec,
    history: ForecastResult<PriceSeries>,
    cfg: &AppConfig,
    renderer: &ChartRenderer,
) -> ForecastResult<ForecastReport> {
    let prices = history?;
    tracing::info!(asset = %asset.label, observations = prices.len(), "history fetched");

    // Simulation is CPU bound; keep it off the async workers.
    let settings = cfg.forecast;
    let (prices, forecast) = tokio::task::spawn_blocking(move || {
        run_forecast(&prices, &settings).map(|f| (prices, f))
    })
    .await??;

    tracing::info!(
        asset = %asset.label,
        initial_price = forecast.params.initial_price,
        mu = forecast.params.mu,
        sigma = forecast.params.sigma,
        median = forecast.summary.median_terminal,
        ci_lower = forecast.summary.ci_lower,
        ci_upper = forecast.summary.ci_upper,
        "forecast complete"
    );

    println!("{}", format_report(&asset.label, cfg.end_date, &forecast));

    // Charts are optional output; a failed write leaves the statistics intact.
    match renderer
        .render(asset, cfg.end_date, &forecast.ensemble, &forecast.summary)
        .await
    {
        Ok(path) => tracing::info!(asset = %asset.label, path = %path.display(), "chart rendered"),
        Err(e) => tracing::warn!(asset = %asset.label, error = %e, "chart render failed"),
    }

    Ok(ForecastReport::new(asset, &prices, &forecast))
}
