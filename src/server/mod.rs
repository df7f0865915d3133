//! Read-only HTTP view of a finished batch.
//!
//! Serves the forecast reports as JSON and the rendered chart documents as
//! static files. Nothing is recomputed or updated after startup.

pub mod routes;

use crate::errors::ForecastResult;
use crate::forecast::ForecastReport;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

pub struct ServerState {
    /// Keyed by upper-case asset label.
    pub reports: BTreeMap<String, ForecastReport>,
}

pub fn router(state: Arc<ServerState>, charts_dir: &Path) -> axum::Router {
    axum::Router::new()
        .route("/api/forecasts", axum::routing::get(routes::get_forecasts))
        .route("/api/forecasts/{asset}", axum::routing::get(routes::get_forecast))
        .nest_service("/charts", tower_http::services::ServeDir::new(charts_dir))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([axum::http::Method::GET])
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: Arc<ServerState>, charts_dir: &Path, port: u16) -> ForecastResult<()> {
    let app = router(state, charts_dir);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("server listening on {addr}");

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssetSpec;
    use crate::forecast::{run_forecast, ForecastSettings};
    use crate::render::chart::Rgb;
    use crate::state::{ConfidenceLevel, PriceSeries, SimulationConfig};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn state() -> Arc<ServerState> {
        let asset = AssetSpec {
            label: "ETH".into(),
            ticker: "ETHUSDT".into(),
            color: Rgb(0x00, 0xB7, 0xEB),
        };
        let prices = PriceSeries::from_closes(&[2500.0, 2550.0, 2480.0, 2600.0, 2590.0]);
        let settings = ForecastSettings {
            annualization: 365.0,
            simulation: SimulationConfig::new(10, 100, 365.0).with_seed(Some(1)),
            confidence: ConfidenceLevel::default(),
        };
        let forecast = run_forecast(&prices, &settings).unwrap();

        let mut reports = BTreeMap::new();
        reports.insert("ETH".to_string(), ForecastReport::new(&asset, &prices, &forecast));
        Arc::new(ServerState { reports })
    }

    async fn get(uri: &str) -> (StatusCode, serde_json::Value) {
        let app = router(state(), &std::env::temp_dir());
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_list_forecasts() {
        let (status, body) = get("/api/forecasts").await;
        assert_eq!(status, StatusCode::OK);
        let list = body["forecasts"].as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["asset"], "ETH");
        assert_eq!(list[0]["observations"], 5);
    }

    #[tokio::test]
    async fn test_get_forecast_case_insensitive() {
        let (status, body) = get("/api/forecasts/eth").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ticker"], "ETHUSDT");
        assert_eq!(body["params"]["initial_price"], 2590.0);
        assert_eq!(body["summary"]["median_path"].as_array().unwrap().len(), 10);
        assert_eq!(body["summary"]["confidence_level"], 0.95);
    }

    #[tokio::test]
    async fn test_writes_are_rejected() {
        let app = router(state(), &std::env::temp_dir());
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/forecasts/ETH")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_unknown_asset_is_404() {
        let (status, body) = get("/api/forecasts/DOGE").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("DOGE"));
    }
}
