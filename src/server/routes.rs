use crate::server::ServerState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use std::sync::Arc;

/// GET /api/forecasts -- every report from the finished batch
pub async fn get_forecasts(
    State(state): State<Arc<ServerState>>,
) -> Json<serde_json::Value> {
    let forecasts: Vec<_> = state.reports.values().collect();
    Json(serde_json::json!({ "forecasts": forecasts }))
}

/// GET /api/forecasts/{asset} -- one report, asset label is case-insensitive
pub async fn get_forecast(
    State(state): State<Arc<ServerState>>,
    Path(asset): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.reports.get(&asset.to_uppercase()) {
        Some(report) => (StatusCode::OK, Json(serde_json::json!(report))),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("no forecast for {asset}") })),
        ),
    }
}
