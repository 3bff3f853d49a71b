use axum::extract::State;
use axum::Json;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::consensus::WeightConfig;
use crate::errors::AppError;
use crate::AppState;

use super::ApiResponse;

#[derive(Serialize)]
pub struct ConfigView {
    pub confidence_threshold: Decimal,
    pub max_position_size_pct: Decimal,
    pub commission_pct: Decimal,
    pub commission_min: Decimal,
    pub base_slippage_pct: Decimal,
    pub tick_interval_secs: u64,
    pub signal_lookback_secs: u64,
    pub weights: WeightConfig,
}

/// Effective engine configuration, including the current weight tables.
pub async fn get_config(State(state): State<AppState>) -> Json<ApiResponse<ConfigView>> {
    let config = &state.config;
    Json(ApiResponse::ok(ConfigView {
        confidence_threshold: config.confidence_threshold,
        max_position_size_pct: config.max_position_size_pct,
        commission_pct: config.commission_pct,
        commission_min: config.commission_min,
        base_slippage_pct: config.base_slippage_pct,
        tick_interval_secs: config.tick_interval_secs,
        signal_lookback_secs: config.signal_lookback_secs,
        weights: state.engine.weights_snapshot().await,
    }))
}

/// Replace the agent weight tables. Validated before swap; the tick in
/// flight keeps the snapshot it started with.
pub async fn update_weights(
    State(state): State<AppState>,
    Json(weights): Json<WeightConfig>,
) -> Result<Json<ApiResponse<WeightConfig>>, AppError> {
    weights
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    state.engine.reload_weights(weights).await;
    Ok(Json(ApiResponse::ok(state.engine.weights_snapshot().await)))
}
