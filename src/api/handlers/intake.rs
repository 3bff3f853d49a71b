use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::AgentSignal;
use crate::AppState;

#[derive(Serialize)]
pub struct Ack {
    pub accepted: bool,
}

/// Signal Intake: external analysts push timestamped signals here.
pub async fn submit_signal(
    State(state): State<AppState>,
    Json(signal): Json<AgentSignal>,
) -> Result<(StatusCode, Json<Ack>), AppError> {
    if signal.symbol.is_empty() || signal.agent_name.is_empty() {
        return Err(AppError::BadRequest(
            "symbol and agent_name are required".into(),
        ));
    }

    tracing::debug!(
        symbol = %signal.symbol,
        agent = %signal.agent_name,
        direction = %signal.direction,
        strength = signal.strength,
        confidence = %signal.confidence,
        "Signal received"
    );

    state.engine.signals().push(signal).await;
    Ok((StatusCode::ACCEPTED, Json(Ack { accepted: true })))
}

#[derive(Deserialize)]
pub struct PriceUpdate {
    pub symbol: String,
    pub price: Decimal,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// Reference price feed: latest marks for the symbols the engine trades.
pub async fn submit_price(
    State(state): State<AppState>,
    Json(update): Json<PriceUpdate>,
) -> Result<(StatusCode, Json<Ack>), AppError> {
    if update.symbol.is_empty() {
        return Err(AppError::BadRequest("symbol is required".into()));
    }
    if update.price <= Decimal::ZERO {
        return Err(AppError::BadRequest("price must be positive".into()));
    }

    state
        .engine
        .prices()
        .push(&update.symbol, update.price, update.timestamp)
        .await;
    Ok((StatusCode::ACCEPTED, Json(Ack { accepted: true })))
}
