use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{Decision, Order, PortfolioSnapshot, Trade};
use crate::AppState;

use super::ApiResponse;

#[derive(Deserialize)]
pub struct RecordQuery {
    pub symbol: Option<String>,
    pub limit: Option<i64>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub async fn decisions(
    State(state): State<AppState>,
    Query(query): Query<RecordQuery>,
) -> Result<Json<ApiResponse<Vec<Decision>>>, AppError> {
    let decisions = state
        .engine
        .store()
        .decisions(
            query.symbol.as_deref(),
            query.from,
            query.to,
            query.limit.unwrap_or(100),
        )
        .await?;
    Ok(Json(ApiResponse::ok(decisions)))
}

pub async fn orders(
    State(state): State<AppState>,
    Query(query): Query<RecordQuery>,
) -> Result<Json<ApiResponse<Vec<Order>>>, AppError> {
    let orders = state
        .engine
        .store()
        .orders(
            query.symbol.as_deref(),
            query.from,
            query.to,
            query.limit.unwrap_or(100),
        )
        .await?;
    Ok(Json(ApiResponse::ok(orders)))
}

pub async fn trades(
    State(state): State<AppState>,
    Query(query): Query<RecordQuery>,
) -> Result<Json<ApiResponse<Vec<Trade>>>, AppError> {
    let trades = state
        .engine
        .store()
        .trades(
            query.symbol.as_deref(),
            query.from,
            query.to,
            query.limit.unwrap_or(1_000),
        )
        .await?;
    Ok(Json(ApiResponse::ok(trades)))
}

pub async fn snapshots(
    State(state): State<AppState>,
    Query(query): Query<RecordQuery>,
) -> Result<Json<ApiResponse<Vec<PortfolioSnapshot>>>, AppError> {
    let snapshots = state
        .engine
        .store()
        .snapshots(query.from, query.to, query.limit.unwrap_or(1_000))
        .await?;
    Ok(Json(ApiResponse::ok(snapshots)))
}
