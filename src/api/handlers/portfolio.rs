use axum::extract::State;
use axum::Json;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::Position;
use crate::AppState;

use super::ApiResponse;

#[derive(Serialize)]
pub struct PortfolioView {
    pub cash: Decimal,
    pub positions_value: Decimal,
    pub total_value: Decimal,
    pub total_pnl: Decimal,
    pub open_positions: i64,
    pub long_positions: i64,
    pub short_positions: i64,
}

/// Current valuation of the book.
pub async fn summary(State(state): State<AppState>) -> Json<ApiResponse<PortfolioView>> {
    let valuation = state.engine.portfolio().valuation().await;
    let initial_capital = state.engine.portfolio().initial_capital().await;

    Json(ApiResponse::ok(PortfolioView {
        cash: valuation.cash,
        positions_value: valuation.positions_value,
        total_value: valuation.total_value,
        total_pnl: valuation.total_value - initial_capital,
        open_positions: valuation.open_positions,
        long_positions: valuation.long_positions,
        short_positions: valuation.short_positions,
    }))
}

/// All open positions.
pub async fn positions(State(state): State<AppState>) -> Json<ApiResponse<Vec<Position>>> {
    let positions = state.engine.portfolio().open_positions().await;
    Json(ApiResponse::ok(positions))
}
