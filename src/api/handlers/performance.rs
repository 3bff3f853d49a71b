use axum::extract::State;
use axum::Json;

use crate::analytics::{self, PerformanceReport};
use crate::errors::AppError;
use crate::AppState;

use super::ApiResponse;

/// Win rate, Sharpe, profit factor and drawdown over the recorded history.
pub async fn report(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<PerformanceReport>>, AppError> {
    let store = state.engine.store();
    let trades = store.trades(None, None, None, 10_000).await?;
    let snapshots = store.snapshots(None, None, 10_000).await?;

    Ok(Json(ApiResponse::ok(analytics::performance_report(
        &trades, &snapshots,
    ))))
}
