use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub symbols: usize,
    pub tick_interval_secs: u64,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        symbols: state.config.symbols.len(),
        tick_interval_secs: state.config.tick_interval_secs,
    })
}
