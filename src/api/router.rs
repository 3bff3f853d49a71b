use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

use super::handlers;

pub fn create_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::render));

    let api = Router::new()
        // Ledger views
        .route("/api/portfolio", get(handlers::portfolio::summary))
        .route("/api/positions", get(handlers::portfolio::positions))
        // Record streams, queryable by symbol and time range
        .route("/api/decisions", get(handlers::records::decisions))
        .route("/api/orders", get(handlers::records::orders))
        .route("/api/trades", get(handlers::records::trades))
        .route("/api/snapshots", get(handlers::records::snapshots))
        // Analytics
        .route("/api/performance", get(handlers::performance::report))
        // Configuration (weight tables are hot-reloadable)
        .route(
            "/api/config",
            get(handlers::config::get_config).put(handlers::config::update_weights),
        )
        // Intake: signal stream + reference price feed
        .route("/api/signals", post(handlers::intake::submit_signal))
        .route("/api/prices", post(handlers::intake::submit_price));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public
        .merge(api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
