pub mod analytics;
pub mod api;
pub mod config;
pub mod consensus;
pub mod errors;
pub mod execution;
pub mod ingestion;
pub mod ledger;
pub mod metrics;
pub mod models;
pub mod services;
pub mod store;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::TradingEngine;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub engine: TradingEngine,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}
