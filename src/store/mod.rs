pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use chrono::{DateTime, Utc};
use std::future::Future;
use thiserror::Error;
use tokio::time::{sleep, Duration};

use crate::models::{Decision, Order, PortfolioSnapshot, Trade};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persistence backend for the append-only record streams.
///
/// Business logic never lives here (the original kept P&L math in stored
/// procedures; this engine computes everything in `analytics/` and only
/// appends finished records).
#[derive(Clone)]
pub enum Store {
    Memory(MemoryStore),
    Postgres(PgStore),
}

impl Store {
    pub fn memory() -> Self {
        Store::Memory(MemoryStore::new())
    }

    /// Connect to Postgres and create the record tables if missing.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let store = PgStore::connect(database_url).await?;
        Ok(Store::Postgres(store))
    }

    pub async fn record_decision(&self, decision: &Decision) -> Result<(), StoreError> {
        match self {
            Store::Memory(s) => s.record_decision(decision).await,
            Store::Postgres(s) => s.record_decision(decision).await,
        }
    }

    pub async fn record_order(&self, order: &Order) -> Result<(), StoreError> {
        match self {
            Store::Memory(s) => s.record_order(order).await,
            Store::Postgres(s) => s.record_order(order).await,
        }
    }

    pub async fn record_trade(&self, trade: &Trade) -> Result<(), StoreError> {
        match self {
            Store::Memory(s) => s.record_trade(trade).await,
            Store::Postgres(s) => s.record_trade(trade).await,
        }
    }

    pub async fn record_snapshot(&self, snapshot: &PortfolioSnapshot) -> Result<(), StoreError> {
        match self {
            Store::Memory(s) => s.record_snapshot(snapshot).await,
            Store::Postgres(s) => s.record_snapshot(snapshot).await,
        }
    }

    /// Most recent decisions, newest first, optionally filtered by symbol
    /// and time range.
    pub async fn decisions(
        &self,
        symbol: Option<&str>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<Decision>, StoreError> {
        match self {
            Store::Memory(s) => s.decisions(symbol, from, to, limit).await,
            Store::Postgres(s) => s.decisions(symbol, from, to, limit).await,
        }
    }

    /// Most recent orders, newest first, optionally filtered by symbol and
    /// time range.
    pub async fn orders(
        &self,
        symbol: Option<&str>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<Order>, StoreError> {
        match self {
            Store::Memory(s) => s.orders(symbol, from, to, limit).await,
            Store::Postgres(s) => s.orders(symbol, from, to, limit).await,
        }
    }

    /// Trades in exit-time order (oldest first), optionally filtered by
    /// symbol and time range.
    pub async fn trades(
        &self,
        symbol: Option<&str>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<Trade>, StoreError> {
        match self {
            Store::Memory(s) => s.trades(symbol, from, to, limit).await,
            Store::Postgres(s) => s.trades(symbol, from, to, limit).await,
        }
    }

    /// Snapshots in time order (oldest first).
    pub async fn snapshots(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<PortfolioSnapshot>, StoreError> {
        match self {
            Store::Memory(s) => s.snapshots(from, to, limit).await,
            Store::Postgres(s) => s.snapshots(from, to, limit).await,
        }
    }

    /// Earliest snapshot at or after `cutoff` — the daily P&L baseline.
    pub async fn earliest_snapshot_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<PortfolioSnapshot>, StoreError> {
        match self {
            Store::Memory(s) => s.earliest_snapshot_since(cutoff).await,
            Store::Postgres(s) => s.earliest_snapshot_since(cutoff).await,
        }
    }
}

/// Run a persistence write with bounded retry and exponential backoff.
///
/// A successful fill must never be silently dropped: on exhaustion the error
/// is returned so the caller can mark the tick degraded for that symbol and
/// keep going.
pub async fn with_retry<T, F, Fut>(operation: &str, attempts: u32, f: F) -> Result<T, StoreError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut delay = Duration::from_millis(100);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                tracing::warn!(
                    operation,
                    attempt,
                    error = %e,
                    "Store write failed — retrying"
                );
                sleep(delay).await;
                delay *= 2;
            }
            Err(e) => {
                tracing::error!(
                    operation,
                    attempts,
                    error = %e,
                    "Store write failed after all retries"
                );
                return Err(e);
            }
        }
    }
}
