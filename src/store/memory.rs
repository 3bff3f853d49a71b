use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::models::{Decision, Order, PortfolioSnapshot, Trade};

use super::StoreError;

#[derive(Default)]
struct MemoryInner {
    decisions: Vec<Decision>,
    orders: Vec<Order>,
    trades: Vec<Trade>,
    snapshots: Vec<PortfolioSnapshot>,
}

/// In-memory record store. Backs tests and DB-less runs; the same query
/// surface as the Postgres store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_decision(&self, decision: &Decision) -> Result<(), StoreError> {
        self.inner.write().await.decisions.push(decision.clone());
        Ok(())
    }

    pub async fn record_order(&self, order: &Order) -> Result<(), StoreError> {
        self.inner.write().await.orders.push(order.clone());
        Ok(())
    }

    pub async fn record_trade(&self, trade: &Trade) -> Result<(), StoreError> {
        self.inner.write().await.trades.push(trade.clone());
        Ok(())
    }

    pub async fn record_snapshot(&self, snapshot: &PortfolioSnapshot) -> Result<(), StoreError> {
        self.inner.write().await.snapshots.push(snapshot.clone());
        Ok(())
    }

    pub async fn decisions(
        &self,
        symbol: Option<&str>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<Decision>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .decisions
            .iter()
            .rev()
            .filter(|d| symbol.map_or(true, |s| d.symbol == s))
            .filter(|d| from.map_or(true, |f| d.timestamp >= f))
            .filter(|d| to.map_or(true, |u| d.timestamp <= u))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    pub async fn orders(
        &self,
        symbol: Option<&str>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<Order>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .orders
            .iter()
            .rev()
            .filter(|o| symbol.map_or(true, |s| o.symbol == s))
            .filter(|o| from.map_or(true, |f| o.created_at >= f))
            .filter(|o| to.map_or(true, |u| o.created_at <= u))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    pub async fn trades(
        &self,
        symbol: Option<&str>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<Trade>, StoreError> {
        let inner = self.inner.read().await;
        let mut trades: Vec<Trade> = inner
            .trades
            .iter()
            .filter(|t| symbol.map_or(true, |s| t.symbol == s))
            .filter(|t| from.map_or(true, |f| t.exit_time >= f))
            .filter(|t| to.map_or(true, |u| t.exit_time <= u))
            .cloned()
            .collect();
        trades.sort_by(|a, b| a.exit_time.cmp(&b.exit_time));
        trades.truncate(limit.max(0) as usize);
        Ok(trades)
    }

    pub async fn snapshots(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<PortfolioSnapshot>, StoreError> {
        let inner = self.inner.read().await;
        let mut snapshots: Vec<PortfolioSnapshot> = inner
            .snapshots
            .iter()
            .filter(|s| from.map_or(true, |f| s.timestamp >= f))
            .filter(|s| to.map_or(true, |u| s.timestamp <= u))
            .cloned()
            .collect();
        snapshots.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        snapshots.truncate(limit.max(0) as usize);
        Ok(snapshots)
    }

    pub async fn earliest_snapshot_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<PortfolioSnapshot>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .snapshots
            .iter()
            .filter(|s| s.timestamp >= cutoff)
            .min_by_key(|s| s.timestamp)
            .cloned())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
