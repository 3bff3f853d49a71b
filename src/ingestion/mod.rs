use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::models::AgentSignal;

/// How long signals stay buffered before being pruned. Comfortably larger
/// than any sensible consensus lookback window.
fn signal_retention() -> Duration {
    Duration::hours(1)
}

/// In-memory buffer behind the Signal Intake interface.
///
/// External analysts push timestamped signals in (via the API); the tick
/// runner reads the window the consensus engine needs. Signals are
/// normalized once on the way in.
#[derive(Clone, Default)]
pub struct MemorySignalStore {
    inner: Arc<RwLock<HashMap<String, Vec<AgentSignal>>>>,
}

impl MemorySignalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, signal: AgentSignal) {
        let signal = signal.normalized();
        let cutoff = Utc::now() - signal_retention();

        let mut inner = self.inner.write().await;
        let bucket = inner.entry(signal.symbol.clone()).or_default();
        bucket.retain(|s| s.timestamp >= cutoff);
        bucket.push(signal);
    }

    /// All signals for a symbol within `lookback` of `now`.
    pub async fn recent_signals(
        &self,
        symbol: &str,
        lookback: Duration,
        now: DateTime<Utc>,
    ) -> Vec<AgentSignal> {
        let cutoff = now - lookback;
        let inner = self.inner.read().await;
        inner
            .get(symbol)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter(|s| s.timestamp >= cutoff && s.timestamp <= now)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// In-memory reference price feed.
///
/// Stands in for the external market-data collaborator: pushes come from the
/// price API endpoint, lookups answer "latest price at or before t".
#[derive(Clone, Default)]
pub struct MemoryPriceFeed {
    inner: Arc<RwLock<HashMap<String, Vec<(DateTime<Utc>, Decimal)>>>>,
}

impl MemoryPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, symbol: &str, price: Decimal, timestamp: DateTime<Utc>) {
        let mut inner = self.inner.write().await;
        let bucket = inner.entry(symbol.to_string()).or_default();
        bucket.push((timestamp, price));
        bucket.sort_by_key(|(ts, _)| *ts);
    }

    /// Latest price at or before `at`, or None when nothing qualifies.
    pub async fn price(&self, symbol: &str, at: DateTime<Utc>) -> Option<Decimal> {
        let inner = self.inner.read().await;
        inner.get(symbol).and_then(|bucket| {
            bucket
                .iter()
                .rev()
                .find(|(ts, _)| *ts <= at)
                .map(|(_, price)| *price)
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
