use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use metrics::{counter, gauge};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::ingestion::MemoryPriceFeed;
use crate::ledger::Portfolio;
use crate::models::PortfolioSnapshot;
use crate::store::{with_retry, Store, StoreError};

/// Values the whole book on each valuation tick.
///
/// Refreshes every open position from the latest reference price, recomputes
/// unrealized P&L, tracks the running peak for drawdown, and appends an
/// immutable snapshot. Read-only towards the ledger apart from the price
/// refresh.
pub struct SnapshotService {
    portfolio: Portfolio,
    prices: MemoryPriceFeed,
    store: Store,
    peak_value: Arc<Mutex<Decimal>>,
}

impl SnapshotService {
    pub fn new(
        portfolio: Portfolio,
        prices: MemoryPriceFeed,
        store: Store,
        initial_capital: Decimal,
    ) -> Self {
        Self {
            portfolio,
            prices,
            store,
            peak_value: Arc::new(Mutex::new(initial_capital)),
        }
    }

    pub async fn take_snapshot(
        &self,
        now: DateTime<Utc>,
    ) -> Result<PortfolioSnapshot, StoreError> {
        // Pull the freshest reference price for every open position.
        let mut price_map = HashMap::new();
        for position in self.portfolio.open_positions().await {
            if price_map.contains_key(&position.symbol) {
                continue;
            }
            match self.prices.price(&position.symbol, now).await {
                Some(price) => {
                    price_map.insert(position.symbol.clone(), price);
                }
                None => {
                    tracing::warn!(
                        symbol = %position.symbol,
                        "No reference price for open position — keeping last mark"
                    );
                }
            }
        }
        self.portfolio.refresh_prices(&price_map, now).await;

        let valuation = self.portfolio.valuation().await;
        let initial_capital = self.portfolio.initial_capital().await;
        let total_pnl = valuation.total_value - initial_capital;

        // Daily P&L against the earliest snapshot in the trailing 24h.
        let baseline = self
            .store
            .earliest_snapshot_since(now - Duration::hours(24))
            .await?;
        let daily_pnl = baseline
            .map(|b| valuation.total_value - b.total_value)
            .unwrap_or(Decimal::ZERO);

        let (peak_value, drawdown_pct) = {
            let mut peak = self.peak_value.lock().await;
            if valuation.total_value > *peak {
                *peak = valuation.total_value;
            }
            let drawdown = if peak.is_zero() {
                Decimal::ZERO
            } else {
                (*peak - valuation.total_value) / *peak
            };
            (*peak, drawdown)
        };

        let snapshot = PortfolioSnapshot {
            timestamp: now,
            cash: valuation.cash,
            positions_value: valuation.positions_value,
            total_value: valuation.total_value,
            total_pnl,
            daily_pnl,
            open_positions: valuation.open_positions,
            long_positions: valuation.long_positions,
            short_positions: valuation.short_positions,
            peak_value,
            drawdown_pct,
        };

        with_retry("record_snapshot", 3, || {
            self.store.record_snapshot(&snapshot)
        })
        .await?;

        counter!("snapshots_recorded").increment(1);
        gauge!("portfolio_total_value").set(snapshot.total_value.to_f64().unwrap_or(0.0));
        gauge!("cash_balance").set(snapshot.cash.to_f64().unwrap_or(0.0));
        gauge!("open_positions").set(snapshot.open_positions as f64);

        tracing::info!(
            total_value = %snapshot.total_value,
            cash = %snapshot.cash,
            positions = snapshot.open_positions,
            drawdown_pct = %snapshot.drawdown_pct,
            "Portfolio snapshot saved"
        );

        Ok(snapshot)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::FillEvent;
    use crate::models::Side;

    async fn open_long(portfolio: &Portfolio, quantity: Decimal, price: Decimal) {
        portfolio
            .apply_fill(&FillEvent {
                symbol: "BTC/USDT".into(),
                asset_class: "crypto".into(),
                order_side: Side::Buy,
                quantity,
                price,
                notional: quantity * price,
                commission: Decimal::ZERO,
                slippage_cost: Decimal::ZERO,
                target_side: None,
                decision_confidence: Decimal::new(8, 1),
                timestamp: Utc::now(),
            })
            .await
            .expect("open fill");
    }

    #[tokio::test]
    async fn test_snapshot_total_is_cash_plus_positions() {
        let portfolio = Portfolio::new(Decimal::from(1_000));
        let prices = MemoryPriceFeed::new();
        let store = Store::memory();
        let service = SnapshotService::new(
            portfolio.clone(),
            prices.clone(),
            store.clone(),
            Decimal::from(1_000),
        );

        open_long(&portfolio, Decimal::from(2), Decimal::from(100)).await;
        let now = Utc::now();
        prices.push("BTC/USDT", Decimal::from(110), now).await;

        let snapshot = service.take_snapshot(now).await.expect("snapshot");

        assert_eq!(snapshot.cash, Decimal::from(800));
        assert_eq!(snapshot.positions_value, Decimal::from(220));
        assert_eq!(snapshot.total_value, Decimal::from(1_020));
        assert_eq!(snapshot.total_pnl, Decimal::from(20));
        assert_eq!(snapshot.open_positions, 1);
        assert_eq!(snapshot.long_positions, 1);
        assert_eq!(
            snapshot.cash + snapshot.positions_value,
            snapshot.total_value
        );
    }

    #[tokio::test]
    async fn test_drawdown_tracks_running_peak() {
        let portfolio = Portfolio::new(Decimal::from(1_000));
        let prices = MemoryPriceFeed::new();
        let store = Store::memory();
        let service = SnapshotService::new(
            portfolio.clone(),
            prices.clone(),
            store.clone(),
            Decimal::from(1_000),
        );

        open_long(&portfolio, Decimal::from(2), Decimal::from(100)).await;

        // Rally to 150: peak moves up, no drawdown.
        let t1 = Utc::now();
        prices.push("BTC/USDT", Decimal::from(150), t1).await;
        let first = service.take_snapshot(t1).await.expect("snapshot");
        assert_eq!(first.peak_value, Decimal::from(1_100));
        assert_eq!(first.drawdown_pct, Decimal::ZERO);

        // Fall back to 100: peak holds, drawdown shows.
        let t2 = t1 + Duration::seconds(60);
        prices.push("BTC/USDT", Decimal::from(100), t2).await;
        let second = service.take_snapshot(t2).await.expect("snapshot");
        assert_eq!(second.peak_value, Decimal::from(1_100));
        // (1100 - 1000) / 1100
        assert_eq!(
            second.drawdown_pct,
            Decimal::from(100) / Decimal::from(1_100)
        );
    }

    #[tokio::test]
    async fn test_daily_pnl_uses_earliest_snapshot_in_window() {
        let portfolio = Portfolio::new(Decimal::from(1_000));
        let prices = MemoryPriceFeed::new();
        let store = Store::memory();
        let service = SnapshotService::new(
            portfolio.clone(),
            prices.clone(),
            store.clone(),
            Decimal::from(1_000),
        );

        let t1 = Utc::now();
        let first = service.take_snapshot(t1).await.expect("snapshot");
        // Nothing to compare against yet.
        assert_eq!(first.daily_pnl, Decimal::ZERO);

        open_long(&portfolio, Decimal::from(2), Decimal::from(100)).await;
        let t2 = t1 + Duration::seconds(60);
        prices.push("BTC/USDT", Decimal::from(125), t2).await;
        let second = service.take_snapshot(t2).await.expect("snapshot");

        // Total moved from 1000 to 1050.
        assert_eq!(second.daily_pnl, Decimal::from(50));
    }
}
