use metrics::counter;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{Position, Trade};
use crate::store::{with_retry, Store, StoreError};

/// Finalizes closed positions into immutable realized-performance records.
///
/// Invoked exactly once per full position closure; the ledger has already
/// settled cash, so the recorder only derives and persists the record.
pub struct TradeRecorder {
    store: Store,
}

impl TradeRecorder {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Derive the trade record from a fully closed position.
    ///
    /// The position's closure accumulators cover every reduction over its
    /// lifetime, so partial closes are folded into one record with a
    /// volume-weighted exit price.
    pub fn finalize(position: &Position) -> Trade {
        let quantity = position.closed_quantity;
        let exit_price = if quantity.is_zero() {
            position.entry_price
        } else {
            position.closed_notional / quantity
        };

        let gross_pnl = position.closed_gross_pnl;
        let fees = position.entry_fees + position.exit_fees;
        let net_pnl = gross_pnl - fees;

        let entry_notional = position.entry_price * quantity;
        let realized_pnl_pct = if entry_notional.is_zero() {
            Decimal::ZERO
        } else {
            gross_pnl / entry_notional * Decimal::ONE_HUNDRED
        };

        let entry_time = position.opened_at;
        let exit_time = position.last_updated;
        // Clock skew can never make a trade look like it closed before it
        // opened; clamp instead of rejecting.
        let hold_duration_secs = (exit_time - entry_time).num_seconds().max(0);

        Trade {
            id: Uuid::new_v4(),
            symbol: position.symbol.clone(),
            asset_class: position.asset_class.clone(),
            side: position.side,
            quantity,
            entry_price: position.entry_price,
            exit_price,
            gross_pnl,
            fees,
            net_pnl,
            realized_pnl_pct,
            entry_time,
            exit_time,
            hold_duration_secs,
            entry_confidence: position.entry_confidence,
        }
    }

    /// Build and persist the trade record for a closed position.
    pub async fn record_closure(&self, position: &Position) -> Result<Trade, StoreError> {
        let trade = Self::finalize(position);

        if trade.hold_duration_secs == 0 {
            tracing::warn!(
                symbol = %trade.symbol,
                side = %trade.side,
                "Trade closed with near-zero hold duration"
            );
        }

        with_retry("record_trade", 3, || self.store.record_trade(&trade)).await?;
        counter!("trades_recorded").increment(1);

        tracing::info!(
            symbol = %trade.symbol,
            side = %trade.side,
            quantity = %trade.quantity,
            net_pnl = %trade.net_pnl,
            hold_secs = trade.hold_duration_secs,
            "Trade recorded"
        );

        Ok(trade)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
