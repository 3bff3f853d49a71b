use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PositionSide;

/// An open directional holding, keyed by `(symbol, side)`.
///
/// `quantity > 0` for as long as the record exists; the ledger deletes the
/// position the moment its quantity reaches zero and emits a `Trade`.
/// Partial reductions accumulate into the `closed_*` fields so the final
/// trade record covers the whole lifetime of the position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub symbol: String,
    pub asset_class: String,
    pub side: PositionSide,
    pub quantity: Decimal,
    /// Volume-weighted average entry price across all opening fills.
    pub entry_price: Decimal,
    pub current_price: Decimal,
    pub unrealized_pnl: Decimal,
    /// `quantity * current_price`.
    pub position_value: Decimal,
    /// Commission + slippage accumulated across opening fills.
    pub entry_fees: Decimal,
    /// Quantity realized so far through reductions.
    pub closed_quantity: Decimal,
    /// Gross P&L realized so far through reductions.
    pub closed_gross_pnl: Decimal,
    /// Sum of `fill_price * quantity` across reductions; volume-weighted
    /// exit price = closed_notional / closed_quantity.
    pub closed_notional: Decimal,
    /// Commission + slippage accumulated across closing fills.
    pub exit_fees: Decimal,
    /// Confidence of the decision that opened the position, for attribution.
    pub entry_confidence: Decimal,
    pub opened_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Position {
    /// Unrealized P&L for a holding at `current_price`.
    pub fn compute_unrealized(
        side: PositionSide,
        entry_price: Decimal,
        current_price: Decimal,
        quantity: Decimal,
    ) -> Decimal {
        match side {
            PositionSide::Long => (current_price - entry_price) * quantity,
            PositionSide::Short => (entry_price - current_price) * quantity,
        }
    }

    /// Refresh mark price, unrealized P&L and position value.
    pub fn refresh(&mut self, price: Decimal, now: DateTime<Utc>) {
        self.current_price = price;
        self.unrealized_pnl =
            Self::compute_unrealized(self.side, self.entry_price, price, self.quantity);
        self.position_value = self.quantity * price;
        self.last_updated = now;
    }

    /// Contribution of this position to total portfolio value.
    ///
    /// A LONG is worth its market value. A SHORT is worth the margin locked
    /// at entry plus the unrealized gain from the price moving down.
    pub fn market_value(&self) -> Decimal {
        match self.side {
            PositionSide::Long => self.position_value,
            PositionSide::Short => self.quantity * self.entry_price + self.unrealized_pnl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_position(side: PositionSide, quantity: Decimal, entry: Decimal) -> Position {
        let now = Utc::now();
        Position {
            id: Uuid::new_v4(),
            symbol: "BTC/USDT".into(),
            asset_class: "crypto".into(),
            side,
            quantity,
            entry_price: entry,
            current_price: entry,
            unrealized_pnl: Decimal::ZERO,
            position_value: quantity * entry,
            entry_fees: Decimal::ZERO,
            closed_quantity: Decimal::ZERO,
            closed_gross_pnl: Decimal::ZERO,
            closed_notional: Decimal::ZERO,
            exit_fees: Decimal::ZERO,
            entry_confidence: Decimal::new(7, 1),
            opened_at: now,
            last_updated: now,
        }
    }

    #[test]
    fn test_unrealized_long() {
        let mut pos = make_position(PositionSide::Long, Decimal::new(2, 2), Decimal::from(105));
        pos.refresh(Decimal::from(120), Utc::now());
        // (120 - 105) * 0.02 = 0.30
        assert_eq!(pos.unrealized_pnl, Decimal::new(30, 2));
        assert_eq!(pos.position_value, Decimal::new(240, 2));
    }

    #[test]
    fn test_unrealized_short_gains_when_price_drops() {
        let mut pos = make_position(PositionSide::Short, Decimal::ONE, Decimal::from(100));
        pos.refresh(Decimal::from(90), Utc::now());
        assert_eq!(pos.unrealized_pnl, Decimal::from(10));
        // margin 100 + gain 10
        assert_eq!(pos.market_value(), Decimal::from(110));
    }

    #[test]
    fn test_market_value_long_tracks_price() {
        let mut pos = make_position(PositionSide::Long, Decimal::from(2), Decimal::from(50));
        pos.refresh(Decimal::from(60), Utc::now());
        assert_eq!(pos.market_value(), Decimal::from(120));
    }
}
