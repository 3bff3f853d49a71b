use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{Position, PositionSide, Side};

/// A simulated fill ready to be applied to the ledger.
///
/// `price` is the reference execution price; slippage is carried as an
/// explicit cost (`slippage_cost`) rather than baked into the price, so
/// realized P&L math never double-counts it.
#[derive(Debug, Clone)]
pub struct FillEvent {
    pub symbol: String,
    pub asset_class: String,
    pub order_side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    /// `quantity * price`.
    pub notional: Decimal,
    pub commission: Decimal,
    pub slippage_cost: Decimal,
    /// Explicit ledger key to apply against. When None the side is implied:
    /// a BUY reduces an existing SHORT before opening a LONG, a SELL reduces
    /// an existing LONG before opening a SHORT.
    pub target_side: Option<PositionSide>,
    pub decision_confidence: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl FillEvent {
    pub fn fees(&self) -> Decimal {
        self.commission + self.slippage_cost
    }
}

/// Result of applying a fill. `cash_delta` is negative for debits.
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    Opened { position: Position, cash_delta: Decimal },
    Added { position: Position, cash_delta: Decimal },
    Reduced { position: Position, cash_delta: Decimal },
    /// Quantity reached zero: the position was deleted from the ledger and
    /// is returned here with its closure accumulators filled, ready for the
    /// trade recorder.
    Closed { position: Position, cash_delta: Decimal },
}

impl ApplyOutcome {
    pub fn cash_delta(&self) -> Decimal {
        match self {
            ApplyOutcome::Opened { cash_delta, .. }
            | ApplyOutcome::Added { cash_delta, .. }
            | ApplyOutcome::Reduced { cash_delta, .. }
            | ApplyOutcome::Closed { cash_delta, .. } => *cash_delta,
        }
    }

    pub fn position(&self) -> &Position {
        match self {
            ApplyOutcome::Opened { position, .. }
            | ApplyOutcome::Added { position, .. }
            | ApplyOutcome::Reduced { position, .. }
            | ApplyOutcome::Closed { position, .. } => position,
        }
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("insufficient cash: required {required}, available {available}")]
    InsufficientCash {
        required: Decimal,
        available: Decimal,
    },

    #[error("cannot reduce {side} {symbol} by {requested}: only {held} held")]
    OverReduce {
        symbol: String,
        side: PositionSide,
        requested: Decimal,
        held: Decimal,
    },
}

/// One-lock summary of the book, taken for snapshots and sizing.
#[derive(Debug, Clone)]
pub struct Valuation {
    pub cash: Decimal,
    pub positions_value: Decimal,
    pub total_value: Decimal,
    pub open_positions: i64,
    pub long_positions: i64,
    pub short_positions: i64,
}

type PositionKey = (String, PositionSide);

struct PortfolioInner {
    cash: Decimal,
    initial_capital: Decimal,
    positions: HashMap<PositionKey, Position>,
}

/// The portfolio aggregate: cash plus open positions, the only cross-symbol
/// shared mutable state in the engine.
///
/// Every mutation goes through one mutex so that two symbols' fills can never
/// interleave a read-modify-write on the shared cash figure.
#[derive(Clone)]
pub struct Portfolio {
    inner: Arc<Mutex<PortfolioInner>>,
}

impl Portfolio {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PortfolioInner {
                cash: initial_capital,
                initial_capital,
                positions: HashMap::new(),
            })),
        }
    }

    pub async fn cash(&self) -> Decimal {
        self.inner.lock().await.cash
    }

    pub async fn initial_capital(&self) -> Decimal {
        self.inner.lock().await.initial_capital
    }

    pub async fn position(&self, symbol: &str, side: PositionSide) -> Option<Position> {
        let inner = self.inner.lock().await;
        inner.positions.get(&(symbol.to_string(), side)).cloned()
    }

    pub async fn open_positions(&self) -> Vec<Position> {
        let inner = self.inner.lock().await;
        let mut positions: Vec<Position> = inner.positions.values().cloned().collect();
        positions.sort_by(|a, b| a.opened_at.cmp(&b.opened_at));
        positions
    }

    pub async fn total_value(&self) -> Decimal {
        self.valuation().await.total_value
    }

    pub async fn valuation(&self) -> Valuation {
        let inner = self.inner.lock().await;
        let positions_value: Decimal = inner.positions.values().map(|p| p.market_value()).sum();
        let long_positions = inner
            .positions
            .values()
            .filter(|p| p.side == PositionSide::Long)
            .count() as i64;
        let short_positions = inner.positions.len() as i64 - long_positions;

        Valuation {
            cash: inner.cash,
            positions_value,
            total_value: inner.cash + positions_value,
            open_positions: inner.positions.len() as i64,
            long_positions,
            short_positions,
        }
    }

    /// Refresh mark prices and unrealized P&L on every open position that
    /// has an entry in `prices`. Returns the number of positions refreshed.
    pub async fn refresh_prices(
        &self,
        prices: &HashMap<String, Decimal>,
        now: DateTime<Utc>,
    ) -> usize {
        let mut inner = self.inner.lock().await;
        let mut refreshed = 0;
        for position in inner.positions.values_mut() {
            if let Some(price) = prices.get(&position.symbol) {
                position.refresh(*price, now);
                refreshed += 1;
            }
        }
        refreshed
    }

    /// Apply a simulated fill to the position keyed by `(symbol, side)`.
    ///
    /// Checks run before any mutation, so a rejected fill leaves the ledger
    /// untouched. Over-reduction fails hard rather than clamping.
    pub async fn apply_fill(&self, fill: &FillEvent) -> Result<ApplyOutcome, LedgerError> {
        let mut inner = self.inner.lock().await;

        let (target_side, reduces) = resolve_target(&inner.positions, fill);

        if reduces {
            reduce_position(&mut inner, fill, target_side)
        } else {
            open_or_add_position(&mut inner, fill, target_side)
        }
    }
}

/// Which `(symbol, side)` key the fill applies to and whether it reduces it.
fn resolve_target(
    positions: &HashMap<PositionKey, Position>,
    fill: &FillEvent,
) -> (PositionSide, bool) {
    if let Some(side) = fill.target_side {
        let reduces = match (fill.order_side, side) {
            (Side::Sell, PositionSide::Long) | (Side::Buy, PositionSide::Short) => true,
            (Side::Buy, PositionSide::Long) | (Side::Sell, PositionSide::Short) => false,
        };
        return (side, reduces);
    }

    match fill.order_side {
        Side::Buy => {
            if positions.contains_key(&(fill.symbol.clone(), PositionSide::Short)) {
                (PositionSide::Short, true)
            } else {
                (PositionSide::Long, false)
            }
        }
        Side::Sell => {
            if positions.contains_key(&(fill.symbol.clone(), PositionSide::Long)) {
                (PositionSide::Long, true)
            } else {
                (PositionSide::Short, false)
            }
        }
    }
}

fn open_or_add_position(
    inner: &mut PortfolioInner,
    fill: &FillEvent,
    side: PositionSide,
) -> Result<ApplyOutcome, LedgerError> {
    // Opening debits notional plus fees; shorts lock the notional as margin.
    let required = fill.notional + fill.fees();
    if required > inner.cash {
        return Err(LedgerError::InsufficientCash {
            required,
            available: inner.cash,
        });
    }

    inner.cash -= required;
    let cash_delta = -required;
    let key = (fill.symbol.clone(), side);

    match inner.positions.get_mut(&key) {
        Some(position) => {
            // Volume-weighted average entry.
            let new_quantity = position.quantity + fill.quantity;
            position.entry_price = (position.entry_price * position.quantity
                + fill.price * fill.quantity)
                / new_quantity;
            position.quantity = new_quantity;
            position.entry_fees += fill.fees();
            position.refresh(fill.price, fill.timestamp);

            tracing::info!(
                symbol = %fill.symbol,
                side = %side,
                quantity = %position.quantity,
                entry_price = %position.entry_price,
                "Added to position"
            );

            Ok(ApplyOutcome::Added {
                position: position.clone(),
                cash_delta,
            })
        }
        None => {
            let mut position = Position {
                id: Uuid::new_v4(),
                symbol: fill.symbol.clone(),
                asset_class: fill.asset_class.clone(),
                side,
                quantity: fill.quantity,
                entry_price: fill.price,
                current_price: fill.price,
                unrealized_pnl: Decimal::ZERO,
                position_value: Decimal::ZERO,
                entry_fees: fill.fees(),
                closed_quantity: Decimal::ZERO,
                closed_gross_pnl: Decimal::ZERO,
                closed_notional: Decimal::ZERO,
                exit_fees: Decimal::ZERO,
                entry_confidence: fill.decision_confidence,
                opened_at: fill.timestamp,
                last_updated: fill.timestamp,
            };
            position.refresh(fill.price, fill.timestamp);

            tracing::info!(
                symbol = %fill.symbol,
                side = %side,
                quantity = %position.quantity,
                entry_price = %position.entry_price,
                "Opened position"
            );

            let snapshot = position.clone();
            inner.positions.insert(key, position);
            Ok(ApplyOutcome::Opened {
                position: snapshot,
                cash_delta,
            })
        }
    }
}

fn reduce_position(
    inner: &mut PortfolioInner,
    fill: &FillEvent,
    side: PositionSide,
) -> Result<ApplyOutcome, LedgerError> {
    let key = (fill.symbol.clone(), side);

    let Some(position) = inner.positions.get_mut(&key) else {
        return Err(LedgerError::OverReduce {
            symbol: fill.symbol.clone(),
            side,
            requested: fill.quantity,
            held: Decimal::ZERO,
        });
    };

    if fill.quantity > position.quantity {
        return Err(LedgerError::OverReduce {
            symbol: fill.symbol.clone(),
            side,
            requested: fill.quantity,
            held: position.quantity,
        });
    }

    let gross = Position::compute_unrealized(side, position.entry_price, fill.price, fill.quantity);

    // LONG closes credit sale proceeds; SHORT closes release the locked
    // margin plus the realized gain (or minus the loss).
    let credit = match side {
        PositionSide::Long => fill.notional - fill.fees(),
        PositionSide::Short => {
            position.entry_price * fill.quantity + gross - fill.fees()
        }
    };

    inner.cash += credit;

    position.quantity -= fill.quantity;
    position.closed_quantity += fill.quantity;
    position.closed_gross_pnl += gross;
    position.closed_notional += fill.price * fill.quantity;
    position.exit_fees += fill.fees();
    position.refresh(fill.price, fill.timestamp);

    if position.quantity.is_zero() {
        tracing::info!(
            symbol = %fill.symbol,
            side = %side,
            exit_price = %fill.price,
            gross_pnl = %position.closed_gross_pnl,
            "Closed position"
        );
        let closed = inner.positions.remove(&key).map(|p| ApplyOutcome::Closed {
            position: p,
            cash_delta: credit,
        });
        // The key was just mutated under the same lock; it must exist.
        match closed {
            Some(outcome) => Ok(outcome),
            None => Err(LedgerError::OverReduce {
                symbol: fill.symbol.clone(),
                side,
                requested: fill.quantity,
                held: Decimal::ZERO,
            }),
        }
    } else {
        tracing::info!(
            symbol = %fill.symbol,
            side = %side,
            remaining = %position.quantity,
            "Reduced position"
        );
        Ok(ApplyOutcome::Reduced {
            position: position.clone(),
            cash_delta: credit,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_fill(side: Side, quantity: Decimal, price: Decimal) -> FillEvent {
        FillEvent {
            symbol: "BTC/USDT".into(),
            asset_class: "crypto".into(),
            order_side: side,
            quantity,
            price,
            notional: quantity * price,
            commission: Decimal::ZERO,
            slippage_cost: Decimal::ZERO,
            target_side: None,
            decision_confidence: Decimal::new(7, 1),
            timestamp: Utc::now(),
        }
    }

    fn fill_with_fees(
        side: Side,
        quantity: Decimal,
        price: Decimal,
        commission: Decimal,
        slippage: Decimal,
    ) -> FillEvent {
        FillEvent {
            commission,
            slippage_cost: slippage,
            ..make_fill(side, quantity, price)
        }
    }

    #[tokio::test]
    async fn test_open_then_add_averages_entry() {
        let portfolio = Portfolio::new(Decimal::from(10_000));

        portfolio
            .apply_fill(&make_fill(Side::Buy, Decimal::new(1, 2), Decimal::from(100)))
            .await
            .expect("open");
        let outcome = portfolio
            .apply_fill(&make_fill(Side::Buy, Decimal::new(1, 2), Decimal::from(110)))
            .await
            .expect("add");

        assert!(matches!(outcome, ApplyOutcome::Added { .. }));
        let position = portfolio
            .position("BTC/USDT", PositionSide::Long)
            .await
            .expect("position exists");
        assert_eq!(position.quantity, Decimal::new(2, 2));
        assert_eq!(position.entry_price, Decimal::from(105));
    }

    #[tokio::test]
    async fn test_insufficient_cash_rejected_without_mutation() {
        let portfolio = Portfolio::new(Decimal::from(50));

        let result = portfolio
            .apply_fill(&make_fill(Side::Buy, Decimal::from(5), Decimal::from(100)))
            .await;

        assert!(matches!(result, Err(LedgerError::InsufficientCash { .. })));
        assert_eq!(portfolio.cash().await, Decimal::from(50));
        assert!(portfolio.open_positions().await.is_empty());
    }

    #[tokio::test]
    async fn test_over_reduce_fails_hard() {
        let portfolio = Portfolio::new(Decimal::from(10_000));
        portfolio
            .apply_fill(&make_fill(Side::Buy, Decimal::ONE, Decimal::from(100)))
            .await
            .expect("open");
        let cash_before = portfolio.cash().await;

        let result = portfolio
            .apply_fill(&make_fill(Side::Sell, Decimal::from(2), Decimal::from(100)))
            .await;

        assert!(matches!(result, Err(LedgerError::OverReduce { .. })));
        assert_eq!(portfolio.cash().await, cash_before);
        let position = portfolio
            .position("BTC/USDT", PositionSide::Long)
            .await
            .expect("position untouched");
        assert_eq!(position.quantity, Decimal::ONE);
    }

    #[tokio::test]
    async fn test_full_close_removes_position() {
        let portfolio = Portfolio::new(Decimal::from(10_000));
        portfolio
            .apply_fill(&make_fill(Side::Buy, Decimal::new(2, 2), Decimal::from(105)))
            .await
            .expect("open");

        let outcome = portfolio
            .apply_fill(&make_fill(Side::Sell, Decimal::new(2, 2), Decimal::from(120)))
            .await
            .expect("close");

        let ApplyOutcome::Closed { position, .. } = outcome else {
            panic!("expected Closed outcome");
        };
        assert_eq!(position.closed_quantity, Decimal::new(2, 2));
        // (120 - 105) * 0.02 = 0.30
        assert_eq!(position.closed_gross_pnl, Decimal::new(30, 2));
        assert!(portfolio
            .position("BTC/USDT", PositionSide::Long)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_round_trip_at_same_price_costs_exactly_the_fees() {
        let portfolio = Portfolio::new(Decimal::from(1_000));
        let commission = Decimal::ONE;
        let slippage = Decimal::new(5, 1); // 0.5

        portfolio
            .apply_fill(&fill_with_fees(
                Side::Buy,
                Decimal::ONE,
                Decimal::from(100),
                commission,
                slippage,
            ))
            .await
            .expect("open");
        portfolio
            .apply_fill(&fill_with_fees(
                Side::Sell,
                Decimal::ONE,
                Decimal::from(100),
                commission,
                slippage,
            ))
            .await
            .expect("close");

        // 1000 - (1 + 0.5) * 2
        assert_eq!(portfolio.cash().await, Decimal::from(997));
    }

    #[tokio::test]
    async fn test_short_open_locks_margin_and_close_releases_with_profit() {
        let portfolio = Portfolio::new(Decimal::from(1_000));

        // SELL with no long opens a short; margin = notional.
        portfolio
            .apply_fill(&make_fill(Side::Sell, Decimal::ONE, Decimal::from(100)))
            .await
            .expect("open short");
        assert_eq!(portfolio.cash().await, Decimal::from(900));

        let position = portfolio
            .position("BTC/USDT", PositionSide::Short)
            .await
            .expect("short exists");
        assert_eq!(position.side, PositionSide::Short);

        // Buy back lower: margin 100 + gain 10 comes home.
        let outcome = portfolio
            .apply_fill(&make_fill(Side::Buy, Decimal::ONE, Decimal::from(90)))
            .await
            .expect("close short");
        assert!(matches!(outcome, ApplyOutcome::Closed { .. }));
        assert_eq!(portfolio.cash().await, Decimal::from(1_010));
    }

    #[tokio::test]
    async fn test_partial_reduce_accumulates_closure() {
        let portfolio = Portfolio::new(Decimal::from(10_000));
        portfolio
            .apply_fill(&make_fill(Side::Buy, Decimal::from(4), Decimal::from(100)))
            .await
            .expect("open");

        let outcome = portfolio
            .apply_fill(&make_fill(Side::Sell, Decimal::ONE, Decimal::from(110)))
            .await
            .expect("reduce");

        let ApplyOutcome::Reduced { position, .. } = outcome else {
            panic!("expected Reduced outcome");
        };
        assert_eq!(position.quantity, Decimal::from(3));
        assert_eq!(position.closed_quantity, Decimal::ONE);
        assert_eq!(position.closed_gross_pnl, Decimal::from(10));
    }

    #[tokio::test]
    async fn test_explicit_target_allows_long_and_short_side_by_side() {
        let portfolio = Portfolio::new(Decimal::from(10_000));

        let mut open_long = make_fill(Side::Buy, Decimal::ONE, Decimal::from(100));
        open_long.target_side = Some(PositionSide::Long);
        portfolio.apply_fill(&open_long).await.expect("open long");

        let mut open_short = make_fill(Side::Sell, Decimal::ONE, Decimal::from(100));
        open_short.target_side = Some(PositionSide::Short);
        portfolio.apply_fill(&open_short).await.expect("open short");

        assert!(portfolio
            .position("BTC/USDT", PositionSide::Long)
            .await
            .is_some());
        assert!(portfolio
            .position("BTC/USDT", PositionSide::Short)
            .await
            .is_some());
        assert_eq!(portfolio.valuation().await.open_positions, 2);
    }

    #[tokio::test]
    async fn test_valuation_total_is_cash_plus_positions() {
        let portfolio = Portfolio::new(Decimal::from(1_000));
        portfolio
            .apply_fill(&make_fill(Side::Buy, Decimal::from(2), Decimal::from(100)))
            .await
            .expect("open");

        let valuation = portfolio.valuation().await;
        assert_eq!(valuation.cash, Decimal::from(800));
        assert_eq!(valuation.positions_value, Decimal::from(200));
        assert_eq!(valuation.total_value, Decimal::from(1_000));

        // Price moves up: unrealized gain shows in the total.
        let mut prices = HashMap::new();
        prices.insert("BTC/USDT".to_string(), Decimal::from(110));
        portfolio.refresh_prices(&prices, Utc::now()).await;

        let valuation = portfolio.valuation().await;
        assert_eq!(valuation.total_value, Decimal::from(1_020));
    }
}
