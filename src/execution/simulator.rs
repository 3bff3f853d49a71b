use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::ledger::{ApplyOutcome, FillEvent, LedgerError, Portfolio};
use crate::models::{Decision, Order, OrderStatus, OrderType, PositionSide, Side};

use super::sizing::{self, SizingConfig};
use super::slippage;

/// Execution simulator parameters.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Minimum fused confidence required before a decision may trade.
    pub confidence_threshold: Decimal,
    pub base_slippage_pct: Decimal,
    pub commission_pct: Decimal,
    pub commission_min: Decimal,
    pub sizing: SizingConfig,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: Decimal::new(6, 1), // 0.6
            base_slippage_pct: Decimal::new(5, 4),    // 0.0005
            commission_pct: Decimal::new(1, 3),       // 0.001
            commission_min: Decimal::ONE,
            sizing: SizingConfig::default(),
        }
    }
}

/// Why a decision produced no order. None of these are errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    HoldDirection,
    LowConfidence,
    PriceUnavailable,
    DuplicateDecision,
    ZeroQuantity,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::HoldDirection => write!(f, "hold direction"),
            SkipReason::LowConfidence => write!(f, "confidence below threshold"),
            SkipReason::PriceUnavailable => write!(f, "reference price unavailable"),
            SkipReason::DuplicateDecision => write!(f, "decision already executed"),
            SkipReason::ZeroQuantity => write!(f, "sized quantity is zero"),
        }
    }
}

/// Outcome of feeding one decision through the simulator.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    /// Order filled and applied to the ledger.
    Filled {
        order: Order,
        ledger: ApplyOutcome,
    },
    /// Order created but rejected; the ledger was not touched.
    Rejected { order: Order },
    /// No order was created.
    Skipped { reason: SkipReason },
}

/// Turns qualifying decisions into simulated fills against the ledger.
///
/// Consumes each decision identity at most once: a retry of an
/// already-executed decision is a no-op, not a second order. A decision
/// skipped for a missing reference price is not consumed, so the next tick's
/// evaluation can try again.
pub struct ExecutionSimulator {
    config: ExecutionConfig,
    executed: Mutex<HashSet<Uuid>>,
}

impl ExecutionSimulator {
    pub fn new(config: ExecutionConfig) -> Self {
        Self {
            config,
            executed: Mutex::new(HashSet::new()),
        }
    }

    /// Execute with a freshly drawn slippage jitter.
    pub async fn execute(
        &self,
        decision: &Decision,
        portfolio: &Portfolio,
        now: DateTime<Utc>,
    ) -> ExecutionOutcome {
        let jitter = slippage::draw_jitter(&mut rand::thread_rng());
        self.execute_with_jitter(decision, portfolio, now, jitter)
            .await
    }

    /// Execute with an explicit jitter. Deterministic; the entry point the
    /// tests use.
    pub async fn execute_with_jitter(
        &self,
        decision: &Decision,
        portfolio: &Portfolio,
        now: DateTime<Utc>,
        jitter: Decimal,
    ) -> ExecutionOutcome {
        // Admission gate: non-HOLD direction AND confidence over the bar.
        let Some(side) = decision.direction.to_side() else {
            tracing::debug!(symbol = %decision.symbol, "HOLD decision — no order");
            return ExecutionOutcome::Skipped {
                reason: SkipReason::HoldDirection,
            };
        };

        if decision.confidence < self.config.confidence_threshold {
            tracing::debug!(
                symbol = %decision.symbol,
                confidence = %decision.confidence,
                threshold = %self.config.confidence_threshold,
                "Decision below confidence threshold — skipping"
            );
            return ExecutionOutcome::Skipped {
                reason: SkipReason::LowConfidence,
            };
        }

        // No reference price: skip without consuming the decision so the
        // next cycle can retry.
        let Some(reference_price) = decision.reference_price else {
            tracing::warn!(
                symbol = %decision.symbol,
                "No reference price for decision — skipping until next cycle"
            );
            return ExecutionOutcome::Skipped {
                reason: SkipReason::PriceUnavailable,
            };
        };

        // Idempotency: consume the decision identity exactly once.
        {
            let mut executed = self.executed.lock().await;
            if !executed.insert(decision.id) {
                tracing::debug!(
                    decision_id = %decision.id,
                    symbol = %decision.symbol,
                    "Duplicate execution attempt — ignoring"
                );
                return ExecutionOutcome::Skipped {
                    reason: SkipReason::DuplicateDecision,
                };
            }
        }

        // An order against an existing opposite position closes it in full;
        // otherwise size a fresh entry off current portfolio value.
        let (quantity, target_side) = match side {
            Side::Buy => match portfolio
                .position(&decision.symbol, PositionSide::Short)
                .await
            {
                Some(short) => (short.quantity, PositionSide::Short),
                None => (self.sized_quantity(decision, portfolio, reference_price).await, PositionSide::Long),
            },
            Side::Sell => match portfolio
                .position(&decision.symbol, PositionSide::Long)
                .await
            {
                Some(long) => (long.quantity, PositionSide::Long),
                None => (self.sized_quantity(decision, portfolio, reference_price).await, PositionSide::Short),
            },
        };

        if quantity <= Decimal::ZERO {
            tracing::debug!(symbol = %decision.symbol, "Sized quantity is zero — skipping");
            return ExecutionOutcome::Skipped {
                reason: SkipReason::ZeroQuantity,
            };
        }

        let costs = slippage::fill_costs(
            side,
            OrderType::Market,
            quantity,
            reference_price,
            self.config.base_slippage_pct,
            self.config.commission_pct,
            self.config.commission_min,
            jitter,
        );

        let mut order = Order::market(
            &decision.symbol,
            &decision.asset_class,
            side,
            quantity,
            decision.id,
            now,
        );

        let fill = FillEvent {
            symbol: decision.symbol.clone(),
            asset_class: decision.asset_class.clone(),
            order_side: side,
            quantity,
            price: reference_price,
            notional: costs.notional,
            commission: costs.commission,
            slippage_cost: costs.slippage_cost,
            target_side: Some(target_side),
            decision_confidence: decision.confidence,
            timestamp: now,
        };

        match portfolio.apply_fill(&fill).await {
            Ok(ledger) => {
                order.status = OrderStatus::Filled;
                order.filled_quantity = quantity;
                order.avg_fill_price = Some(costs.adjusted_fill_price);
                order.commission = costs.commission;
                order.slippage_cost = costs.slippage_cost;
                order.total_cost = Some(ledger.cash_delta().abs());
                order.filled_at = Some(now);

                counter!("orders_filled").increment(1);
                tracing::info!(
                    order_id = %order.id,
                    symbol = %order.symbol,
                    side = %order.side,
                    quantity = %order.quantity,
                    fill_price = %costs.adjusted_fill_price,
                    commission = %costs.commission,
                    slippage = %costs.slippage_cost,
                    "Order filled"
                );

                ExecutionOutcome::Filled { order, ledger }
            }
            Err(e @ LedgerError::InsufficientCash { .. }) => {
                order.status = OrderStatus::Rejected;
                order.commission = costs.commission;
                order.slippage_cost = costs.slippage_cost;
                order.error_message = Some(e.to_string());

                counter!("orders_rejected").increment(1);
                tracing::warn!(
                    order_id = %order.id,
                    symbol = %order.symbol,
                    error = %e,
                    "Order rejected — insufficient capital"
                );

                ExecutionOutcome::Rejected { order }
            }
            Err(e @ LedgerError::OverReduce { .. }) => {
                order.status = OrderStatus::Rejected;
                order.error_message = Some(e.to_string());

                counter!("orders_rejected").increment(1);
                // Should never happen under correct sizing: treat as a bug signal.
                tracing::error!(
                    order_id = %order.id,
                    symbol = %order.symbol,
                    error = %e,
                    "Order rejected — ledger invariant violation"
                );

                ExecutionOutcome::Rejected { order }
            }
        }
    }

    async fn sized_quantity(
        &self,
        decision: &Decision,
        portfolio: &Portfolio,
        reference_price: Decimal,
    ) -> Decimal {
        let portfolio_value = portfolio.total_value().await;
        sizing::position_quantity(
            portfolio_value,
            reference_price,
            decision.confidence,
            decision.risk_score,
            &self.config.sizing,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
