use rand::Rng;
use rust_decimal::Decimal;

use crate::models::{OrderType, Side};

/// Market orders cross the spread; limit orders wait for it.
pub fn type_multiplier(order_type: OrderType) -> Decimal {
    match order_type {
        OrderType::Market => Decimal::from(2),
        OrderType::Limit => Decimal::new(5, 1), // 0.5
    }
}

/// Larger notionals eat deeper into the book. Monotonic step function.
pub fn size_multiplier(notional: Decimal) -> Decimal {
    if notional > Decimal::from(10_000) {
        Decimal::new(15, 1) // 1.5
    } else if notional > Decimal::from(5_000) {
        Decimal::new(12, 1) // 1.2
    } else {
        Decimal::ONE
    }
}

/// Per-fill jitter uniformly drawn from [0.5, 1.5], in 0.001 steps.
pub fn draw_jitter<R: Rng>(rng: &mut R) -> Decimal {
    let offset: i64 = rng.gen_range(0..=1000);
    Decimal::new(500 + offset, 3)
}

/// Effective slippage percentage for a fill.
pub fn slippage_pct(
    base_slippage_pct: Decimal,
    order_type: OrderType,
    notional: Decimal,
    jitter: Decimal,
) -> Decimal {
    base_slippage_pct * type_multiplier(order_type) * size_multiplier(notional) * jitter
}

/// `max(commission_pct * notional, commission_min)`.
pub fn commission(notional: Decimal, commission_pct: Decimal, commission_min: Decimal) -> Decimal {
    (notional * commission_pct).max(commission_min)
}

/// Full cost breakdown of a simulated fill.
#[derive(Debug, Clone)]
pub struct FillCosts {
    pub notional: Decimal,
    pub slippage_pct: Decimal,
    pub slippage_cost: Decimal,
    pub commission: Decimal,
    /// Reference price shifted against the trader by the slippage: higher
    /// for buys, lower for sells.
    pub adjusted_fill_price: Decimal,
}

impl FillCosts {
    pub fn fees(&self) -> Decimal {
        self.commission + self.slippage_cost
    }
}

/// Price a fill at `reference_price` with the given jitter.
#[allow(clippy::too_many_arguments)]
pub fn fill_costs(
    side: Side,
    order_type: OrderType,
    quantity: Decimal,
    reference_price: Decimal,
    base_slippage_pct: Decimal,
    commission_pct: Decimal,
    commission_min: Decimal,
    jitter: Decimal,
) -> FillCosts {
    let notional = quantity * reference_price;
    let pct = slippage_pct(base_slippage_pct, order_type, notional, jitter);
    let slippage_cost = notional * pct;
    let commission = commission(notional, commission_pct, commission_min);

    let per_unit_slippage = if quantity.is_zero() {
        Decimal::ZERO
    } else {
        slippage_cost / quantity
    };
    let adjusted_fill_price = match side {
        Side::Buy => reference_price + per_unit_slippage,
        Side::Sell => reference_price - per_unit_slippage,
    };

    FillCosts {
        notional,
        slippage_pct: pct,
        slippage_cost,
        commission,
        adjusted_fill_price,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
