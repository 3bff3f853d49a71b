use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PositionSide;

/// Immutable record of a fully closed position.
///
/// Created exactly once, when the position's quantity reaches zero, and
/// linked to the confidence of the decision that opened it so analytics can
/// attribute performance back to decision quality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub symbol: String,
    pub asset_class: String,
    pub side: PositionSide,
    /// Total quantity closed over the position's lifetime.
    pub quantity: Decimal,
    pub entry_price: Decimal,
    /// Volume-weighted exit price across all closing fills.
    pub exit_price: Decimal,
    pub gross_pnl: Decimal,
    /// Entry + exit commissions and slippage.
    pub fees: Decimal,
    pub net_pnl: Decimal,
    /// Gross P&L as a percentage of entry notional.
    pub realized_pnl_pct: Decimal,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    /// Non-negative by construction; zero is valid but flagged in logs.
    pub hold_duration_secs: i64,
    pub entry_confidence: Decimal,
}
