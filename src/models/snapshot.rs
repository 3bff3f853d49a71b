use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Point-in-time valuation of the whole book. Append-only time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub timestamp: DateTime<Utc>,
    pub cash: Decimal,
    /// Sum of per-position market values (margin + unrealized for shorts).
    pub positions_value: Decimal,
    /// `cash + positions_value`.
    pub total_value: Decimal,
    /// Total value minus initial capital.
    pub total_pnl: Decimal,
    /// Change vs. the earliest snapshot in the trailing 24 hours.
    pub daily_pnl: Decimal,
    pub open_positions: i64,
    pub long_positions: i64,
    pub short_positions: i64,
    /// Highest total value observed so far.
    pub peak_value: Decimal,
    /// `(peak_value - total_value) / peak_value`, in 0..=1.
    pub drawdown_pct: Decimal,
}
