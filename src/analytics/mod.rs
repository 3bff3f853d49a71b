use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use serde::{Deserialize, Serialize};

use crate::models::{PortfolioSnapshot, Trade};

/// Aggregated performance over the trade and snapshot history.
///
/// All of this is computed in the application over loaded records; the
/// storage layer stays free of business logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub total_trades: i64,
    pub win_count: i64,
    pub loss_count: i64,
    pub win_rate: Decimal,
    pub total_net_pnl: Decimal,
    pub avg_win: Decimal,
    pub avg_loss: Decimal,
    pub profit_factor: Decimal,
    pub sharpe_ratio: Decimal,
    pub max_drawdown_pct: Decimal,
    pub best_trade: Decimal,
    pub worst_trade: Decimal,
}

/// Fraction of trades with positive net P&L.
pub fn win_rate(trades: &[Trade]) -> Decimal {
    if trades.is_empty() {
        return Decimal::ZERO;
    }
    let wins = trades.iter().filter(|t| t.net_pnl > Decimal::ZERO).count();
    Decimal::from(wins as i64) / Decimal::from(trades.len() as i64)
}

/// Gross wins over gross losses. Zero when there are no losses to divide by.
pub fn profit_factor(trades: &[Trade]) -> Decimal {
    let gross_wins: Decimal = trades
        .iter()
        .filter(|t| t.net_pnl > Decimal::ZERO)
        .map(|t| t.net_pnl)
        .sum();
    let gross_losses: Decimal = trades
        .iter()
        .filter(|t| t.net_pnl < Decimal::ZERO)
        .map(|t| t.net_pnl.abs())
        .sum();

    if gross_losses.is_zero() {
        return Decimal::ZERO;
    }
    gross_wins / gross_losses
}

/// Day-over-day returns from the snapshot series: the last snapshot of each
/// calendar day against the previous day's.
pub fn daily_returns(snapshots: &[PortfolioSnapshot]) -> Vec<Decimal> {
    let mut day_closes: Vec<(chrono::NaiveDate, Decimal)> = Vec::new();
    for snapshot in snapshots {
        let day = snapshot.timestamp.date_naive();
        match day_closes.last_mut() {
            Some((last_day, value)) if *last_day == day => *value = snapshot.total_value,
            _ => day_closes.push((day, snapshot.total_value)),
        }
    }

    day_closes
        .windows(2)
        .filter_map(|pair| {
            let (_, prev) = pair[0];
            let (_, curr) = pair[1];
            if prev.is_zero() {
                None
            } else {
                Some((curr - prev) / prev)
            }
        })
        .collect()
}

/// Annualized Sharpe ratio: `mean(daily_return) / stddev * sqrt(252)`.
/// Zero when there is not enough data or no variance.
pub fn sharpe_ratio(daily_returns: &[Decimal]) -> Decimal {
    if daily_returns.len() < 2 {
        return Decimal::ZERO;
    }

    let n = Decimal::from(daily_returns.len() as i64);
    let mean = daily_returns.iter().copied().sum::<Decimal>() / n;

    let variance = daily_returns
        .iter()
        .map(|r| {
            let diff = *r - mean;
            diff * diff
        })
        .sum::<Decimal>()
        / n;

    let std_dev = match variance.sqrt() {
        Some(s) if !s.is_zero() => s,
        _ => return Decimal::ZERO,
    };

    let annualization = Decimal::from(252).sqrt().unwrap_or(Decimal::ONE);
    mean / std_dev * annualization
}

/// Deepest peak-to-trough decline across the snapshot series, in 0..=1.
pub fn max_drawdown(snapshots: &[PortfolioSnapshot]) -> Decimal {
    let mut peak = Decimal::ZERO;
    let mut worst = Decimal::ZERO;

    for snapshot in snapshots {
        if snapshot.total_value > peak {
            peak = snapshot.total_value;
        }
        if peak > Decimal::ZERO {
            let drawdown = (peak - snapshot.total_value) / peak;
            if drawdown > worst {
                worst = drawdown;
            }
        }
    }

    worst
}

/// Full report over the loaded history.
pub fn performance_report(trades: &[Trade], snapshots: &[PortfolioSnapshot]) -> PerformanceReport {
    let total_trades = trades.len() as i64;
    let win_count = trades.iter().filter(|t| t.net_pnl > Decimal::ZERO).count() as i64;
    let loss_count = trades.iter().filter(|t| t.net_pnl < Decimal::ZERO).count() as i64;
    let total_net_pnl: Decimal = trades.iter().map(|t| t.net_pnl).sum();

    let avg_win = if win_count > 0 {
        trades
            .iter()
            .filter(|t| t.net_pnl > Decimal::ZERO)
            .map(|t| t.net_pnl)
            .sum::<Decimal>()
            / Decimal::from(win_count)
    } else {
        Decimal::ZERO
    };

    let avg_loss = if loss_count > 0 {
        trades
            .iter()
            .filter(|t| t.net_pnl < Decimal::ZERO)
            .map(|t| t.net_pnl)
            .sum::<Decimal>()
            / Decimal::from(loss_count)
    } else {
        Decimal::ZERO
    };

    let best_trade = trades
        .iter()
        .map(|t| t.net_pnl)
        .max()
        .unwrap_or(Decimal::ZERO);
    let worst_trade = trades
        .iter()
        .map(|t| t.net_pnl)
        .min()
        .unwrap_or(Decimal::ZERO);

    let returns = daily_returns(snapshots);

    PerformanceReport {
        total_trades,
        win_count,
        loss_count,
        win_rate: win_rate(trades),
        total_net_pnl,
        avg_win,
        avg_loss,
        profit_factor: profit_factor(trades),
        sharpe_ratio: sharpe_ratio(&returns),
        max_drawdown_pct: max_drawdown(snapshots),
        best_trade,
        worst_trade,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
