use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::{
    Decision, Direction, Order, OrderStatus, OrderType, PortfolioSnapshot, PositionSide, Side,
    Trade,
};

use super::StoreError;

/// Postgres-backed record store. Plain append/select repos; all P&L and
/// performance math stays in the application.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        // Verify connectivity
        sqlx::query("SELECT 1").execute(&pool).await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS decisions (
                id UUID PRIMARY KEY,
                symbol TEXT NOT NULL,
                asset_class TEXT NOT NULL,
                direction TEXT NOT NULL,
                score NUMERIC NOT NULL,
                confidence NUMERIC NOT NULL,
                risk_score NUMERIC NOT NULL,
                contributing TEXT NOT NULL,
                reasoning TEXT NOT NULL,
                reference_price NUMERIC,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id UUID PRIMARY KEY,
                symbol TEXT NOT NULL,
                asset_class TEXT NOT NULL,
                side TEXT NOT NULL,
                order_type TEXT NOT NULL,
                quantity NUMERIC NOT NULL,
                limit_price NUMERIC,
                status TEXT NOT NULL,
                filled_quantity NUMERIC NOT NULL,
                avg_fill_price NUMERIC,
                commission NUMERIC NOT NULL,
                slippage_cost NUMERIC NOT NULL,
                total_cost NUMERIC,
                decision_ref UUID NOT NULL,
                error_message TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                filled_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id UUID PRIMARY KEY,
                symbol TEXT NOT NULL,
                asset_class TEXT NOT NULL,
                side TEXT NOT NULL,
                quantity NUMERIC NOT NULL,
                entry_price NUMERIC NOT NULL,
                exit_price NUMERIC NOT NULL,
                gross_pnl NUMERIC NOT NULL,
                fees NUMERIC NOT NULL,
                net_pnl NUMERIC NOT NULL,
                realized_pnl_pct NUMERIC NOT NULL,
                entry_time TIMESTAMPTZ NOT NULL,
                exit_time TIMESTAMPTZ NOT NULL,
                hold_duration_secs BIGINT NOT NULL,
                entry_confidence NUMERIC NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS portfolio_snapshots (
                time TIMESTAMPTZ NOT NULL,
                cash NUMERIC NOT NULL,
                positions_value NUMERIC NOT NULL,
                total_value NUMERIC NOT NULL,
                total_pnl NUMERIC NOT NULL,
                daily_pnl NUMERIC NOT NULL,
                open_positions BIGINT NOT NULL,
                long_positions BIGINT NOT NULL,
                short_positions BIGINT NOT NULL,
                peak_value NUMERIC NOT NULL,
                drawdown_pct NUMERIC NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn record_decision(&self, decision: &Decision) -> Result<(), StoreError> {
        let contributing = serde_json::to_string(&decision.contributing)?;

        sqlx::query(
            r#"
            INSERT INTO decisions (
                id, symbol, asset_class, direction, score, confidence,
                risk_score, contributing, reasoning, reference_price, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(decision.id)
        .bind(&decision.symbol)
        .bind(&decision.asset_class)
        .bind(decision.direction.to_string())
        .bind(decision.score)
        .bind(decision.confidence)
        .bind(decision.risk_score)
        .bind(contributing)
        .bind(&decision.reasoning)
        .bind(decision.reference_price)
        .bind(decision.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn record_order(&self, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, symbol, asset_class, side, order_type, quantity, limit_price,
                status, filled_quantity, avg_fill_price, commission, slippage_cost,
                total_cost, decision_ref, error_message, created_at, filled_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(order.id)
        .bind(&order.symbol)
        .bind(&order.asset_class)
        .bind(order.side.to_string())
        .bind(match order.order_type {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
        })
        .bind(order.quantity)
        .bind(order.limit_price)
        .bind(order.status.as_str())
        .bind(order.filled_quantity)
        .bind(order.avg_fill_price)
        .bind(order.commission)
        .bind(order.slippage_cost)
        .bind(order.total_cost)
        .bind(order.decision_ref)
        .bind(&order.error_message)
        .bind(order.created_at)
        .bind(order.filled_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn record_trade(&self, trade: &Trade) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO trades (
                id, symbol, asset_class, side, quantity, entry_price, exit_price,
                gross_pnl, fees, net_pnl, realized_pnl_pct, entry_time, exit_time,
                hold_duration_secs, entry_confidence
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(trade.id)
        .bind(&trade.symbol)
        .bind(&trade.asset_class)
        .bind(trade.side.to_string())
        .bind(trade.quantity)
        .bind(trade.entry_price)
        .bind(trade.exit_price)
        .bind(trade.gross_pnl)
        .bind(trade.fees)
        .bind(trade.net_pnl)
        .bind(trade.realized_pnl_pct)
        .bind(trade.entry_time)
        .bind(trade.exit_time)
        .bind(trade.hold_duration_secs)
        .bind(trade.entry_confidence)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn record_snapshot(&self, snapshot: &PortfolioSnapshot) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO portfolio_snapshots (
                time, cash, positions_value, total_value, total_pnl, daily_pnl,
                open_positions, long_positions, short_positions, peak_value, drawdown_pct
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(snapshot.timestamp)
        .bind(snapshot.cash)
        .bind(snapshot.positions_value)
        .bind(snapshot.total_value)
        .bind(snapshot.total_pnl)
        .bind(snapshot.daily_pnl)
        .bind(snapshot.open_positions)
        .bind(snapshot.long_positions)
        .bind(snapshot.short_positions)
        .bind(snapshot.peak_value)
        .bind(snapshot.drawdown_pct)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn decisions(
        &self,
        symbol: Option<&str>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<Decision>, StoreError> {
        let rows: Vec<DecisionRow> = sqlx::query_as(
            r#"
            SELECT * FROM decisions
            WHERE ($1::text IS NULL OR symbol = $1)
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at <= $3)
            ORDER BY created_at DESC
            LIMIT $4
            "#,
        )
        .bind(symbol)
        .bind(from)
        .bind(to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(DecisionRow::into_model).collect())
    }

    pub async fn orders(
        &self,
        symbol: Option<&str>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<Order>, StoreError> {
        let rows: Vec<OrderRow> = sqlx::query_as(
            r#"
            SELECT * FROM orders
            WHERE ($1::text IS NULL OR symbol = $1)
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at <= $3)
            ORDER BY created_at DESC
            LIMIT $4
            "#,
        )
        .bind(symbol)
        .bind(from)
        .bind(to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(OrderRow::into_model).collect())
    }

    pub async fn trades(
        &self,
        symbol: Option<&str>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<Trade>, StoreError> {
        let rows: Vec<TradeRow> = sqlx::query_as(
            r#"
            SELECT * FROM trades
            WHERE ($1::text IS NULL OR symbol = $1)
              AND ($2::timestamptz IS NULL OR exit_time >= $2)
              AND ($3::timestamptz IS NULL OR exit_time <= $3)
            ORDER BY exit_time ASC
            LIMIT $4
            "#,
        )
        .bind(symbol)
        .bind(from)
        .bind(to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TradeRow::into_model).collect())
    }

    pub async fn snapshots(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<PortfolioSnapshot>, StoreError> {
        let rows: Vec<SnapshotRow> = sqlx::query_as(
            r#"
            SELECT * FROM portfolio_snapshots
            WHERE ($1::timestamptz IS NULL OR time >= $1)
              AND ($2::timestamptz IS NULL OR time <= $2)
            ORDER BY time ASC
            LIMIT $3
            "#,
        )
        .bind(from)
        .bind(to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SnapshotRow::into_model).collect())
    }

    pub async fn earliest_snapshot_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<PortfolioSnapshot>, StoreError> {
        let row: Option<SnapshotRow> = sqlx::query_as(
            "SELECT * FROM portfolio_snapshots WHERE time >= $1 ORDER BY time ASC LIMIT 1",
        )
        .bind(cutoff)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SnapshotRow::into_model))
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

#[derive(FromRow)]
struct DecisionRow {
    id: Uuid,
    symbol: String,
    asset_class: String,
    direction: String,
    score: Decimal,
    confidence: Decimal,
    risk_score: Decimal,
    contributing: String,
    reasoning: String,
    reference_price: Option<Decimal>,
    created_at: DateTime<Utc>,
}

impl DecisionRow {
    fn into_model(self) -> Decision {
        Decision {
            id: self.id,
            symbol: self.symbol,
            asset_class: self.asset_class,
            direction: Direction::from_str(&self.direction).unwrap_or(Direction::Hold),
            score: self.score,
            confidence: self.confidence,
            risk_score: self.risk_score,
            contributing: serde_json::from_str(&self.contributing).unwrap_or_default(),
            reasoning: self.reasoning,
            reference_price: self.reference_price,
            timestamp: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct OrderRow {
    id: Uuid,
    symbol: String,
    asset_class: String,
    side: String,
    order_type: String,
    quantity: Decimal,
    limit_price: Option<Decimal>,
    status: String,
    filled_quantity: Decimal,
    avg_fill_price: Option<Decimal>,
    commission: Decimal,
    slippage_cost: Decimal,
    total_cost: Option<Decimal>,
    decision_ref: Uuid,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    filled_at: Option<DateTime<Utc>>,
}

impl OrderRow {
    fn into_model(self) -> Order {
        Order {
            id: self.id,
            symbol: self.symbol,
            asset_class: self.asset_class,
            side: Side::from_str(&self.side).unwrap_or(Side::Buy),
            order_type: if self.order_type == "LIMIT" {
                OrderType::Limit
            } else {
                OrderType::Market
            },
            quantity: self.quantity,
            limit_price: self.limit_price,
            status: OrderStatus::from_str(&self.status).unwrap_or(OrderStatus::Cancelled),
            filled_quantity: self.filled_quantity,
            avg_fill_price: self.avg_fill_price,
            commission: self.commission,
            slippage_cost: self.slippage_cost,
            total_cost: self.total_cost,
            decision_ref: self.decision_ref,
            error_message: self.error_message,
            created_at: self.created_at,
            filled_at: self.filled_at,
        }
    }
}

#[derive(FromRow)]
struct TradeRow {
    id: Uuid,
    symbol: String,
    asset_class: String,
    side: String,
    quantity: Decimal,
    entry_price: Decimal,
    exit_price: Decimal,
    gross_pnl: Decimal,
    fees: Decimal,
    net_pnl: Decimal,
    realized_pnl_pct: Decimal,
    entry_time: DateTime<Utc>,
    exit_time: DateTime<Utc>,
    hold_duration_secs: i64,
    entry_confidence: Decimal,
}

impl TradeRow {
    fn into_model(self) -> Trade {
        Trade {
            id: self.id,
            symbol: self.symbol,
            asset_class: self.asset_class,
            side: PositionSide::from_str(&self.side).unwrap_or(PositionSide::Long),
            quantity: self.quantity,
            entry_price: self.entry_price,
            exit_price: self.exit_price,
            gross_pnl: self.gross_pnl,
            fees: self.fees,
            net_pnl: self.net_pnl,
            realized_pnl_pct: self.realized_pnl_pct,
            entry_time: self.entry_time,
            exit_time: self.exit_time,
            hold_duration_secs: self.hold_duration_secs,
            entry_confidence: self.entry_confidence,
        }
    }
}

#[derive(FromRow)]
struct SnapshotRow {
    time: DateTime<Utc>,
    cash: Decimal,
    positions_value: Decimal,
    total_value: Decimal,
    total_pnl: Decimal,
    daily_pnl: Decimal,
    open_positions: i64,
    long_positions: i64,
    short_positions: i64,
    peak_value: Decimal,
    drawdown_pct: Decimal,
}

impl SnapshotRow {
    fn into_model(self) -> PortfolioSnapshot {
        PortfolioSnapshot {
            timestamp: self.time,
            cash: self.cash,
            positions_value: self.positions_value,
            total_value: self.total_value,
            total_pnl: self.total_pnl,
            daily_pnl: self.daily_pnl,
            open_positions: self.open_positions,
            long_positions: self.long_positions,
            short_positions: self.short_positions,
            peak_value: self.peak_value,
            drawdown_pct: self.drawdown_pct,
        }
    }
}
