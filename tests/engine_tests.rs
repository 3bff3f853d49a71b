use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use paperbot::config::{AppConfig, SymbolSpec};
use paperbot::consensus::WeightConfig;
use paperbot::models::{AgentSignal, Direction, OrderStatus, PositionSide};
use paperbot::services::TradingEngine;
use paperbot::store::Store;

fn test_config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".into(),
        port: 0,
        database_url: None,
        symbols: vec![SymbolSpec {
            symbol: "BTC/USDT".into(),
            asset_class: "crypto".into(),
        }],
        initial_capital: Decimal::from(10_000),
        confidence_threshold: Decimal::new(6, 1),
        max_position_size_pct: Decimal::new(20, 2),
        commission_pct: Decimal::new(1, 3),
        commission_min: Decimal::ONE,
        base_slippage_pct: Decimal::new(5, 4),
        tick_interval_secs: 60,
        signal_lookback_secs: 300,
        max_concurrency: 2,
        lookup_timeout_ms: 1_000,
        weights: WeightConfig::defaults(),
    }
}

fn make_engine() -> TradingEngine {
    TradingEngine::new(Arc::new(test_config()), Store::memory())
}

fn make_signal(agent: &str, direction: Direction, strength: i32, confidence: Decimal) -> AgentSignal {
    AgentSignal {
        symbol: "BTC/USDT".into(),
        agent_name: agent.into(),
        direction,
        strength,
        confidence,
        weight: Decimal::ONE,
        reasoning: format!("{agent} test view"),
        timestamp: Utc::now(),
    }
}

async fn push_buy_consensus(engine: &TradingEngine) {
    engine
        .signals()
        .push(make_signal("technical", Direction::Buy, 90, Decimal::new(8, 1)))
        .await;
    engine
        .signals()
        .push(make_signal("sentiment", Direction::Buy, 80, Decimal::new(9, 1)))
        .await;
}

async fn push_sell_consensus(engine: &TradingEngine) {
    engine
        .signals()
        .push(make_signal("technical", Direction::Sell, -90, Decimal::new(8, 1)))
        .await;
    engine
        .signals()
        .push(make_signal("sentiment", Direction::Sell, -80, Decimal::new(9, 1)))
        .await;
}

#[tokio::test]
async fn test_tick_fuses_signals_and_opens_position() {
    let engine = make_engine();
    push_buy_consensus(&engine).await;
    engine
        .prices()
        .push("BTC/USDT", Decimal::from(100), Utc::now())
        .await;

    let summary = engine.run_tick(Utc::now()).await;

    assert_eq!(summary.symbols_processed, 1);
    assert_eq!(summary.decisions_made, 1);
    assert_eq!(summary.orders_filled, 1);
    assert_eq!(summary.orders_rejected, 0);
    assert!(summary.errors.is_empty());

    // Decision recorded with the fused score/direction.
    let decisions = engine.store().decisions(None, None, None, 10).await.expect("query");
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].direction, Direction::Buy);
    // 90*0.4 + 80*0.6 = 84
    assert_eq!(decisions[0].score, Decimal::from(84));

    // Order recorded as filled.
    let orders = engine.store().orders(None, None, None, 10).await.expect("query");
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatus::Filled);
    assert_eq!(orders[0].decision_ref, decisions[0].id);

    // A long position exists and cash went down.
    let position = engine
        .portfolio()
        .position("BTC/USDT", PositionSide::Long)
        .await
        .expect("long opened");
    assert!(position.quantity > Decimal::ZERO);
    assert!(engine.portfolio().cash().await < Decimal::from(10_000));

    // The valuation tick appended a snapshot with a consistent total.
    let snapshots = engine
        .store()
        .snapshots(None, None, 10)
        .await
        .expect("query");
    assert_eq!(snapshots.len(), 1);
    assert_eq!(
        snapshots[0].cash + snapshots[0].positions_value,
        snapshots[0].total_value
    );
    assert_eq!(snapshots[0].open_positions, 1);
}

#[tokio::test]
async fn test_hold_band_decision_produces_no_order() {
    let engine = make_engine();
    // Scenario: disagreeing agents land the score inside the HOLD band even
    // though fused confidence clears the execution gate.
    engine
        .signals()
        .push(make_signal("technical", Direction::Sell, -10, Decimal::new(50, 2)))
        .await;
    engine
        .signals()
        .push(make_signal("sentiment", Direction::Buy, 72, Decimal::new(75, 2)))
        .await;
    engine
        .prices()
        .push("BTC/USDT", Decimal::from(100), Utc::now())
        .await;

    let summary = engine.run_tick(Utc::now()).await;

    assert_eq!(summary.decisions_made, 1);
    assert_eq!(summary.orders_filled, 0);
    assert_eq!(summary.orders_skipped, 1);

    let decisions = engine.store().decisions(None, None, None, 10).await.expect("query");
    assert_eq!(decisions[0].direction, Direction::Hold);
    assert_eq!(decisions[0].score, Decimal::new(392, 1)); // 39.2
    assert_eq!(decisions[0].confidence, Decimal::new(65, 2)); // 0.65

    assert!(engine.portfolio().open_positions().await.is_empty());
    assert!(engine
        .store()
        .orders(None, None, None, 10)
        .await
        .expect("query")
        .is_empty());
}

#[tokio::test]
async fn test_zero_signals_resolves_to_hold_without_error() {
    let engine = make_engine();
    engine
        .prices()
        .push("BTC/USDT", Decimal::from(100), Utc::now())
        .await;

    let summary = engine.run_tick(Utc::now()).await;

    assert_eq!(summary.decisions_made, 1);
    assert_eq!(summary.orders_filled, 0);
    assert!(summary.errors.is_empty());

    let decisions = engine.store().decisions(None, None, None, 10).await.expect("query");
    assert_eq!(decisions[0].direction, Direction::Hold);
    assert_eq!(decisions[0].score, Decimal::ZERO);
    assert_eq!(decisions[0].confidence, Decimal::ZERO);
}

#[tokio::test]
async fn test_missing_price_skips_symbol_and_retries_next_tick() {
    let engine = make_engine();
    push_buy_consensus(&engine).await;

    // No price pushed: the decision is made but execution must skip.
    let summary = engine.run_tick(Utc::now()).await;
    assert_eq!(summary.decisions_made, 1);
    assert_eq!(summary.orders_filled, 0);
    assert_eq!(summary.symbols_skipped, vec!["BTC/USDT".to_string()]);
    assert!(engine.portfolio().open_positions().await.is_empty());

    // Price arrives; the next tick (fresh signals still in window) trades.
    engine
        .prices()
        .push("BTC/USDT", Decimal::from(100), Utc::now())
        .await;
    let summary = engine.run_tick(Utc::now()).await;
    assert_eq!(summary.orders_filled, 1);
}

#[tokio::test]
async fn test_full_cycle_open_close_records_profitable_trade() {
    let engine = make_engine();

    // Tick 1: consensus BUY at 100.
    push_buy_consensus(&engine).await;
    engine
        .prices()
        .push("BTC/USDT", Decimal::from(100), Utc::now())
        .await;
    let summary = engine.run_tick(Utc::now()).await;
    assert_eq!(summary.orders_filled, 1);

    let position = engine
        .portfolio()
        .position("BTC/USDT", PositionSide::Long)
        .await
        .expect("long opened");
    let quantity = position.quantity;

    // Tick 2: consensus SELL at 120 closes the long in full.
    push_sell_consensus(&engine).await;
    engine
        .prices()
        .push("BTC/USDT", Decimal::from(120), Utc::now())
        .await;
    let summary = engine.run_tick(Utc::now()).await;
    assert_eq!(summary.orders_filled, 1);
    assert_eq!(summary.trades_closed, 1);

    assert!(engine
        .portfolio()
        .position("BTC/USDT", PositionSide::Long)
        .await
        .is_none());

    let trades = engine
        .store()
        .trades(None, None, None, 10)
        .await
        .expect("query");
    assert_eq!(trades.len(), 1);
    let trade = &trades[0];

    assert_eq!(trade.side, PositionSide::Long);
    assert_eq!(trade.quantity, quantity);
    assert_eq!(trade.entry_price, Decimal::from(100));
    assert_eq!(trade.exit_price, Decimal::from(120));
    // (120 - 100) * quantity
    assert_eq!(trade.gross_pnl, Decimal::from(20) * quantity);
    assert_eq!(trade.net_pnl, trade.gross_pnl - trade.fees);
    assert!(trade.net_pnl > Decimal::ZERO);

    // Money conservation: with the book flat again, cash is exactly the
    // initial capital plus the trade's net P&L.
    assert_eq!(
        engine.portfolio().cash().await,
        Decimal::from(10_000) + trade.net_pnl
    );
}

#[tokio::test]
async fn test_losing_round_trip_at_flat_price_costs_only_fees() {
    let engine = make_engine();

    push_buy_consensus(&engine).await;
    engine
        .prices()
        .push("BTC/USDT", Decimal::from(100), Utc::now())
        .await;
    engine.run_tick(Utc::now()).await;

    push_sell_consensus(&engine).await;
    engine
        .prices()
        .push("BTC/USDT", Decimal::from(100), Utc::now())
        .await;
    engine.run_tick(Utc::now()).await;

    let trades = engine
        .store()
        .trades(None, None, None, 10)
        .await
        .expect("query");
    assert_eq!(trades.len(), 1);
    let trade = &trades[0];

    assert_eq!(trade.gross_pnl, Decimal::ZERO);
    assert_eq!(trade.net_pnl, -trade.fees);
    assert_eq!(
        engine.portfolio().cash().await,
        Decimal::from(10_000) - trade.fees
    );
}

#[tokio::test]
async fn test_resubmitted_decision_never_double_fills() {
    let engine = make_engine();
    push_buy_consensus(&engine).await;
    engine
        .prices()
        .push("BTC/USDT", Decimal::from(100), Utc::now())
        .await;
    engine.run_tick(Utc::now()).await;

    let decisions = engine.store().decisions(None, None, None, 10).await.expect("query");
    let decision = decisions[0].clone();
    let quantity_before = engine
        .portfolio()
        .position("BTC/USDT", PositionSide::Long)
        .await
        .expect("long opened")
        .quantity;

    // Another tick with the same inputs: every evaluation mints a fresh
    // decision identity, so the original id must stay unique in the order
    // stream no matter how many ticks run.
    engine.run_tick(Utc::now()).await;

    let orders = engine.store().orders(None, None, None, 10).await.expect("query");
    let referencing: Vec<_> = orders
        .iter()
        .filter(|o| o.decision_ref == decision.id)
        .collect();
    assert_eq!(referencing.len(), 1, "one order per decision identity");

    // The second tick made its own decision; the position grew only through
    // distinct decisions, never through a replay of the first.
    let quantity_after = engine
        .portfolio()
        .position("BTC/USDT", PositionSide::Long)
        .await
        .expect("long still open")
        .quantity;
    assert!(quantity_after >= quantity_before);
}
