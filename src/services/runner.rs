use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use metrics::{counter, histogram};
use tokio::sync::{watch, RwLock, Semaphore};
use tokio::time::{interval, timeout, Duration};

use crate::config::{AppConfig, SymbolSpec};
use crate::consensus::{self, WeightConfig};
use crate::execution::{ExecutionOutcome, ExecutionSimulator, SkipReason};
use crate::ingestion::{MemoryPriceFeed, MemorySignalStore};
use crate::ledger::{ApplyOutcome, Portfolio, TradeRecorder};
use crate::services::SnapshotService;
use crate::store::{with_retry, Store};

/// Structured per-tick report, emitted regardless of partial failures.
#[derive(Debug, Clone, Default)]
pub struct TickSummary {
    pub symbols_processed: usize,
    pub decisions_made: usize,
    pub orders_filled: usize,
    pub orders_rejected: usize,
    pub orders_skipped: usize,
    pub trades_closed: usize,
    /// Symbols skipped for the tick because input data never arrived.
    pub symbols_skipped: Vec<String>,
    /// Symbols whose records could not be persisted after retries.
    pub degraded: Vec<String>,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl TickSummary {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug, Default)]
struct SymbolReport {
    symbol: String,
    decision_made: bool,
    filled: bool,
    rejected: bool,
    skipped: bool,
    trade_closed: bool,
    data_unavailable: bool,
    degraded: bool,
    error: Option<String>,
}

/// The control loop: one tick gathers signals, fuses decisions, simulates
/// fills and values the book.
///
/// Symbols are processed in parallel under a bounded worker pool; the
/// portfolio mutex serializes all ledger mutations, so cross-symbol fills
/// can never corrupt cash.
#[derive(Clone)]
pub struct TradingEngine {
    config: Arc<AppConfig>,
    weights: Arc<RwLock<WeightConfig>>,
    portfolio: Portfolio,
    simulator: Arc<ExecutionSimulator>,
    recorder: Arc<TradeRecorder>,
    signals: MemorySignalStore,
    prices: MemoryPriceFeed,
    store: Store,
    snapshots: Arc<SnapshotService>,
}

impl TradingEngine {
    pub fn new(config: Arc<AppConfig>, store: Store) -> Self {
        let portfolio = Portfolio::new(config.initial_capital);
        let prices = MemoryPriceFeed::new();
        let snapshots = Arc::new(SnapshotService::new(
            portfolio.clone(),
            prices.clone(),
            store.clone(),
            config.initial_capital,
        ));

        Self {
            weights: Arc::new(RwLock::new(config.weights.clone())),
            simulator: Arc::new(ExecutionSimulator::new(config.execution())),
            recorder: Arc::new(TradeRecorder::new(store.clone())),
            signals: MemorySignalStore::new(),
            portfolio,
            prices,
            store,
            snapshots,
            config,
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn signals(&self) -> &MemorySignalStore {
        &self.signals
    }

    pub fn prices(&self) -> &MemoryPriceFeed {
        &self.prices
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub async fn weights_snapshot(&self) -> WeightConfig {
        self.weights.read().await.clone()
    }

    /// Swap in a new weight table version. Takes effect from the next tick;
    /// the tick in flight keeps the snapshot it started with.
    pub async fn reload_weights(&self, mut weights: WeightConfig) {
        let mut current = self.weights.write().await;
        weights.version = current.version + 1;
        tracing::info!(version = weights.version, "Agent weight tables reloaded");
        *current = weights;
    }

    /// Run one full tick over all configured symbols.
    pub async fn run_tick(&self, now: DateTime<Utc>) -> TickSummary {
        let started = Instant::now();
        // One weight snapshot for the whole tick.
        let weights = Arc::new(self.weights.read().await.clone());
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));

        let mut tasks = Vec::with_capacity(self.config.symbols.len());
        for spec in self.config.symbols.clone() {
            let engine = self.clone();
            let weights = Arc::clone(&weights);
            let semaphore = Arc::clone(&semaphore);
            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.ok();
                engine.process_symbol(&spec, &weights, now).await
            }));
        }

        let mut summary = TickSummary::default();
        for result in join_all(tasks).await {
            match result {
                Ok(report) => {
                    summary.symbols_processed += 1;
                    summary.decisions_made += report.decision_made as usize;
                    summary.orders_filled += report.filled as usize;
                    summary.orders_rejected += report.rejected as usize;
                    summary.orders_skipped += report.skipped as usize;
                    summary.trades_closed += report.trade_closed as usize;
                    if report.data_unavailable {
                        summary.symbols_skipped.push(report.symbol.clone());
                    }
                    if report.degraded {
                        summary.degraded.push(report.symbol.clone());
                    }
                    if let Some(error) = report.error {
                        summary.errors.push(format!("{}: {}", report.symbol, error));
                    }
                }
                Err(e) => summary.errors.push(format!("worker task failed: {e}")),
            }
        }

        // Value the book once all fills for the tick have settled.
        if let Err(e) = self.snapshots.take_snapshot(now).await {
            summary.degraded.push("snapshot".to_string());
            summary.errors.push(format!("snapshot: {e}"));
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        histogram!("tick_duration_seconds").record(started.elapsed().as_secs_f64());

        tracing::info!(
            symbols = summary.symbols_processed,
            decisions = summary.decisions_made,
            filled = summary.orders_filled,
            rejected = summary.orders_rejected,
            skipped = summary.orders_skipped,
            trades_closed = summary.trades_closed,
            data_skipped = summary.symbols_skipped.len(),
            degraded = summary.degraded.len(),
            errors = summary.errors.len(),
            duration_ms = summary.duration_ms,
            "Tick complete"
        );

        summary
    }

    /// Run ticks until the stop signal flips. A stop received mid-tick lets
    /// the tick finish: in-flight ledger mutations are never aborted.
    pub async fn run_until_stopped(&self, mut stop: watch::Receiver<bool>) {
        let mut ticker = interval(Duration::from_secs(self.config.tick_interval_secs));
        tracing::info!(
            interval_secs = self.config.tick_interval_secs,
            symbols = self.config.symbols.len(),
            "Trading engine started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if *stop.borrow() {
                        break;
                    }
                    self.run_tick(Utc::now()).await;
                }
                _ = stop.changed() => {
                    if *stop.borrow() {
                        tracing::info!("Stop signal received — no further ticks");
                        break;
                    }
                }
            }
        }

        tracing::info!("Trading engine stopped");
    }

    async fn process_symbol(
        &self,
        spec: &SymbolSpec,
        weights: &WeightConfig,
        now: DateTime<Utc>,
    ) -> SymbolReport {
        let mut report = SymbolReport {
            symbol: spec.symbol.clone(),
            ..SymbolReport::default()
        };
        let lookup_timeout = Duration::from_millis(self.config.lookup_timeout_ms);

        // Bounded lookups: a slow source skips the symbol for this tick only.
        let signals = match timeout(
            lookup_timeout,
            self.signals
                .recent_signals(&spec.symbol, self.config.signal_lookback(), now),
        )
        .await
        {
            Ok(signals) => signals,
            Err(_) => {
                tracing::warn!(symbol = %spec.symbol, "Signal lookup timed out — skipping symbol this tick");
                report.data_unavailable = true;
                return report;
            }
        };

        let reference_price = match timeout(
            lookup_timeout,
            self.prices.price(&spec.symbol, now),
        )
        .await
        {
            Ok(price) => price,
            Err(_) => {
                tracing::warn!(symbol = %spec.symbol, "Price lookup timed out — skipping symbol this tick");
                report.data_unavailable = true;
                return report;
            }
        };

        let decision = consensus::evaluate(
            &spec.symbol,
            &spec.asset_class,
            &signals,
            weights,
            self.config.signal_lookback(),
            reference_price,
            now,
        );
        report.decision_made = true;
        counter!("decisions_total").increment(1);

        tracing::debug!(
            symbol = %decision.symbol,
            direction = %decision.direction,
            score = %decision.score,
            confidence = %decision.confidence,
            "Decision fused"
        );

        if let Err(e) = with_retry("record_decision", 3, || {
            self.store.record_decision(&decision)
        })
        .await
        {
            report.degraded = true;
            report.error = Some(format!("decision persist failed: {e}"));
        }

        match self.simulator.execute(&decision, &self.portfolio, now).await {
            ExecutionOutcome::Filled { order, ledger } => {
                report.filled = true;

                if let Err(e) =
                    with_retry("record_order", 3, || self.store.record_order(&order)).await
                {
                    report.degraded = true;
                    report.error = Some(format!("order persist failed: {e}"));
                }

                if let ApplyOutcome::Closed { position, .. } = &ledger {
                    match self.recorder.record_closure(position).await {
                        Ok(_) => report.trade_closed = true,
                        Err(e) => {
                            report.degraded = true;
                            report.error = Some(format!("trade persist failed: {e}"));
                        }
                    }
                }
            }
            ExecutionOutcome::Rejected { order } => {
                report.rejected = true;
                if let Err(e) =
                    with_retry("record_order", 3, || self.store.record_order(&order)).await
                {
                    report.degraded = true;
                    report.error = Some(format!("order persist failed: {e}"));
                }
            }
            ExecutionOutcome::Skipped { reason } => {
                report.skipped = true;
                counter!("orders_skipped").increment(1);
                if reason == SkipReason::PriceUnavailable {
                    report.data_unavailable = true;
                }
                tracing::debug!(symbol = %spec.symbol, reason = %reason, "Decision skipped");
            }
        }

        report
    }
}
