pub mod runner;
pub mod snapshot;

pub use runner::{TickSummary, TradingEngine};
pub use snapshot::SnapshotService;
