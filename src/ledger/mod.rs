pub mod portfolio;
pub mod recorder;

pub use portfolio::{ApplyOutcome, FillEvent, LedgerError, Portfolio, Valuation};
pub use recorder::TradeRecorder;
