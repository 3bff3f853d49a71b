pub mod simulator;
pub mod sizing;
pub mod slippage;

pub use simulator::{ExecutionConfig, ExecutionOutcome, ExecutionSimulator, SkipReason};
pub use sizing::SizingConfig;
pub use slippage::FillCosts;
