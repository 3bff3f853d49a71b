pub mod engine;
pub mod weights;

pub use engine::evaluate;
pub use weights::{WeightConfig, WeightError};
