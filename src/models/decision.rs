use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Direction;

/// One agent's share of a fused decision, kept for auditability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributingAgent {
    pub agent_name: String,
    /// Normalized weight fraction in 0..=1; fractions across the decision sum to 1.
    pub weight_fraction: Decimal,
    pub strength: i32,
    pub direction: Direction,
}

/// The fused, symbol-level trading directive derived from all current signals.
///
/// Created once per consensus evaluation and never mutated. The `id` is the
/// idempotency key: the execution simulator consumes each decision at most
/// once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: Uuid,
    pub symbol: String,
    pub asset_class: String,
    pub direction: Direction,
    /// Weighted strength in -100..=100.
    pub score: Decimal,
    /// Weighted confidence in 0..=1.
    pub confidence: Decimal,
    /// Risk estimate in 0..=1 feeding position sizing; 0.5 when no upstream
    /// risk analysis contributed.
    pub risk_score: Decimal,
    pub contributing: Vec<ContributingAgent>,
    /// Deterministic, ordered concatenation of the contributing agents'
    /// weight, strength, direction and reasoning text.
    pub reasoning: String,
    /// Latest reference price at evaluation time; None when the price feed
    /// had nothing, in which case execution skips the decision.
    pub reference_price: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}
