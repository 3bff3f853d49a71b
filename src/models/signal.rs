use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Direction;

/// A single analysis agent's directional opinion on a symbol.
///
/// Signals are immutable inputs produced by external analysts; the consensus
/// engine only reads the most recent signal per agent within its lookback
/// window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSignal {
    pub symbol: String,
    /// Name of the emitting agent, e.g. "technical" or "sentiment".
    pub agent_name: String,
    pub direction: Direction,
    /// Signal strength on a -100..=100 scale.
    pub strength: i32,
    /// Agent's own confidence in the signal, 0..=1.
    pub confidence: Decimal,
    /// Per-signal weight multiplier applied on top of the asset-class table.
    #[serde(default = "default_weight")]
    pub weight: Decimal,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

fn default_weight() -> Decimal {
    Decimal::ONE
}

impl AgentSignal {
    /// Clamp strength, confidence and weight into their documented ranges.
    /// Applied once at intake so downstream math never re-checks.
    pub fn normalized(mut self) -> Self {
        self.strength = self.strength.clamp(-100, 100);
        self.confidence = self.confidence.clamp(Decimal::ZERO, Decimal::ONE);
        if self.weight < Decimal::ZERO {
            self.weight = Decimal::ZERO;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_signal(strength: i32, confidence: Decimal, weight: Decimal) -> AgentSignal {
        AgentSignal {
            symbol: "BTC/USDT".into(),
            agent_name: "technical".into(),
            direction: Direction::Buy,
            strength,
            confidence,
            weight,
            reasoning: String::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_normalized_clamps_ranges() {
        let s = make_signal(250, Decimal::from(2), Decimal::from(-1)).normalized();
        assert_eq!(s.strength, 100);
        assert_eq!(s.confidence, Decimal::ONE);
        assert_eq!(s.weight, Decimal::ZERO);

        let s = make_signal(-250, Decimal::from(-1), Decimal::ONE).normalized();
        assert_eq!(s.strength, -100);
        assert_eq!(s.confidence, Decimal::ZERO);
    }

    #[test]
    fn test_normalized_keeps_valid_values() {
        let s = make_signal(72, Decimal::new(75, 2), Decimal::ONE).normalized();
        assert_eq!(s.strength, 72);
        assert_eq!(s.confidence, Decimal::new(75, 2));
    }
}
