use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Tolerance when checking that a table sums to 1.0.
fn sum_epsilon() -> Decimal {
    Decimal::new(1, 3) // 0.001
}

#[derive(Debug, Error)]
pub enum WeightError {
    #[error("weight table for asset class '{asset_class}' is empty")]
    EmptyTable { asset_class: String },

    #[error("weight for agent '{agent}' in '{asset_class}' must be positive, got {weight}")]
    NonPositiveWeight {
        asset_class: String,
        agent: String,
        weight: Decimal,
    },

    #[error("weights for asset class '{asset_class}' sum to {sum}, expected 1.0")]
    BadSum { asset_class: String, sum: Decimal },
}

/// Per-asset-class agent weight tables.
///
/// Fetched once per tick as a versioned snapshot and passed into the
/// consensus engine, so a mid-tick reload can never skew a fusion that is
/// already underway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    pub tables: HashMap<String, HashMap<String, Decimal>>,
}

fn default_version() -> u32 {
    1
}

impl WeightConfig {
    /// Built-in tables: crypto leans on sentiment, equities add fundamentals.
    pub fn defaults() -> Self {
        let mut tables = HashMap::new();

        let mut crypto = HashMap::new();
        crypto.insert("technical".to_string(), Decimal::new(4, 1)); // 0.4
        crypto.insert("sentiment".to_string(), Decimal::new(6, 1)); // 0.6
        tables.insert("crypto".to_string(), crypto);

        let mut equities = HashMap::new();
        equities.insert("technical".to_string(), Decimal::new(5, 1)); // 0.5
        equities.insert("sentiment".to_string(), Decimal::new(3, 1)); // 0.3
        equities.insert("fundamental".to_string(), Decimal::new(2, 1)); // 0.2
        tables.insert("equities".to_string(), equities);

        Self { version: 1, tables }
    }

    /// Parse a plain `{"crypto": {"technical": 0.4, ...}, ...}` JSON map.
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let tables: HashMap<String, HashMap<String, Decimal>> = serde_json::from_str(raw)?;
        Ok(Self { version: 1, tables })
    }

    /// Table weight for an agent, if the asset class and agent are known.
    pub fn agent_weight(&self, asset_class: &str, agent_name: &str) -> Option<Decimal> {
        self.tables
            .get(asset_class)
            .and_then(|table| table.get(agent_name))
            .copied()
    }

    /// Fail-fast sanity check, run at startup before the first tick.
    pub fn validate(&self) -> Result<(), WeightError> {
        for (asset_class, table) in &self.tables {
            if table.is_empty() {
                return Err(WeightError::EmptyTable {
                    asset_class: asset_class.clone(),
                });
            }

            let mut sum = Decimal::ZERO;
            for (agent, weight) in table {
                if *weight <= Decimal::ZERO {
                    return Err(WeightError::NonPositiveWeight {
                        asset_class: asset_class.clone(),
                        agent: agent.clone(),
                        weight: *weight,
                    });
                }
                sum += *weight;
            }

            if (sum - Decimal::ONE).abs() > sum_epsilon() {
                return Err(WeightError::BadSum {
                    asset_class: asset_class.clone(),
                    sum,
                });
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(WeightConfig::defaults().validate().is_ok());
    }

    #[test]
    fn test_agent_weight_lookup() {
        let config = WeightConfig::defaults();
        assert_eq!(
            config.agent_weight("crypto", "sentiment"),
            Some(Decimal::new(6, 1))
        );
        assert_eq!(config.agent_weight("crypto", "fundamental"), None);
        assert_eq!(config.agent_weight("bonds", "technical"), None);
    }

    #[test]
    fn test_from_json() {
        let config =
            WeightConfig::from_json(r#"{"crypto": {"technical": 0.5, "sentiment": 0.5}}"#)
                .expect("valid json");
        assert_eq!(
            config.agent_weight("crypto", "technical"),
            Some(Decimal::new(5, 1))
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_sum() {
        let config =
            WeightConfig::from_json(r#"{"crypto": {"technical": 0.5, "sentiment": 0.3}}"#)
                .expect("valid json");
        assert!(matches!(
            config.validate(),
            Err(WeightError::BadSum { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_negative_weight() {
        let config =
            WeightConfig::from_json(r#"{"crypto": {"technical": -0.2, "sentiment": 1.2}}"#)
                .expect("valid json");
        assert!(matches!(
            config.validate(),
            Err(WeightError::NonPositiveWeight { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_empty_table() {
        let config = WeightConfig::from_json(r#"{"crypto": {}}"#).expect("valid json");
        assert!(matches!(
            config.validate(),
            Err(WeightError::EmptyTable { .. })
        ));
    }
}
