use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use thiserror::Error;

use crate::consensus::weights::{WeightConfig, WeightError};
use crate::execution::{ExecutionConfig, SizingConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: String },

    #[error("configuration error: {name} must be within {range}, got {value}")]
    OutOfRange {
        name: &'static str,
        range: &'static str,
        value: String,
    },

    #[error("configuration error: no trading symbols configured")]
    NoSymbols,

    #[error(transparent)]
    Weights(#[from] WeightError),
}

/// A tradable symbol with its asset-class tag, e.g. `BTC/USDT:crypto`.
#[derive(Debug, Clone)]
pub struct SymbolSpec {
    pub symbol: String,
    pub asset_class: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// When unset, records stay in the in-memory store.
    pub database_url: Option<String>,

    pub symbols: Vec<SymbolSpec>,
    pub initial_capital: Decimal,

    // Execution
    pub confidence_threshold: Decimal,
    pub max_position_size_pct: Decimal,
    pub commission_pct: Decimal,
    pub commission_min: Decimal,
    pub base_slippage_pct: Decimal,

    // Scheduling
    pub tick_interval_secs: u64,
    pub signal_lookback_secs: u64,
    pub max_concurrency: usize,
    pub lookup_timeout_ms: u64,

    pub weights: WeightConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let symbols_raw = env::var("SYMBOLS")
            .unwrap_or_else(|_| "BTC/USDT:crypto,ETH/USDT:crypto,SOL/USDT:crypto".into());

        let weights = match env::var("AGENT_WEIGHTS") {
            Ok(raw) => WeightConfig::from_json(&raw)
                .map_err(|e| anyhow::anyhow!("AGENT_WEIGHTS is not valid JSON: {e}"))?,
            Err(_) => WeightConfig::defaults(),
        };

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_env("PORT", 8080)?,
            database_url: env::var("DATABASE_URL").ok(),

            symbols: parse_symbols(&symbols_raw),
            initial_capital: parse_env("INITIAL_CAPITAL", Decimal::from(10_000))?,

            confidence_threshold: parse_env("CONFIDENCE_THRESHOLD", Decimal::new(6, 1))?,
            max_position_size_pct: parse_env("MAX_POSITION_SIZE_PCT", Decimal::new(20, 2))?,
            commission_pct: parse_env("COMMISSION_PCT", Decimal::new(1, 3))?,
            commission_min: parse_env("COMMISSION_MIN", Decimal::ONE)?,
            base_slippage_pct: parse_env("BASE_SLIPPAGE_PCT", Decimal::new(5, 4))?,

            tick_interval_secs: parse_env("TICK_INTERVAL_SECONDS", 60)?,
            signal_lookback_secs: parse_env("SIGNAL_LOOKBACK_SECS", 300)?,
            max_concurrency: parse_env("MAX_CONCURRENCY", 4)?,
            lookup_timeout_ms: parse_env("LOOKUP_TIMEOUT_MS", 2_000)?,

            weights,
        })
    }

    /// Fail fast before the first tick: a bad configuration prevents startup
    /// entirely.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(ConfigError::NoSymbols);
        }
        if self.initial_capital <= Decimal::ZERO {
            return Err(ConfigError::NonPositive {
                name: "INITIAL_CAPITAL",
                value: self.initial_capital.to_string(),
            });
        }
        if self.confidence_threshold < Decimal::ZERO || self.confidence_threshold > Decimal::ONE {
            return Err(ConfigError::OutOfRange {
                name: "CONFIDENCE_THRESHOLD",
                range: "[0, 1]",
                value: self.confidence_threshold.to_string(),
            });
        }
        if self.max_position_size_pct <= Decimal::ZERO || self.max_position_size_pct > Decimal::ONE
        {
            return Err(ConfigError::OutOfRange {
                name: "MAX_POSITION_SIZE_PCT",
                range: "(0, 1]",
                value: self.max_position_size_pct.to_string(),
            });
        }
        if self.commission_pct < Decimal::ZERO {
            return Err(ConfigError::NonPositive {
                name: "COMMISSION_PCT",
                value: self.commission_pct.to_string(),
            });
        }
        if self.commission_min < Decimal::ZERO {
            return Err(ConfigError::NonPositive {
                name: "COMMISSION_MIN",
                value: self.commission_min.to_string(),
            });
        }
        if self.base_slippage_pct < Decimal::ZERO {
            return Err(ConfigError::NonPositive {
                name: "BASE_SLIPPAGE_PCT",
                value: self.base_slippage_pct.to_string(),
            });
        }
        if self.tick_interval_secs == 0 {
            return Err(ConfigError::NonPositive {
                name: "TICK_INTERVAL_SECONDS",
                value: self.tick_interval_secs.to_string(),
            });
        }
        if self.signal_lookback_secs == 0 {
            return Err(ConfigError::NonPositive {
                name: "SIGNAL_LOOKBACK_SECS",
                value: self.signal_lookback_secs.to_string(),
            });
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::NonPositive {
                name: "MAX_CONCURRENCY",
                value: self.max_concurrency.to_string(),
            });
        }

        self.weights.validate()?;
        Ok(())
    }

    pub fn execution(&self) -> ExecutionConfig {
        ExecutionConfig {
            confidence_threshold: self.confidence_threshold,
            base_slippage_pct: self.base_slippage_pct,
            commission_pct: self.commission_pct,
            commission_min: self.commission_min,
            sizing: SizingConfig {
                max_position_size_pct: self.max_position_size_pct,
                ..SizingConfig::default()
            },
        }
    }

    pub fn signal_lookback(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.signal_lookback_secs as i64)
    }
}

fn parse_env<T: FromStr>(name: &'static str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{name} is invalid: {e}")),
        Err(_) => Ok(default),
    }
}

/// `"BTC/USDT:crypto,AAPL:equities"` → symbol specs. A missing tag defaults
/// to crypto.
fn parse_symbols(raw: &str) -> Vec<SymbolSpec> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| match entry.rsplit_once(':') {
            Some((symbol, asset_class)) => SymbolSpec {
                symbol: symbol.trim().to_string(),
                asset_class: asset_class.trim().to_string(),
            },
            None => SymbolSpec {
                symbol: entry.to_string(),
                asset_class: "crypto".to_string(),
            },
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            host: "0.0.0.0".into(),
            port: 8080,
            database_url: None,
            symbols: parse_symbols("BTC/USDT:crypto"),
            initial_capital: Decimal::from(10_000),
            confidence_threshold: Decimal::new(6, 1),
            max_position_size_pct: Decimal::new(20, 2),
            commission_pct: Decimal::new(1, 3),
            commission_min: Decimal::ONE,
            base_slippage_pct: Decimal::new(5, 4),
            tick_interval_secs: 60,
            signal_lookback_secs: 300,
            max_concurrency: 4,
            lookup_timeout_ms: 2_000,
            weights: WeightConfig::defaults(),
        }
    }

    #[test]
    fn test_parse_symbols_with_tags() {
        let specs = parse_symbols("BTC/USDT:crypto, AAPL:equities");
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].symbol, "BTC/USDT");
        assert_eq!(specs[0].asset_class, "crypto");
        assert_eq!(specs[1].symbol, "AAPL");
        assert_eq!(specs[1].asset_class, "equities");
    }

    #[test]
    fn test_parse_symbols_defaults_asset_class() {
        let specs = parse_symbols("ETH/USDT");
        assert_eq!(specs[0].asset_class, "crypto");
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_negative_threshold() {
        let mut config = base_config();
        config.confidence_threshold = Decimal::from(-1);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_capital() {
        let mut config = base_config();
        config.initial_capital = Decimal::ZERO;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_empty_symbols() {
        let mut config = base_config();
        config.symbols.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoSymbols)));
    }

    #[test]
    fn test_validate_rejects_bad_weights() {
        let mut config = base_config();
        config.weights =
            WeightConfig::from_json(r#"{"crypto": {"technical": 0.9, "sentiment": 0.9}}"#)
                .expect("valid json");
        assert!(matches!(config.validate(), Err(ConfigError::Weights(_))));
    }
}
