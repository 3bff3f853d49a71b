use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{AgentSignal, ContributingAgent, Decision, Direction};

use super::weights::WeightConfig;

/// Score above which the fused decision turns BUY.
fn buy_threshold() -> Decimal {
    Decimal::from(50)
}

/// Score below which the fused decision turns SELL.
fn sell_threshold() -> Decimal {
    Decimal::from(-50)
}

/// Risk estimate used when no upstream risk analysis contributed.
fn neutral_risk() -> Decimal {
    Decimal::new(5, 1) // 0.5
}

/// Fuse the most recent qualifying signal per agent into one decision.
///
/// Pure and deterministic given its inputs. Missing or expired input data is
/// not an error: zero qualifying agents resolve to a HOLD decision with zero
/// score and zero confidence.
///
/// Each present agent's raw weight is its asset-class table weight (1.0 when
/// the table has no entry) times the signal's own weight; raw weights are
/// then renormalized to sum 1, which redistributes the weight of absent
/// agents proportionally among those present.
pub fn evaluate(
    symbol: &str,
    asset_class: &str,
    signals: &[AgentSignal],
    weights: &WeightConfig,
    lookback: Duration,
    reference_price: Option<Decimal>,
    now: DateTime<Utc>,
) -> Decision {
    let cutoff = now - lookback;

    // Most recent signal per distinct agent inside the lookback window.
    let mut latest: HashMap<&str, &AgentSignal> = HashMap::new();
    for signal in signals {
        if signal.symbol != symbol || signal.timestamp < cutoff || signal.timestamp > now {
            continue;
        }
        let newer = match latest.get(signal.agent_name.as_str()) {
            Some(existing) => signal.timestamp > existing.timestamp,
            None => true,
        };
        if newer {
            latest.insert(signal.agent_name.as_str(), signal);
        }
    }

    if latest.is_empty() {
        return hold_decision(
            symbol,
            asset_class,
            reference_price,
            now,
            "no qualifying signals within lookback window",
        );
    }

    // Raw weight = table weight (default 1.0) x per-signal weight.
    let mut weighted: Vec<(&AgentSignal, Decimal)> = latest
        .values()
        .map(|signal| {
            let table_weight = weights
                .agent_weight(asset_class, &signal.agent_name)
                .unwrap_or(Decimal::ONE);
            (*signal, table_weight * signal.weight)
        })
        .collect();

    let total_weight: Decimal = weighted.iter().map(|(_, w)| *w).sum();
    if total_weight <= Decimal::ZERO {
        return hold_decision(
            symbol,
            asset_class,
            reference_price,
            now,
            "contributing signals carry zero total weight",
        );
    }

    // Renormalize so present agents absorb absent agents' share.
    for (_, weight) in weighted.iter_mut() {
        *weight /= total_weight;
    }

    // Deterministic ordering: heaviest first, name as tie-break.
    weighted.sort_by(|(a, wa), (b, wb)| {
        wb.cmp(wa).then_with(|| a.agent_name.cmp(&b.agent_name))
    });

    let mut score = Decimal::ZERO;
    let mut confidence = Decimal::ZERO;
    for (signal, weight) in &weighted {
        score += Decimal::from(signal.strength) * *weight;
        confidence += signal.confidence * *weight;
    }
    let score = score.clamp(Decimal::from(-100), Decimal::from(100));
    let confidence = confidence.clamp(Decimal::ZERO, Decimal::ONE);

    let direction = if score > buy_threshold() {
        Direction::Buy
    } else if score < sell_threshold() {
        Direction::Sell
    } else {
        Direction::Hold
    };

    let contributing: Vec<ContributingAgent> = weighted
        .iter()
        .map(|(signal, weight)| ContributingAgent {
            agent_name: signal.agent_name.clone(),
            weight_fraction: *weight,
            strength: signal.strength,
            direction: signal.direction,
        })
        .collect();

    let reasoning = weighted
        .iter()
        .map(|(signal, weight)| {
            format!(
                "{} ({}%, strength {}, {}): {}",
                signal.agent_name,
                (*weight * Decimal::ONE_HUNDRED).round_dp(1),
                signal.strength,
                signal.direction,
                signal.reasoning,
            )
        })
        .collect::<Vec<_>>()
        .join(" | ");

    Decision {
        id: Uuid::new_v4(),
        symbol: symbol.to_string(),
        asset_class: asset_class.to_string(),
        direction,
        score,
        confidence,
        risk_score: neutral_risk(),
        contributing,
        reasoning,
        reference_price,
        timestamp: now,
    }
}

/// The defined, never-error terminal case for missing input data.
fn hold_decision(
    symbol: &str,
    asset_class: &str,
    reference_price: Option<Decimal>,
    now: DateTime<Utc>,
    reason: &str,
) -> Decision {
    Decision {
        id: Uuid::new_v4(),
        symbol: symbol.to_string(),
        asset_class: asset_class.to_string(),
        direction: Direction::Hold,
        score: Decimal::ZERO,
        confidence: Decimal::ZERO,
        risk_score: neutral_risk(),
        contributing: Vec::new(),
        reasoning: reason.to_string(),
        reference_price,
        timestamp: now,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_signal(
        agent: &str,
        direction: Direction,
        strength: i32,
        confidence: Decimal,
        age_secs: i64,
        now: DateTime<Utc>,
    ) -> AgentSignal {
        AgentSignal {
            symbol: "BTC/USDT".into(),
            agent_name: agent.into(),
            direction,
            strength,
            confidence,
            weight: Decimal::ONE,
            reasoning: format!("{agent} view"),
            timestamp: now - Duration::seconds(age_secs),
        }
    }

    fn lookback() -> Duration {
        Duration::seconds(300)
    }

    #[test]
    fn test_crypto_weighted_fusion() {
        // technical: strength -10, conf 0.50, table weight 0.4
        // sentiment: strength 72, conf 0.75, table weight 0.6
        let now = Utc::now();
        let signals = vec![
            make_signal("technical", Direction::Sell, -10, Decimal::new(50, 2), 60, now),
            make_signal("sentiment", Direction::Buy, 72, Decimal::new(75, 2), 30, now),
        ];

        let decision = evaluate(
            "BTC/USDT",
            "crypto",
            &signals,
            &WeightConfig::defaults(),
            lookback(),
            Some(Decimal::from(50_000)),
            now,
        );

        // score = -10*0.4 + 72*0.6 = 39.2 — inside the HOLD band
        assert_eq!(decision.score, Decimal::new(392, 1));
        // confidence = 0.50*0.4 + 0.75*0.6 = 0.65
        assert_eq!(decision.confidence, Decimal::new(65, 2));
        assert_eq!(decision.direction, Direction::Hold);
        assert_eq!(decision.contributing.len(), 2);
    }

    #[test]
    fn test_zero_signals_is_hold_with_zero_confidence() {
        let now = Utc::now();
        let decision = evaluate(
            "BTC/USDT",
            "crypto",
            &[],
            &WeightConfig::defaults(),
            lookback(),
            None,
            now,
        );

        assert_eq!(decision.direction, Direction::Hold);
        assert_eq!(decision.score, Decimal::ZERO);
        assert_eq!(decision.confidence, Decimal::ZERO);
        assert!(decision.contributing.is_empty());
    }

    #[test]
    fn test_single_agent_gets_full_weight() {
        let now = Utc::now();
        let signals = vec![make_signal(
            "technical",
            Direction::Buy,
            80,
            Decimal::new(9, 1),
            10,
            now,
        )];

        let decision = evaluate(
            "BTC/USDT",
            "crypto",
            &signals,
            &WeightConfig::defaults(),
            lookback(),
            Some(Decimal::from(50_000)),
            now,
        );

        // Renormalization gives the lone agent 100% regardless of its 0.4 table share.
        assert_eq!(decision.score, Decimal::from(80));
        assert_eq!(decision.confidence, Decimal::new(9, 1));
        assert_eq!(decision.direction, Direction::Buy);
        assert_eq!(decision.contributing[0].weight_fraction, Decimal::ONE);
    }

    #[test]
    fn test_expired_signals_are_ignored() {
        let now = Utc::now();
        let signals = vec![make_signal(
            "technical",
            Direction::Buy,
            90,
            Decimal::ONE,
            600, // outside the 300s window
            now,
        )];

        let decision = evaluate(
            "BTC/USDT",
            "crypto",
            &signals,
            &WeightConfig::defaults(),
            lookback(),
            None,
            now,
        );

        assert_eq!(decision.direction, Direction::Hold);
        assert_eq!(decision.confidence, Decimal::ZERO);
    }

    #[test]
    fn test_most_recent_signal_per_agent_wins() {
        let now = Utc::now();
        let signals = vec![
            make_signal("technical", Direction::Sell, -90, Decimal::ONE, 200, now),
            make_signal("technical", Direction::Buy, 90, Decimal::ONE, 10, now),
        ];

        let decision = evaluate(
            "BTC/USDT",
            "crypto",
            &signals,
            &WeightConfig::defaults(),
            lookback(),
            None,
            now,
        );

        assert_eq!(decision.score, Decimal::from(90));
        assert_eq!(decision.direction, Direction::Buy);
    }

    #[test]
    fn test_sell_direction_below_threshold() {
        let now = Utc::now();
        let signals = vec![
            make_signal("technical", Direction::Sell, -80, Decimal::new(8, 1), 10, now),
            make_signal("sentiment", Direction::Sell, -60, Decimal::new(7, 1), 10, now),
        ];

        let decision = evaluate(
            "BTC/USDT",
            "crypto",
            &signals,
            &WeightConfig::defaults(),
            lookback(),
            Some(Decimal::from(50_000)),
            now,
        );

        // -80*0.4 + -60*0.6 = -68
        assert_eq!(decision.score, Decimal::from(-68));
        assert_eq!(decision.direction, Direction::Sell);
    }

    #[test]
    fn test_unknown_asset_class_falls_back_to_signal_weights() {
        let now = Utc::now();
        let mut heavy = make_signal("alpha", Direction::Buy, 100, Decimal::ONE, 10, now);
        heavy.weight = Decimal::from(3);
        let light = make_signal("beta", Direction::Sell, -100, Decimal::ONE, 10, now);

        let decision = evaluate(
            "BTC/USDT",
            "commodities",
            &[heavy, light],
            &WeightConfig::defaults(),
            lookback(),
            None,
            now,
        );

        // 100*(3/4) + -100*(1/4) = 50 — exactly at the threshold stays HOLD
        assert_eq!(decision.score, Decimal::from(50));
        assert_eq!(decision.direction, Direction::Hold);
    }

    #[test]
    fn test_reasoning_orders_heaviest_agent_first() {
        let now = Utc::now();
        let signals = vec![
            make_signal("technical", Direction::Buy, 10, Decimal::new(5, 1), 10, now),
            make_signal("sentiment", Direction::Buy, 20, Decimal::new(5, 1), 10, now),
        ];

        let decision = evaluate(
            "BTC/USDT",
            "crypto",
            &signals,
            &WeightConfig::defaults(),
            lookback(),
            None,
            now,
        );

        assert!(decision.reasoning.starts_with("sentiment (60.0%"));
        assert!(decision.reasoning.contains("technical (40.0%"));
        assert_eq!(decision.contributing[0].agent_name, "sentiment");
    }
}
