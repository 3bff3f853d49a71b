use rust_decimal::Decimal;

/// Position sizing parameters.
#[derive(Debug, Clone)]
pub struct SizingConfig {
    /// Base fraction of portfolio value per position (default 20%).
    pub max_position_size_pct: Decimal,
    /// Confidence at which the size scale is exactly 1.0 (default 0.8).
    pub reference_confidence: Decimal,
    /// Clamp bounds for the confidence scale.
    pub min_confidence_scale: Decimal,
    pub max_confidence_scale: Decimal,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            max_position_size_pct: Decimal::new(20, 2),  // 0.20
            reference_confidence: Decimal::new(8, 1),    // 0.8
            min_confidence_scale: Decimal::new(5, 1),    // 0.5
            max_confidence_scale: Decimal::new(15, 1),   // 1.5
        }
    }
}

/// `confidence / reference_confidence`, clamped.
pub fn confidence_scale(confidence: Decimal, config: &SizingConfig) -> Decimal {
    if config.reference_confidence.is_zero() {
        return Decimal::ONE;
    }
    (confidence / config.reference_confidence)
        .clamp(config.min_confidence_scale, config.max_confidence_scale)
}

/// `1 - risk * 0.5`: risk 0 keeps full size, risk 1 halves it.
pub fn risk_scale(risk_score: Decimal) -> Decimal {
    Decimal::ONE - risk_score * Decimal::new(5, 1)
}

/// Dollar value the order should target.
pub fn target_position_value(
    portfolio_value: Decimal,
    confidence: Decimal,
    risk_score: Decimal,
    config: &SizingConfig,
) -> Decimal {
    portfolio_value
        * config.max_position_size_pct
        * confidence_scale(confidence, config)
        * risk_scale(risk_score)
}

/// Quantity to order at `reference_price`. Zero when the inputs cannot
/// produce a sensible size.
pub fn position_quantity(
    portfolio_value: Decimal,
    reference_price: Decimal,
    confidence: Decimal,
    risk_score: Decimal,
    config: &SizingConfig,
) -> Decimal {
    if reference_price <= Decimal::ZERO || portfolio_value <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let target = target_position_value(portfolio_value, confidence, risk_score, config);
    (target / reference_price).max(Decimal::ZERO)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
