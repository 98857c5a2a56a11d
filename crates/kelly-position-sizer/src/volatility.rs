//! EWMA volatility scaling (RiskMetrics)

use analysis_core::stats::PERIODS_PER_YEAR;

/// Exponentially weighted volatility of per-trade returns (fractions).
///
/// `var_t = lambda * var_{t-1} + (1 - lambda) * r_t^2`, seeded with the first
/// observation's squared return. `None` for an empty or non-finite series.
pub fn ewma_volatility(returns: &[f64], lambda: f64) -> Option<f64> {
    let (first, rest) = returns.split_first()?;
    let mut variance = first * first;
    for r in rest {
        variance = lambda * variance + (1.0 - lambda) * r * r;
    }
    let vol = variance.sqrt();
    vol.is_finite().then_some(vol)
}

/// Annualise a per-trade volatility.
pub fn annualize(vol: f64) -> f64 {
    vol * PERIODS_PER_YEAR.sqrt()
}

/// `target_vol / annualised_vol`, clamped to `[min, max]`.
///
/// Returns the neutral 1.0 when there is no usable volatility estimate.
pub fn vol_scalar(returns: &[f64], lambda: f64, target_vol: f64, min: f64, max: f64) -> f64 {
    match ewma_volatility(returns, lambda).map(annualize) {
        Some(vol) if vol > 1e-12 => (target_vol / vol).clamp(min, max),
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_flat_volatility_is_preserved() {
        let returns: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { 0.02 } else { -0.02 }).collect();
        assert_relative_eq!(ewma_volatility(&returns, 0.94).unwrap(), 0.02, epsilon = 1e-12);
    }

    #[test]
    fn test_recent_shock_dominates() {
        let mut returns = vec![0.01; 30];
        returns.push(0.08);
        let vol = ewma_volatility(&returns, 0.94).unwrap();
        // sqrt(0.94 * 0.0001 + 0.06 * 0.0064)
        assert_relative_eq!(vol, (0.94f64 * 0.0001 + 0.06 * 0.0064).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_scalar_bounds() {
        let calm = vec![0.0001; 20];
        let wild = vec![0.5; 20];
        assert_eq!(vol_scalar(&calm, 0.94, 0.15, 0.1, 3.0), 3.0);
        assert_eq!(vol_scalar(&wild, 0.94, 0.15, 0.1, 3.0), 0.1);
    }

    #[test]
    fn test_no_estimate_is_neutral() {
        assert_eq!(vol_scalar(&[], 0.94, 0.15, 0.1, 3.0), 1.0);
        assert_eq!(vol_scalar(&[0.0, 0.0], 0.94, 0.15, 0.1, 3.0), 1.0);
    }
}
