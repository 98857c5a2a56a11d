//! Pure statistics over per-trade return series.
//! Stateless functions, no allocation beyond what the result needs.

/// Trading periods per year used for annualisation.
pub const PERIODS_PER_YEAR: f64 = 252.0;

/// Annualised Sharpe reported for zero-variance series with a non-zero mean.
pub const SHARPE_BOUND: f64 = 10.0;

const VARIANCE_EPSILON: f64 = 1e-12;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1). Zero for fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Per-observation Sharpe (mean / sample std), `None` when undefined.
pub fn per_trade_sharpe(returns: &[f64]) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let std = sample_std(returns);
    if std < VARIANCE_EPSILON {
        return None;
    }
    Some(mean(returns) / std)
}

/// Sharpe annualised by sqrt(252).
///
/// Zero-variance series map to `±SHARPE_BOUND` following the sign of the
/// mean (0.0 for a flat zero series) instead of dividing by zero.
pub fn annualized_sharpe(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    match per_trade_sharpe(returns) {
        Some(sr) => sr * PERIODS_PER_YEAR.sqrt(),
        None => {
            let m = mean(returns);
            if returns.len() < 2 || m.abs() < VARIANCE_EPSILON {
                0.0
            } else {
                SHARPE_BOUND.copysign(m)
            }
        }
    }
}

/// Fraction of strictly positive values.
pub fn win_rate(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    returns.iter().filter(|&&r| r > 0.0).count() as f64 / returns.len() as f64
}

/// Max peak-to-trough drawdown of the compounded equity curve built from
/// fractional returns, as a positive fraction (0.15 = 15%).
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut equity = 1.0_f64;
    let mut peak = 1.0_f64;
    let mut max_dd = 0.0_f64;
    for &r in returns {
        equity *= 1.0 + r;
        if equity > peak {
            peak = equity;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - equity) / peak);
        }
    }
    max_dd
}

/// Sample skewness (biased moment estimator). Zero when undefined.
pub fn skewness(values: &[f64]) -> f64 {
    let (m2, m3, _) = central_moments(values);
    if m2 < VARIANCE_EPSILON {
        return 0.0;
    }
    m3 / m2.powf(1.5)
}

/// Sample kurtosis, not excess (normal = 3.0). Returns 3.0 when undefined.
pub fn kurtosis(values: &[f64]) -> f64 {
    let (m2, _, m4) = central_moments(values);
    if m2 < VARIANCE_EPSILON {
        return 3.0;
    }
    m4 / (m2 * m2)
}

fn central_moments(values: &[f64]) -> (f64, f64, f64) {
    if values.len() < 3 {
        return (0.0, 0.0, 0.0);
    }
    let n = values.len() as f64;
    let m = mean(values);
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for v in values {
        let d = v - m;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    (m2 / n, m3 / n, m4 / n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sharpe_annualisation() {
        let returns = [0.01, -0.005, 0.02, 0.0, 0.015];
        let sr = per_trade_sharpe(&returns).unwrap();
        assert_relative_eq!(annualized_sharpe(&returns), sr * 252.0_f64.sqrt());
    }

    #[test]
    fn test_degenerate_sharpe_is_bounded() {
        assert_eq!(annualized_sharpe(&[0.01, 0.01, 0.01]), SHARPE_BOUND);
        assert_eq!(annualized_sharpe(&[-0.01, -0.01]), -SHARPE_BOUND);
        assert_eq!(annualized_sharpe(&[0.0, 0.0]), 0.0);
        assert_eq!(annualized_sharpe(&[]), 0.0);
        assert!(per_trade_sharpe(&[0.5]).is_none());
    }

    #[test]
    fn test_max_drawdown() {
        // 1.0 -> 1.1 -> 0.88 -> 0.968
        let dd = max_drawdown(&[0.10, -0.20, 0.10]);
        assert_relative_eq!(dd, 0.2, epsilon = 1e-12);
        assert_eq!(max_drawdown(&[0.01, 0.02]), 0.0);
    }

    #[test]
    fn test_win_rate() {
        assert_relative_eq!(win_rate(&[0.1, -0.1, 0.0, 0.2]), 0.5);
        assert_eq!(win_rate(&[]), 0.0);
    }

    #[test]
    fn test_moments_of_symmetric_series() {
        let values = [-2.0, -1.0, 0.0, 1.0, 2.0];
        assert_relative_eq!(skewness(&values), 0.0, epsilon = 1e-12);
        // m2 = 2, m4 = 6.8 -> 1.7
        assert_relative_eq!(kurtosis(&values), 1.7, epsilon = 1e-12);
        assert_eq!(kurtosis(&[1.0, 1.0, 1.0]), 3.0);
    }
}
