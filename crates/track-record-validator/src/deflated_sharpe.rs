use serde::{Deserialize, Serialize};
use statrs::function::erf::{erfc, erfc_inv};

/// Euler-Mascheroni constant
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// One-sided significance level for the deflated Sharpe test.
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// Inputs of the Deflated Sharpe Ratio test.
///
/// `observed_sharpe` is the per-observation (non-annualised) Sharpe of the
/// best of `n_trials` strategies, measured on `n_observations` returns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeflatedSharpeInput {
    pub observed_sharpe: f64,
    pub n_trials: usize,
    pub n_observations: usize,
    pub skewness: f64,
    /// Kurtosis, not excess (normal = 3.0)
    pub kurtosis: f64,
}

impl DeflatedSharpeInput {
    /// Input assuming normally distributed returns.
    pub fn normal(observed_sharpe: f64, n_trials: usize, n_observations: usize) -> Self {
        Self {
            observed_sharpe,
            n_trials,
            n_observations,
            skewness: 0.0,
            kurtosis: 3.0,
        }
    }
}

/// Deflated Sharpe Ratio (Bailey & Lopez de Prado, 2014).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeflatedSharpeResult {
    /// z-statistic of the observed Sharpe against the expected null maximum
    pub deflated_sharpe: f64,
    /// One-sided p-value
    pub p_value: f64,
    pub is_significant: bool,
    pub observed_sharpe: f64,
    /// Expected maximum Sharpe under the null, in per-observation units
    pub expected_max_sharpe: f64,
    pub sharpe_std_error: f64,
    pub n_trials: usize,
    pub n_observations: usize,
}

/// Expected maximum of `n_trials` independent standard normal draws:
/// `sqrt(2 ln N) - (ln(pi) + gamma) / (2 sqrt(2 ln N))`.
pub fn expected_max_sharpe(n_trials: usize) -> f64 {
    if n_trials < 2 {
        return 0.0;
    }
    let root = (2.0 * (n_trials as f64).ln()).sqrt();
    root - (std::f64::consts::PI.ln() + EULER_GAMMA) / (2.0 * root)
}

/// Compute the deflated Sharpe ratio.
///
/// With fewer than two trials or fewer than ten observations no correction is
/// applicable: the observed Sharpe is returned as-is with p = 0.5.
pub fn deflated_sharpe_ratio(input: &DeflatedSharpeInput) -> DeflatedSharpeResult {
    let sr = input.observed_sharpe;

    if input.n_trials < 2 || input.n_observations < 10 || !sr.is_finite() {
        return DeflatedSharpeResult {
            deflated_sharpe: sr,
            p_value: 0.5,
            is_significant: false,
            observed_sharpe: sr,
            expected_max_sharpe: 0.0,
            sharpe_std_error: 0.0,
            n_trials: input.n_trials,
            n_observations: input.n_observations,
        };
    }

    let dof = (input.n_observations - 1) as f64;

    // Null Sharpe estimates have variance ~1/(T-1)
    let expected_max = expected_max_sharpe(input.n_trials) / dof.sqrt();

    // Non-normal standard error of the Sharpe estimator
    let numerator =
        1.0 - input.skewness * sr + (input.kurtosis - 1.0) / 4.0 * sr * sr;
    let std_error = (numerator.max(1e-6) / dof).sqrt();

    let z = (sr - expected_max) / std_error;
    let p_value = 1.0 - normal_cdf(z);

    DeflatedSharpeResult {
        deflated_sharpe: z,
        p_value,
        is_significant: p_value < SIGNIFICANCE_LEVEL,
        observed_sharpe: sr,
        expected_max_sharpe: expected_max,
        sharpe_std_error: std_error,
        n_trials: input.n_trials,
        n_observations: input.n_observations,
    }
}

/// Minimum number of trades for a per-trade Sharpe to be distinguishable
/// from zero: `T = ((z_alpha + z_beta) / SR)^2`, one-sided alpha.
///
/// `None` when the Sharpe is not positive; no track record length helps.
pub fn minimum_track_record_length(
    per_trade_sharpe: f64,
    confidence: f64,
    power: f64,
) -> Option<usize> {
    if !per_trade_sharpe.is_finite() || per_trade_sharpe <= 1e-6 {
        return None;
    }
    let z_alpha = inverse_normal_cdf(confidence);
    let z_beta = inverse_normal_cdf(power);
    let t_min = ((z_alpha + z_beta) / per_trade_sharpe).powi(2);
    Some(t_min.ceil() as usize)
}

fn normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

fn inverse_normal_cdf(p: f64) -> f64 {
    -std::f64::consts::SQRT_2 * erfc_inv(2.0 * p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_expected_max_sharpe_grows_with_trials() {
        assert_eq!(expected_max_sharpe(1), 0.0);
        let e10 = expected_max_sharpe(10);
        let e100 = expected_max_sharpe(100);
        let e1000 = expected_max_sharpe(1000);
        assert!(e10 < e100 && e100 < e1000);
        // Known value for N = 100 from the closed-form approximation
        let root = (2.0 * 100.0_f64.ln()).sqrt();
        assert_relative_eq!(
            e100,
            root - (std::f64::consts::PI.ln() + EULER_GAMMA) / (2.0 * root),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_degenerate_cases() {
        for input in [
            DeflatedSharpeInput::normal(0.4, 1, 500),
            DeflatedSharpeInput::normal(0.4, 50, 9),
        ] {
            let dsr = deflated_sharpe_ratio(&input);
            assert_eq!(dsr.deflated_sharpe, 0.4);
            assert_eq!(dsr.p_value, 0.5);
            assert!(!dsr.is_significant);
        }
    }

    #[test]
    fn test_strong_sharpe_survives_deflation() {
        // Per-trade Sharpe 0.4 over 100 trades, 20 algorithms tested
        let dsr = deflated_sharpe_ratio(&DeflatedSharpeInput::normal(0.4, 20, 100));
        assert!(dsr.expected_max_sharpe > 0.0);
        assert!(dsr.deflated_sharpe > 0.0);
        assert!(dsr.is_significant, "p = {}", dsr.p_value);
    }

    #[test]
    fn test_more_trials_deflate_more() {
        let few = deflated_sharpe_ratio(&DeflatedSharpeInput::normal(0.2, 5, 200));
        let many = deflated_sharpe_ratio(&DeflatedSharpeInput::normal(0.2, 500, 200));
        assert!(many.deflated_sharpe < few.deflated_sharpe);
        assert!(many.p_value > few.p_value);
    }

    #[test]
    fn test_fat_tails_widen_standard_error() {
        let normal = deflated_sharpe_ratio(&DeflatedSharpeInput::normal(0.3, 10, 150));
        let fat = deflated_sharpe_ratio(&DeflatedSharpeInput {
            kurtosis: 9.0,
            skewness: -1.0,
            ..DeflatedSharpeInput::normal(0.3, 10, 150)
        });
        assert!(fat.sharpe_std_error > normal.sharpe_std_error);
        assert!(fat.p_value > normal.p_value);
    }

    #[test]
    fn test_minimum_track_record_length() {
        // ((1.645 + 0.842) / 0.25)^2 ~= 99
        let n = minimum_track_record_length(0.25, 0.95, 0.80).unwrap();
        assert!((95..=102).contains(&n), "n = {}", n);
        let half = minimum_track_record_length(0.125, 0.95, 0.80).unwrap();
        assert!(half > n * 3);
        assert!(minimum_track_record_length(-0.1, 0.95, 0.80).is_none());
    }
}
