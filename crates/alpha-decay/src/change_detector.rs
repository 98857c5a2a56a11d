//! Change Detection Engines
//!
//! Finds indices where the distribution of a PnL series shifts. Two
//! interchangeable engines sit behind [`ChangePointEngine`]: an exact
//! penalized search (PELT with an RBF kernel cost) and a CUSUM approximation.

use analysis_core::{stats, AnalysisError, AnalysisResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which engine produced a segmentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Pelt,
    Cusum,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Pelt => "pelt",
            EngineKind::Cusum => "cusum",
        }
    }
}

impl std::str::FromStr for EngineKind {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pelt" | "exact" => Ok(EngineKind::Pelt),
            "cusum" => Ok(EngineKind::Cusum),
            other => Err(AnalysisError::InvalidData(format!(
                "unknown change-point engine '{}'",
                other
            ))),
        }
    }
}

/// Change-point search capability.
///
/// Returns sorted change-point indices; each index is the first element of
/// a new segment, so segments are `[0, cp_0), [cp_0, cp_1), ..., [cp_k, n)`
/// and every segment holds at least `min_size` points.
pub trait ChangePointEngine: Send + Sync {
    fn kind(&self) -> EngineKind;

    fn segment(&self, series: &[f64], min_size: usize, penalty: f64) -> AnalysisResult<Vec<usize>>;
}

/// Exact penalized segmentation (Killick et al. PELT) with an RBF kernel
/// cost, which tolerates non-Gaussian PnL distributions.
#[derive(Debug, Clone)]
pub struct PeltEngine {
    /// Longest series handled; the kernel prefix table is quadratic in memory
    max_len: usize,
    /// Kernel bandwidth; median heuristic when `None`
    gamma: Option<f64>,
}

impl Default for PeltEngine {
    fn default() -> Self {
        Self::new(1_500)
    }
}

impl PeltEngine {
    pub fn new(max_len: usize) -> Self {
        Self { max_len, gamma: None }
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = Some(gamma);
        self
    }
}

impl ChangePointEngine for PeltEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Pelt
    }

    fn segment(&self, series: &[f64], min_size: usize, penalty: f64) -> AnalysisResult<Vec<usize>> {
        let n = series.len();
        if n > self.max_len {
            return Err(AnalysisError::EngineUnavailable(format!(
                "PELT limited to {} points, series has {}",
                self.max_len, n
            )));
        }
        let min_size = min_size.max(1);
        if n < 2 * min_size {
            return Ok(Vec::new());
        }

        let gamma = self.gamma.unwrap_or_else(|| median_heuristic_gamma(series));
        let cost = RbfCost::new(series, gamma);

        let mut best = vec![f64::INFINITY; n + 1];
        let mut last = vec![0usize; n + 1];
        best[0] = -penalty;
        let mut candidates: Vec<usize> = vec![0];

        for t in min_size..=n {
            for &s in &candidates {
                if t - s < min_size {
                    continue;
                }
                let value = best[s] + cost.cost(s, t) + penalty;
                if value < best[t] {
                    best[t] = value;
                    last[t] = s;
                }
            }

            // Pruning: s can never be optimal again once F(s) + C(s, t) > F(t)
            let f_t = best[t];
            candidates.retain(|&s| t - s < min_size || best[s] + cost.cost(s, t) <= f_t);
            if t + min_size <= n {
                candidates.push(t);
            }
        }

        let mut change_points = Vec::new();
        let mut t = n;
        while t > 0 {
            let s = last[t];
            if s > 0 {
                change_points.push(s);
            }
            t = s;
        }
        change_points.reverse();

        debug!(n, gamma, found = change_points.len(), "PELT segmentation");
        Ok(change_points)
    }
}

/// Median heuristic: gamma = 1 / median of pairwise squared distances.
fn median_heuristic_gamma(series: &[f64]) -> f64 {
    let mut sq: Vec<f64> = Vec::with_capacity(series.len() * series.len().saturating_sub(1) / 2);
    for i in 0..series.len() {
        for j in (i + 1)..series.len() {
            sq.push((series[i] - series[j]).powi(2));
        }
    }
    if sq.is_empty() {
        return 1.0;
    }
    let mid = sq.len() / 2;
    let (_, median, _) = sq.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    if *median > 1e-18 {
        1.0 / *median
    } else {
        1.0
    }
}

/// Kernel cost `c(a, b) = (b - a) - sum_{i,j in [a,b)} k(x_i, x_j) / (b - a)`
/// backed by a 2-D prefix table of the Gram matrix.
struct RbfCost {
    stride: usize,
    prefix: Vec<f64>,
}

impl RbfCost {
    fn new(series: &[f64], gamma: f64) -> Self {
        let n = series.len();
        let stride = n + 1;
        let mut prefix = vec![0.0; stride * stride];
        for i in 0..n {
            for j in 0..n {
                let k = (-gamma * (series[i] - series[j]).powi(2)).exp();
                prefix[(i + 1) * stride + j + 1] = k + prefix[i * stride + j + 1]
                    + prefix[(i + 1) * stride + j]
                    - prefix[i * stride + j];
            }
        }
        Self { stride, prefix }
    }

    fn at(&self, i: usize, j: usize) -> f64 {
        self.prefix[i * self.stride + j]
    }

    fn cost(&self, a: usize, b: usize) -> f64 {
        let len = (b - a) as f64;
        let block = self.at(b, b) - self.at(a, b) - self.at(b, a) + self.at(a, a);
        len - block / len
    }
}

/// CUSUM approximation.
///
/// Accumulates positive and negative deviations of the standardized series
/// from a reference mean; whenever either sum crosses `threshold` a change
/// point is declared, both accumulators reset and the reference moves to the
/// mean of the observations that follow.
#[derive(Debug, Clone)]
pub struct CusumEngine {
    /// Decision threshold (h), in standard deviations
    threshold: f64,
    /// Allowable slack per observation (k)
    slack: f64,
}

impl Default for CusumEngine {
    fn default() -> Self {
        Self::new(5.0, 0.5)
    }
}

impl CusumEngine {
    pub fn new(threshold: f64, slack: f64) -> Self {
        Self { threshold, slack }
    }
}

impl ChangePointEngine for CusumEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Cusum
    }

    /// `penalty` is unused; sensitivity comes from `threshold`.
    fn segment(
        &self,
        series: &[f64],
        min_size: usize,
        _penalty: f64,
    ) -> AnalysisResult<Vec<usize>> {
        let n = series.len();
        let min_size = min_size.max(1);
        if n < 2 * min_size {
            return Ok(Vec::new());
        }

        let std = stats::sample_std(series);
        if std < 1e-12 {
            return Ok(Vec::new());
        }

        let mut mean = stats::mean(series);

        let mut upper = 0.0_f64;
        let mut lower = 0.0_f64;
        let mut segment_start = 0usize;
        let mut change_points = Vec::new();

        for (i, x) in series.iter().enumerate() {
            let z = (x - mean) / std;
            upper = (upper + z - self.slack).max(0.0);
            lower = (lower - z - self.slack).max(0.0);

            let boundary = i + 1;
            if (upper > self.threshold || lower > self.threshold)
                && boundary - segment_start >= min_size
                && boundary < n
            {
                change_points.push(boundary);
                segment_start = boundary;
                upper = 0.0;
                lower = 0.0;
                mean = stats::mean(&series[boundary..]);
            }
        }

        // Fold a short trailing segment into its predecessor
        if let Some(&last) = change_points.last() {
            if n - last < min_size {
                change_points.pop();
            }
        }

        debug!(n, threshold = self.threshold, found = change_points.len(), "CUSUM segmentation");
        Ok(change_points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Alternating two-point pattern with the given mean and half-spread
    fn regime(n: usize, mean: f64, spread: f64) -> Vec<f64> {
        (0..n)
            .map(|i| if i % 2 == 0 { mean + spread } else { mean - spread })
            .collect()
    }

    fn broken_series() -> Vec<f64> {
        let mut values = regime(30, 0.01, 0.01);
        values.extend(regime(30, -0.02, 0.015));
        values
    }

    fn assert_valid(cps: &[usize], n: usize, min_size: usize) {
        let mut prev = 0;
        for &cp in cps {
            assert!(cp - prev >= min_size, "segment [{}, {}) too short", prev, cp);
            prev = cp;
        }
        assert!(n - prev >= min_size);
    }

    #[test]
    fn test_pelt_finds_mean_shift() {
        let series = broken_series();
        let cps = PeltEngine::default().segment(&series, 8, 1.5).unwrap();
        assert_eq!(cps, vec![30]);
    }

    #[test]
    fn test_pelt_stable_series_has_no_change() {
        let series = regime(80, 0.005, 0.01);
        let cps = PeltEngine::default().segment(&series, 8, 1.5).unwrap();
        assert!(cps.is_empty(), "{:?}", cps);
    }

    #[test]
    fn test_pelt_higher_penalty_is_more_conservative() {
        let mut series = regime(20, 0.01, 0.004);
        series.extend(regime(20, 0.0, 0.004));
        series.extend(regime(20, -0.01, 0.004));

        let loose = PeltEngine::default().segment(&series, 8, 0.5).unwrap();
        let strict = PeltEngine::default().segment(&series, 8, 50.0).unwrap();
        assert!(strict.len() <= loose.len());
        assert_valid(&loose, series.len(), 8);
        assert_valid(&strict, series.len(), 8);
    }

    #[test]
    fn test_pelt_rejects_oversized_series() {
        let series = vec![0.0; 50];
        let err = PeltEngine::new(40).segment(&series, 8, 1.5).unwrap_err();
        assert!(matches!(err, AnalysisError::EngineUnavailable(_)));
    }

    #[test]
    fn test_cusum_detects_shift_and_respects_min_size() {
        let series = broken_series();
        let cps = CusumEngine::default().segment(&series, 8, 1.5).unwrap();
        assert!(!cps.is_empty());
        assert_valid(&cps, series.len(), 8);
        // The regime boundary is bracketed by a change point within one segment
        assert!(cps.iter().any(|&cp| (30..=38).contains(&cp) || (22..=30).contains(&cp)));
    }

    /// Uniform noise around +0.5% from a 64-bit LCG
    fn stationary_noise(n: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                let u = (state >> 11) as f64 / (1u64 << 53) as f64;
                0.005 + 0.02 * (u - 0.5)
            })
            .collect()
    }

    #[test]
    fn test_cusum_stationary_noise_not_fragmented() {
        for seed in [1, 5, 8, 9] {
            let series = stationary_noise(200, seed);
            let cps = CusumEngine::default().segment(&series, 8, 1.5).unwrap();
            assert!(cps.len() <= 1, "seed {}: {:?}", seed, cps);
        }
    }

    #[test]
    fn test_cusum_zero_slack_is_more_sensitive() {
        let series = stationary_noise(200, 1);
        let loose = CusumEngine::new(2.0, 0.0).segment(&series, 8, 1.5).unwrap();
        let default = CusumEngine::default().segment(&series, 8, 1.5).unwrap();
        assert!(loose.len() > default.len());
        assert_valid(&loose, series.len(), 8);
    }

    #[test]
    fn test_cusum_flat_series() {
        let series = vec![0.01; 40];
        assert!(CusumEngine::default().segment(&series, 8, 1.5).unwrap().is_empty());
    }

    #[test]
    fn test_short_series_not_segmented() {
        let series = regime(15, 0.0, 0.01);
        assert!(PeltEngine::default().segment(&series, 8, 1.5).unwrap().is_empty());
        assert!(CusumEngine::default().segment(&series, 8, 1.5).unwrap().is_empty());
    }

    #[test]
    fn test_engine_kind_parsing() {
        assert_eq!("PELT".parse::<EngineKind>().unwrap(), EngineKind::Pelt);
        assert_eq!("cusum".parse::<EngineKind>().unwrap(), EngineKind::Cusum);
        assert!("binseg".parse::<EngineKind>().is_err());
    }
}
