//! Correlation budget check
//!
//! Flags a book whose positions move together: when the dominant eigenvalue
//! of their covariance/correlation matrix explains too much of total
//! variance, nominally different symbols are really one bet.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationCheck {
    pub passes: bool,
    /// Largest eigenvalue over the eigenvalue sum; `None` when not computed
    pub dominant_share: Option<f64>,
    pub n_positions: usize,
}

impl ConcentrationCheck {
    fn open(n_positions: usize) -> Self {
        Self {
            passes: true,
            dominant_share: None,
            n_positions,
        }
    }
}

/// Check a square, symmetric matrix of held positions against
/// `max_dominant_share` (0.30 by default in `SizerConfig`).
///
/// Fails open for fewer than two positions and for degenerate input.
pub fn check_concentration(matrix: &[Vec<f64>], max_dominant_share: f64) -> ConcentrationCheck {
    let n = matrix.len();
    if n < 2 {
        return ConcentrationCheck::open(n);
    }
    if matrix.iter().any(|row| row.len() != n || row.iter().any(|v| !v.is_finite())) {
        warn!(n, "Correlation matrix is not square and finite, skipping budget check");
        return ConcentrationCheck::open(n);
    }

    let m = DMatrix::from_fn(n, n, |i, j| 0.5 * (matrix[i][j] + matrix[j][i]));
    let eigenvalues = m.symmetric_eigenvalues();

    // Numerical noise can push tiny eigenvalues negative
    let total: f64 = eigenvalues.iter().map(|v| v.max(0.0)).sum();
    let dominant = eigenvalues.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !total.is_finite() || total < 1e-12 || !dominant.is_finite() {
        warn!(n, "Degenerate correlation matrix, skipping budget check");
        return ConcentrationCheck::open(n);
    }

    let share = dominant / total;
    debug!(n, share, limit = max_dominant_share, "Correlation budget");

    ConcentrationCheck {
        passes: share <= max_dominant_share,
        dominant_share: Some(share),
        n_positions: n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn identity(n: usize) -> Vec<Vec<f64>> {
        (0..n)
            .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
            .collect()
    }

    fn uniform(n: usize, rho: f64) -> Vec<Vec<f64>> {
        (0..n)
            .map(|i| (0..n).map(|j| if i == j { 1.0 } else { rho }).collect())
            .collect()
    }

    #[test]
    fn test_diversified_book_passes() {
        let check = check_concentration(&identity(5), 0.30);
        assert!(check.passes);
        assert_relative_eq!(check.dominant_share.unwrap(), 0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_correlated_book_flagged() {
        // Dominant eigenvalue 1 + 4 * 0.8 = 4.2 out of 5
        let check = check_concentration(&uniform(5, 0.8), 0.30);
        assert!(!check.passes);
        assert_relative_eq!(check.dominant_share.unwrap(), 0.84, epsilon = 1e-9);
    }

    #[test]
    fn test_fails_open() {
        assert!(check_concentration(&[], 0.30).passes);
        assert!(check_concentration(&identity(1), 0.30).passes);
        assert!(check_concentration(&[vec![0.0, 0.0], vec![0.0, 0.0]], 0.30).passes);
        assert!(check_concentration(&[vec![1.0, 0.5], vec![0.5]], 0.30).passes);
        assert!(check_concentration(&[vec![1.0, f64::NAN], vec![0.2, 1.0]], 0.30).passes);
    }
}
