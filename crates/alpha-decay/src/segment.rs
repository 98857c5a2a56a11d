use analysis_core::stats;
use serde::{Deserialize, Serialize};

/// Statistics of one regime between two change points.
///
/// `end_index` is exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecaySegment {
    pub start_index: usize,
    pub end_index: usize,
    pub mean_return: f64,
    pub std_return: f64,
    /// Annualised by sqrt(252)
    pub sharpe: f64,
    pub win_rate: f64,
    pub n_trades: usize,
    pub total_pnl: f64,
}

impl DecaySegment {
    /// Placeholder for an empty range.
    pub fn empty(start_index: usize) -> Self {
        Self {
            start_index,
            end_index: start_index,
            mean_return: 0.0,
            std_return: 0.0,
            sharpe: 0.0,
            win_rate: 0.0,
            n_trades: 0,
            total_pnl: 0.0,
        }
    }

    pub fn from_range(series: &[f64], start_index: usize, end_index: usize) -> Self {
        let end_index = end_index.min(series.len());
        if start_index >= end_index {
            return Self::empty(start_index);
        }
        let values = &series[start_index..end_index];
        Self {
            start_index,
            end_index,
            mean_return: stats::mean(values),
            std_return: stats::sample_std(values),
            sharpe: stats::annualized_sharpe(values),
            win_rate: stats::win_rate(values),
            n_trades: values.len(),
            total_pnl: values.iter().sum(),
        }
    }
}

/// Partition `series` at `change_points` (each the first index of a new
/// segment). Always yields at least one segment.
pub fn segments_from_change_points(series: &[f64], change_points: &[usize]) -> Vec<DecaySegment> {
    let mut bounds = Vec::with_capacity(change_points.len() + 2);
    bounds.push(0);
    bounds.extend(
        change_points
            .iter()
            .copied()
            .filter(|&cp| cp > 0 && cp < series.len()),
    );
    bounds.push(series.len());
    bounds.dedup();

    if bounds.len() < 2 {
        return vec![DecaySegment::empty(0)];
    }

    bounds
        .windows(2)
        .map(|w| DecaySegment::from_range(series, w[0], w[1]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_segment_statistics() {
        let series = [0.02, -0.01, 0.03, 0.0];
        let seg = DecaySegment::from_range(&series, 0, 4);
        assert_eq!(seg.n_trades, 4);
        assert_relative_eq!(seg.mean_return, 0.01, epsilon = 1e-12);
        assert_relative_eq!(seg.total_pnl, 0.04, epsilon = 1e-12);
        assert_relative_eq!(seg.win_rate, 0.5);
        assert!(seg.sharpe > 0.0);
    }

    #[test]
    fn test_partition_covers_series() {
        let series: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let segs = segments_from_change_points(&series, &[5, 12]);
        assert_eq!(segs.len(), 3);
        assert_eq!((segs[0].start_index, segs[0].end_index), (0, 5));
        assert_eq!((segs[2].start_index, segs[2].end_index), (12, 20));
        assert_eq!(segs.iter().map(|s| s.n_trades).sum::<usize>(), 20);
    }

    #[test]
    fn test_empty_series_yields_placeholder() {
        let segs = segments_from_change_points(&[], &[]);
        assert_eq!(segs, vec![DecaySegment::empty(0)]);
    }
}
