use std::ops::Range;

use analysis_core::stats;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Trades per fold below which the number of splits is reduced.
const MIN_TRADES_PER_BLOCK: usize = 15;

/// Index ranges of one purged walk-forward fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldSplit {
    /// Purged training range (always starts at 0)
    pub train: Range<usize>,
    pub test: Range<usize>,
    /// Trades removed from the end of the training set
    pub purged: usize,
}

impl FoldSplit {
    pub fn original_train_len(&self) -> usize {
        self.train.len() + self.purged
    }
}

/// In-sample vs out-of-sample statistics for one fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldResult {
    pub fold: usize,
    pub train_size: usize,
    pub test_size: usize,
    pub purged: usize,
    pub in_sample_sharpe: f64,
    pub oos_sharpe: f64,
    pub in_sample_win_rate: f64,
    pub oos_win_rate: f64,
    pub oos_mean_return: f64,
    pub oos_max_drawdown: f64,
    pub overfit_ratio: f64,
}

/// Number of trades purged from a training set of `train_len`.
pub fn purge_count(train_len: usize, embargo_pct: f64) -> usize {
    let embargo = (train_len as f64 * embargo_pct.max(0.0)).floor() as usize;
    embargo.max(1).min(train_len)
}

/// Splits actually used for `n` trades: the requested count, reduced so
/// each block holds at least `MIN_TRADES_PER_BLOCK` trades, never below 2.
pub fn effective_splits(n: usize, requested: usize) -> usize {
    requested.min(n / MIN_TRADES_PER_BLOCK).max(2)
}

/// Purged walk-forward splits (Lopez de Prado).
///
/// The sequence is cut into `n_splits + 1` equal blocks. Fold `k` trains on
/// everything before block `k` minus the purged tail and tests on block `k`.
/// The last fold's test block absorbs the division remainder.
pub fn purged_walk_forward_splits(n: usize, n_splits: usize, embargo_pct: f64) -> Vec<FoldSplit> {
    if n_splits == 0 {
        return Vec::new();
    }
    let block = n / (n_splits + 1);
    if block == 0 {
        return Vec::new();
    }

    (1..=n_splits)
        .filter_map(|k| {
            let train_end = k * block;
            let test_end = if k == n_splits { n } else { (k + 1) * block };
            let purged = purge_count(train_end, embargo_pct);
            let train = 0..train_end - purged;
            if train.is_empty() {
                return None;
            }
            Some(FoldSplit {
                train,
                test: train_end..test_end,
                purged,
            })
        })
        .collect()
}

/// Evaluate one fold on fractional per-trade returns.
pub fn evaluate_fold(fold: usize, returns: &[f64], split: &FoldSplit) -> FoldResult {
    let train = &returns[split.train.clone()];
    let test = &returns[split.test.clone()];

    let in_sample_win_rate = stats::win_rate(train);
    let oos_win_rate = stats::win_rate(test);

    let result = FoldResult {
        fold,
        train_size: train.len(),
        test_size: test.len(),
        purged: split.purged,
        in_sample_sharpe: stats::annualized_sharpe(train),
        oos_sharpe: stats::annualized_sharpe(test),
        in_sample_win_rate,
        oos_win_rate,
        oos_mean_return: stats::mean(test),
        oos_max_drawdown: stats::max_drawdown(test),
        overfit_ratio: in_sample_win_rate / oos_win_rate.max(0.01),
    };

    debug!(
        fold,
        train = result.train_size,
        test = result.test_size,
        is_sharpe = result.in_sample_sharpe,
        oos_sharpe = result.oos_sharpe,
        "Evaluated walk-forward fold"
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_purge_length_matches_embargo() {
        for n in [30usize, 47, 100, 250, 1000] {
            for split in purged_walk_forward_splits(n, effective_splits(n, 5), 0.02) {
                let original = split.original_train_len();
                let expected = original - ((original as f64 * 0.02).floor() as usize).max(1);
                assert_eq!(split.train.len(), expected);
            }
        }
    }

    #[test]
    fn test_splits_are_chronological_and_disjoint() {
        let splits = purged_walk_forward_splits(120, 5, 0.02);
        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.train.start, 0);
            assert!(split.train.end < split.test.start);
        }
        assert_eq!(splits[0].test, 20..40);
        assert_eq!(splits.last().unwrap().test.end, 120);
    }

    #[test]
    fn test_remainder_goes_to_last_test_block() {
        let splits = purged_walk_forward_splits(47, 2, 0.02);
        assert_eq!(splits[0].test, 15..30);
        assert_eq!(splits[1].test, 30..47);
    }

    #[test]
    fn test_effective_splits_reduced_for_small_samples() {
        assert_eq!(effective_splits(30, 5), 2);
        assert_eq!(effective_splits(60, 5), 4);
        assert_eq!(effective_splits(500, 5), 5);
        assert_eq!(effective_splits(500, 3), 3);
    }

    #[test]
    fn test_overfit_ratio_floor() {
        // In-sample all winners, out-of-sample all losers
        let mut returns = vec![0.01; 20];
        returns.extend(vec![-0.01; 10]);
        let split = FoldSplit {
            train: 0..19,
            test: 20..30,
            purged: 1,
        };
        let result = evaluate_fold(1, &returns, &split);
        assert_eq!(result.oos_win_rate, 0.0);
        assert_relative_eq!(result.overfit_ratio, 100.0);
        assert!(result.oos_sharpe < 0.0);
        assert!(result.oos_max_drawdown > 0.09);
    }
}
