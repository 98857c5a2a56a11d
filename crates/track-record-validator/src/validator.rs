//! Track-record validation
//!
//! Runs purged walk-forward cross-validation over one algorithm's closed
//! trades, deflates its Sharpe for the number of algorithms tested and maps
//! the result to a verdict.

use analysis_core::{
    ensure_chronological, return_fractions, stats, AnalysisError, AnalysisResult, Trade,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::deflated_sharpe::{
    deflated_sharpe_ratio, minimum_track_record_length, DeflatedSharpeInput, DeflatedSharpeResult,
};
use crate::walk_forward::{effective_splits, evaluate_fold, purged_walk_forward_splits, FoldResult};

/// Qualitative verdict on an algorithm's track record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Strong,
    Acceptable,
    Weak,
    Overfit,
    InsufficientData,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Strong => "STRONG",
            Verdict::Acceptable => "ACCEPTABLE",
            Verdict::Weak => "WEAK",
            Verdict::Overfit => "OVERFIT",
            Verdict::InsufficientData => "INSUFFICIENT_DATA",
        }
    }

    /// Whether capital may be allocated on the strength of this verdict
    pub fn is_tradeable(&self) -> bool {
        matches!(self, Verdict::Strong | Verdict::Acceptable)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Requested walk-forward splits (reduced for small samples)
    pub n_splits: usize,
    /// Share of each training set purged before the test block
    pub embargo_pct: f64,
    /// Fewer trades than this yields `InsufficientData`
    pub min_trades: usize,
    pub strong_oos_sharpe: f64,
    pub strong_max_overfit: f64,
    pub acceptable_max_overfit: f64,
    pub weak_oos_sharpe: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            n_splits: 5,
            embargo_pct: 0.02,
            min_trades: 30,
            strong_oos_sharpe: 0.5,
            strong_max_overfit: 2.0,
            acceptable_max_overfit: 3.0,
            weak_oos_sharpe: -0.5,
        }
    }
}

impl ValidatorConfig {
    pub fn validate(&self) -> AnalysisResult<()> {
        if self.n_splits < 2 {
            return Err(AnalysisError::InvalidData(
                "n_splits must be at least 2".to_string(),
            ));
        }
        if !(0.0..0.5).contains(&self.embargo_pct) {
            return Err(AnalysisError::InvalidData(
                "embargo_pct must be in [0, 0.5)".to_string(),
            ));
        }
        if self.min_trades < 3 {
            return Err(AnalysisError::InvalidData(
                "min_trades too small to form walk-forward blocks".to_string(),
            ));
        }
        Ok(())
    }
}

/// Relative loss from in-sample to out-of-sample (0.25 = 25% worse OOS)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OosDegradation {
    pub sharpe_degradation: f64,
    pub win_rate_degradation: f64,
}

impl OosDegradation {
    fn from_folds(folds: &[FoldResult]) -> Self {
        let n = folds.len().max(1) as f64;
        let is_sharpe = folds.iter().map(|f| f.in_sample_sharpe).sum::<f64>() / n;
        let oos_sharpe = folds.iter().map(|f| f.oos_sharpe).sum::<f64>() / n;
        let is_wr = folds.iter().map(|f| f.in_sample_win_rate).sum::<f64>() / n;
        let oos_wr = folds.iter().map(|f| f.oos_win_rate).sum::<f64>() / n;

        let sharpe_degradation = if is_sharpe.abs() > 0.01 {
            (is_sharpe - oos_sharpe) / is_sharpe.abs()
        } else {
            0.0
        };
        let win_rate_degradation = if is_wr > 0.01 {
            (is_wr - oos_wr) / is_wr
        } else {
            0.0
        };

        Self {
            sharpe_degradation,
            win_rate_degradation,
        }
    }
}

/// Result of one validation run. Superseded, never merged, by the next run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecordReport {
    pub algorithm_id: String,
    pub verdict: Verdict,
    pub n_trades: usize,
    pub n_splits_used: usize,
    pub fold_results: Vec<FoldResult>,
    /// Annualised Sharpe over the whole history
    pub full_sample_sharpe: f64,
    pub avg_in_sample_sharpe: f64,
    pub avg_oos_sharpe: f64,
    pub avg_overfit_ratio: f64,
    pub deflated_sharpe_stat: f64,
    pub deflated_sharpe_p_value: f64,
    pub deflated_sharpe: Option<DeflatedSharpeResult>,
    pub oos_degradation: Option<OosDegradation>,
    /// Trades needed for the per-trade Sharpe to be significant
    pub min_track_record_length: Option<usize>,
}

impl TrackRecordReport {
    fn insufficient(algorithm_id: String, n_trades: usize) -> Self {
        Self {
            algorithm_id,
            verdict: Verdict::InsufficientData,
            n_trades,
            n_splits_used: 0,
            fold_results: Vec::new(),
            full_sample_sharpe: 0.0,
            avg_in_sample_sharpe: 0.0,
            avg_oos_sharpe: 0.0,
            avg_overfit_ratio: 0.0,
            deflated_sharpe_stat: 0.0,
            deflated_sharpe_p_value: 1.0,
            deflated_sharpe: None,
            oos_degradation: None,
            min_track_record_length: None,
        }
    }

    /// Wire shape published to the API.
    pub fn payload(&self) -> ValidatorPayload {
        ValidatorPayload {
            verdict: self.verdict,
            deflated_sharpe: self.deflated_sharpe_stat,
            dsr_p_value: self.deflated_sharpe_p_value,
            oos_sharpe: self.avg_oos_sharpe,
            overfit_ratio: self.avg_overfit_ratio,
            fold_results: self.fold_results.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorPayload {
    pub verdict: Verdict,
    pub deflated_sharpe: f64,
    pub dsr_p_value: f64,
    pub oos_sharpe: f64,
    pub overfit_ratio: f64,
    pub fold_results: Vec<FoldResult>,
}

/// Track-record validator
#[derive(Debug, Clone, Default)]
pub struct TrackRecordValidator {
    config: ValidatorConfig,
}

impl TrackRecordValidator {
    pub fn new(config: ValidatorConfig) -> AnalysisResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate one algorithm's trades, ordered by `exit_time`.
    ///
    /// `n_total_algorithms` is the number of strategies tested alongside this
    /// one and drives the multiple-testing correction. Only unsorted input is
    /// an error; short histories return `Verdict::InsufficientData`.
    pub fn validate(
        &self,
        trades: &[Trade],
        n_total_algorithms: usize,
    ) -> AnalysisResult<TrackRecordReport> {
        ensure_chronological(trades)?;

        let algorithm_id = trades
            .first()
            .map(|t| t.algorithm_id.clone())
            .unwrap_or_default();

        if trades.len() < self.config.min_trades {
            debug!(
                algorithm = %algorithm_id,
                trades = trades.len(),
                min = self.config.min_trades,
                "Insufficient trades for validation"
            );
            return Ok(TrackRecordReport::insufficient(algorithm_id, trades.len()));
        }

        let returns = return_fractions(trades);
        Ok(self.validate_returns(algorithm_id, &returns, n_total_algorithms))
    }

    fn validate_returns(
        &self,
        algorithm_id: String,
        returns: &[f64],
        n_total_algorithms: usize,
    ) -> TrackRecordReport {
        let n = returns.len();
        let n_splits = effective_splits(n, self.config.n_splits);
        let splits = purged_walk_forward_splits(n, n_splits, self.config.embargo_pct);

        let fold_results: Vec<FoldResult> = splits
            .iter()
            .enumerate()
            .map(|(i, split)| evaluate_fold(i + 1, returns, split))
            .collect();

        if fold_results.is_empty() {
            return TrackRecordReport::insufficient(algorithm_id, n);
        }

        let folds = fold_results.len() as f64;
        let avg_in_sample_sharpe =
            fold_results.iter().map(|f| f.in_sample_sharpe).sum::<f64>() / folds;
        let avg_oos_sharpe = fold_results.iter().map(|f| f.oos_sharpe).sum::<f64>() / folds;
        let avg_overfit_ratio = fold_results.iter().map(|f| f.overfit_ratio).sum::<f64>() / folds;

        let per_trade_sharpe = stats::per_trade_sharpe(returns).unwrap_or(0.0);
        let dsr = deflated_sharpe_ratio(&DeflatedSharpeInput {
            observed_sharpe: per_trade_sharpe,
            n_trials: n_total_algorithms,
            n_observations: n,
            skewness: stats::skewness(returns),
            kurtosis: stats::kurtosis(returns),
        });

        let verdict = self.verdict(avg_oos_sharpe, avg_overfit_ratio, dsr.is_significant);

        info!(
            algorithm = %algorithm_id,
            trades = n,
            folds = fold_results.len(),
            oos_sharpe = avg_oos_sharpe,
            overfit_ratio = avg_overfit_ratio,
            dsr_p_value = dsr.p_value,
            verdict = verdict.as_str(),
            "Track record validated"
        );

        TrackRecordReport {
            algorithm_id,
            verdict,
            n_trades: n,
            n_splits_used: n_splits,
            oos_degradation: Some(OosDegradation::from_folds(&fold_results)),
            fold_results,
            full_sample_sharpe: stats::annualized_sharpe(returns),
            avg_in_sample_sharpe,
            avg_oos_sharpe,
            avg_overfit_ratio,
            deflated_sharpe_stat: dsr.deflated_sharpe,
            deflated_sharpe_p_value: dsr.p_value,
            min_track_record_length: minimum_track_record_length(per_trade_sharpe, 0.95, 0.80),
            deflated_sharpe: Some(dsr),
        }
    }

    /// Verdict policy over fold averages.
    pub fn verdict(
        &self,
        avg_oos_sharpe: f64,
        avg_overfit_ratio: f64,
        dsr_significant: bool,
    ) -> Verdict {
        let c = &self.config;
        if avg_oos_sharpe > c.strong_oos_sharpe
            && dsr_significant
            && avg_overfit_ratio < c.strong_max_overfit
        {
            Verdict::Strong
        } else if avg_oos_sharpe > 0.0 && avg_overfit_ratio < c.acceptable_max_overfit {
            Verdict::Acceptable
        } else if avg_oos_sharpe > c.weak_oos_sharpe {
            Verdict::Weak
        } else {
            Verdict::Overfit
        }
    }
}
