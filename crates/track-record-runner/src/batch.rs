//! Per-algorithm fan-out. Algorithms are independent, so each gets its own
//! rayon task with no coordination.

use alpha_decay::{DecayDetector, DecayReport};
use analysis_core::{AnalysisError, Trade};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};
use track_record_validator::{TrackRecordReport, TrackRecordValidator};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmReport {
    pub algorithm_id: String,
    pub validation: TrackRecordReport,
    pub decay: DecayReport,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Ordered by algorithm id
    pub reports: Vec<AlgorithmReport>,
    pub failures: Vec<(String, AnalysisError)>,
}

/// Validate and decay-check every algorithm.
///
/// `n_total_algorithms` defaults to the number of algorithms in the batch.
pub fn run_batch(
    trades: &BTreeMap<String, Vec<Trade>>,
    validator: &TrackRecordValidator,
    detector: &DecayDetector,
    n_total_algorithms: Option<usize>,
) -> BatchOutcome {
    let n_total = n_total_algorithms.unwrap_or(trades.len()).max(1);

    let results: Vec<(String, Result<AlgorithmReport, AnalysisError>)> = trades
        .par_iter()
        .map(|(algorithm_id, history)| {
            let result = evaluate(algorithm_id, history, validator, detector, n_total);
            (algorithm_id.clone(), result)
        })
        .collect();

    let mut outcome = BatchOutcome::default();
    for (algorithm_id, result) in results {
        match result {
            Ok(report) => outcome.reports.push(report),
            Err(e) => {
                warn!(algorithm = %algorithm_id, "Evaluation failed: {}", e);
                outcome.failures.push((algorithm_id, e));
            }
        }
    }

    info!(
        evaluated = outcome.reports.len(),
        failed = outcome.failures.len(),
        n_total,
        "Batch complete"
    );
    outcome
}

fn evaluate(
    algorithm_id: &str,
    trades: &[Trade],
    validator: &TrackRecordValidator,
    detector: &DecayDetector,
    n_total_algorithms: usize,
) -> Result<AlgorithmReport, AnalysisError> {
    let mut validation = validator.validate(trades, n_total_algorithms)?;
    validation.algorithm_id = algorithm_id.to_string();
    let decay = detector.detect_trades(trades)?;

    info!(
        algorithm = %algorithm_id,
        verdict = validation.verdict.as_str(),
        decay_status = decay.status.as_str(),
        weight = decay.recommended_weight,
        "Algorithm evaluated"
    );

    Ok(AlgorithmReport {
        algorithm_id: algorithm_id.to_string(),
        validation,
        decay,
    })
}
