use alpha_decay::DecayReport;
use analysis_core::AnalysisResult;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use kelly_position_sizer::{PositionSizer, SizingRequest, SizingResult};
use serde::{Deserialize, Serialize};
use tracing::debug;
use track_record_validator::{TrackRecordReport, Verdict};

use crate::batch::AlgorithmReport;

/// Last reports computed for one algorithm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmState {
    pub validation: Option<TrackRecordReport>,
    pub decay: Option<DecayReport>,
    pub updated_at: DateTime<Utc>,
}

/// Per-algorithm report cache.
///
/// Written by the periodic batch, read on every signal, so sizing never
/// recomputes validation or decay.
#[derive(Debug, Default)]
pub struct ReportCache {
    states: DashMap<String, AlgorithmState>,
}

impl ReportCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, report: AlgorithmReport) {
        self.states.insert(
            report.algorithm_id,
            AlgorithmState {
                validation: Some(report.validation),
                decay: Some(report.decay),
                updated_at: Utc::now(),
            },
        );
    }

    pub fn store_all(&self, reports: impl IntoIterator<Item = AlgorithmReport>) {
        for report in reports {
            self.store(report);
        }
    }

    /// Replace only the decay report, keeping the cached validation; the
    /// two run on different schedules.
    pub fn store_decay(&self, algorithm_id: &str, decay: DecayReport) {
        let now = Utc::now();
        self.states
            .entry(algorithm_id.to_string())
            .and_modify(|state| {
                state.decay = Some(decay.clone());
                state.updated_at = now;
            })
            .or_insert_with(|| AlgorithmState {
                validation: None,
                decay: Some(decay.clone()),
                updated_at: now,
            });
    }

    pub fn get(&self, algorithm_id: &str) -> Option<AlgorithmState> {
        self.states.get(algorithm_id).map(|entry| entry.value().clone())
    }

    pub fn decay_weight(&self, algorithm_id: &str) -> Option<f64> {
        self.states
            .get(algorithm_id)
            .and_then(|entry| entry.decay.as_ref().map(|d| d.recommended_weight))
    }

    pub fn verdict(&self, algorithm_id: &str) -> Option<Verdict> {
        self.states
            .get(algorithm_id)
            .and_then(|entry| entry.validation.as_ref().map(|v| v.verdict))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Size a signal from `algorithm_id` using its cached decay weight.
    ///
    /// The cached weight replaces whatever the request carries; with no
    /// cached report the weight is neutral.
    pub fn size_signal(
        &self,
        sizer: &PositionSizer,
        algorithm_id: &str,
        mut request: SizingRequest,
    ) -> AnalysisResult<SizingResult> {
        request.decay_weight = self.decay_weight(algorithm_id);
        if request.decay_weight.is_none() {
            debug!(algorithm = %algorithm_id, "No cached decay report, using neutral weight");
        }
        sizer.size(&request)
    }
}
