use alpha_decay::DecayPayload;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use track_record_validator::ValidatorPayload;

use crate::batch::AlgorithmReport;

/// Published state of one algorithm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmPayload {
    pub algorithm_name: String,
    pub validation: ValidatorPayload,
    pub decay: DecayPayload,
}

impl From<&AlgorithmReport> for AlgorithmPayload {
    fn from(report: &AlgorithmReport) -> Self {
        Self {
            algorithm_name: report.algorithm_id.clone(),
            validation: report.validation.payload(),
            decay: report.decay.payload(),
        }
    }
}

/// Body POSTed to the ingestion endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPayload {
    pub generated_at: DateTime<Utc>,
    pub n_algorithms: usize,
    pub algorithms: Vec<AlgorithmPayload>,
}

impl BatchPayload {
    pub fn from_reports(reports: &[AlgorithmReport], generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            n_algorithms: reports.len(),
            algorithms: reports.iter().map(AlgorithmPayload::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::run_batch;
    use crate::batch::tests::sample_batch;
    use alpha_decay::DecayDetector;
    use chrono::TimeZone;
    use track_record_validator::TrackRecordValidator;

    #[test]
    fn test_payload_shapes() {
        let outcome = run_batch(
            &sample_batch(),
            &TrackRecordValidator::default(),
            &DecayDetector::default(),
            None,
        );
        let generated_at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let payload = BatchPayload::from_reports(&outcome.reports, generated_at);
        assert_eq!(payload.n_algorithms, 3);

        let json = serde_json::to_value(&payload).unwrap();
        let first = &json["algorithms"][0];
        assert_eq!(first["algorithm_name"], "broken_edge");

        for key in [
            "verdict",
            "deflated_sharpe",
            "dsr_p_value",
            "oos_sharpe",
            "overfit_ratio",
            "fold_results",
        ] {
            assert!(first["validation"].get(key).is_some(), "validation missing {}", key);
        }
        for key in [
            "decay_status",
            "recommended_weight",
            "reason",
            "last_segment",
            "change_points_detected",
            "n_segments",
        ] {
            assert!(first["decay"].get(key).is_some(), "decay missing {}", key);
        }
        assert_eq!(json["algorithms"][1]["validation"]["verdict"], "INSUFFICIENT_DATA");
    }
}
