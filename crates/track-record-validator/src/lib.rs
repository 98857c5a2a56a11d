//! Track-Record Validator
//!
//! Decides whether an algorithm's closed-trade history shows real edge:
//! purged walk-forward cross-validation, a Deflated Sharpe Ratio corrected
//! for the number of algorithms tested, a verdict policy, and an adversarial
//! leakage check on feature sets.

pub mod deflated_sharpe;
pub mod leakage;
pub mod validator;
pub mod walk_forward;

pub use deflated_sharpe::{
    deflated_sharpe_ratio, expected_max_sharpe, minimum_track_record_length,
    DeflatedSharpeInput, DeflatedSharpeResult,
};
pub use leakage::{check_leakage, LeakageCheck, LeakageConfig};
pub use validator::{
    OosDegradation, TrackRecordReport, TrackRecordValidator, ValidatorConfig, ValidatorPayload,
    Verdict,
};
pub use walk_forward::{purged_walk_forward_splits, FoldResult, FoldSplit};
