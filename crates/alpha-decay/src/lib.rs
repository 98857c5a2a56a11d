//! Alpha Decay Detector
//!
//! Tracks when trading algorithms stop working. Segments the PnL series at
//! structural breaks, classifies the most recent regime and recommends a
//! confidence weight for position sizing.

pub mod change_detector;
pub mod detector;
pub mod health_report;
pub mod segment;

pub use change_detector::{ChangePointEngine, CusumEngine, EngineKind, PeltEngine};
pub use detector::{DecayConfig, DecayDetector};
pub use health_report::{
    AlertCategory, AlertSeverity, DecayAlert, DecayPayload, DecayReport, DecayStatus,
};
pub use segment::DecaySegment;
