//! Decay Reporting
//!
//! Classifies the most recent regime of an algorithm and builds the decay
//! report: status, recommended weight, reason and alerts.

use serde::{Deserialize, Serialize};

use crate::change_detector::EngineKind;
use crate::segment::DecaySegment;

/// Health of the most recent regime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayStatus {
    Strong,
    Healthy,
    Warning,
    Decayed,
    Dead,
    Unknown,
}

impl DecayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecayStatus::Strong => "strong",
            DecayStatus::Healthy => "healthy",
            DecayStatus::Warning => "warning",
            DecayStatus::Decayed => "decayed",
            DecayStatus::Dead => "dead",
            DecayStatus::Unknown => "unknown",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            DecayStatus::Strong => "#00cc88",
            DecayStatus::Healthy => "#00ccff",
            DecayStatus::Warning => "#ffaa00",
            DecayStatus::Decayed => "#ff6600",
            DecayStatus::Dead => "#ff4444",
            DecayStatus::Unknown => "#888888",
        }
    }

    /// Ordinal rank, higher is healthier. `None` for `Unknown`.
    pub fn tier(&self) -> Option<u8> {
        match self {
            DecayStatus::Dead => Some(0),
            DecayStatus::Decayed => Some(1),
            DecayStatus::Warning => Some(2),
            DecayStatus::Healthy => Some(3),
            DecayStatus::Strong => Some(4),
            DecayStatus::Unknown => None,
        }
    }

    /// Classify a segment, returning the status and its base weight.
    ///
    /// | Sharpe    | Win rate | Status  | Weight                 |
    /// |-----------|----------|---------|------------------------|
    /// | > 1.5     | > 0.55   | strong  | 1.0 + 0.25/unit, <=1.5 |
    /// | > 0.5     | > 0.45   | healthy | 1.0                    |
    /// | > 0, mean > 0 |      | warning | 0.6                    |
    /// | > -0.5    |          | decayed | 0.3                    |
    /// | otherwise |          | dead    | 0.0                    |
    pub fn classify(segment: &DecaySegment) -> (Self, f64) {
        let sharpe = segment.sharpe;
        let win_rate = segment.win_rate;

        if sharpe > 1.5 && win_rate > 0.55 {
            (DecayStatus::Strong, (1.0 + (sharpe - 1.5) * 0.25).min(1.5))
        } else if sharpe > 0.5 && win_rate > 0.45 {
            (DecayStatus::Healthy, 1.0)
        } else if sharpe > 0.0 && segment.mean_return > 0.0 {
            (DecayStatus::Warning, 0.6)
        } else if sharpe > -0.5 {
            (DecayStatus::Decayed, 0.3)
        } else {
            (DecayStatus::Dead, 0.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertCategory {
    SharpeDecay,
    WinRateDecay,
    RegimeChange,
    LowConfidence,
}

/// An alert about an algorithm's recent performance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayAlert {
    pub severity: AlertSeverity,
    pub category: AlertCategory,
    pub message: String,
    pub current_value: f64,
    pub threshold_value: f64,
}

/// Result of one decay detection run, recomputed from full history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayReport {
    pub segments: Vec<DecaySegment>,
    pub change_points: Vec<usize>,
    pub status: DecayStatus,
    /// In [0.0, 1.5]
    pub recommended_weight: f64,
    pub reason: String,
    /// Engine that produced the segmentation; `None` when the series was too
    /// short to segment
    pub engine: Option<EngineKind>,
    /// Last-segment Sharpe minus previous-segment Sharpe
    pub sharpe_delta: Option<f64>,
    pub win_rate_delta: Option<f64>,
    pub low_confidence: bool,
    pub alerts: Vec<DecayAlert>,
    pub n_observations: usize,
}

impl DecayReport {
    pub fn last_segment(&self) -> Option<&DecaySegment> {
        self.segments.last()
    }

    pub fn n_segments(&self) -> usize {
        self.segments.len()
    }

    /// Wire shape published to the API.
    pub fn payload(&self) -> DecayPayload {
        DecayPayload {
            decay_status: self.status,
            recommended_weight: self.recommended_weight,
            reason: self.reason.clone(),
            last_segment: self
                .last_segment()
                .cloned()
                .unwrap_or_else(|| DecaySegment::empty(0)),
            change_points_detected: self.change_points.len(),
            n_segments: self.n_segments(),
            engine: self.engine,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayPayload {
    pub decay_status: DecayStatus,
    pub recommended_weight: f64,
    pub reason: String,
    pub last_segment: DecaySegment,
    pub change_points_detected: usize,
    pub n_segments: usize,
    pub engine: Option<EngineKind>,
}

/// Alerts comparing the last segment with the one before it.
pub(crate) fn generate_alerts(
    last: &DecaySegment,
    previous: Option<&DecaySegment>,
    change_points: &[usize],
    n_observations: usize,
    low_confidence_trades: usize,
) -> Vec<DecayAlert> {
    let mut alerts = Vec::new();

    if last.sharpe < 0.0 {
        alerts.push(DecayAlert {
            severity: AlertSeverity::Critical,
            category: AlertCategory::SharpeDecay,
            message: format!("Current regime has negative Sharpe ({:.2})", last.sharpe),
            current_value: last.sharpe,
            threshold_value: 0.0,
        });
    }

    if let Some(prev) = previous {
        let sharpe_drop = prev.sharpe - last.sharpe;
        if sharpe_drop > 0.5 && last.sharpe >= 0.0 {
            alerts.push(DecayAlert {
                severity: AlertSeverity::Warning,
                category: AlertCategory::SharpeDecay,
                message: format!(
                    "Sharpe fell from {:.2} to {:.2} at the last change point",
                    prev.sharpe, last.sharpe
                ),
                current_value: last.sharpe,
                threshold_value: prev.sharpe - 0.5,
            });
        }

        let win_rate_drop = prev.win_rate - last.win_rate;
        if win_rate_drop > 0.10 {
            alerts.push(DecayAlert {
                severity: if win_rate_drop > 0.20 {
                    AlertSeverity::Critical
                } else {
                    AlertSeverity::Warning
                },
                category: AlertCategory::WinRateDecay,
                message: format!(
                    "Win rate fell from {:.1}% to {:.1}%",
                    prev.win_rate * 100.0,
                    last.win_rate * 100.0
                ),
                current_value: last.win_rate,
                threshold_value: prev.win_rate - 0.10,
            });
        }
    }

    // Regime change in the most recent fifth of the history
    if let Some(&cp) = change_points.last() {
        if cp as f64 >= n_observations as f64 * 0.8 {
            alerts.push(DecayAlert {
                severity: AlertSeverity::Info,
                category: AlertCategory::RegimeChange,
                message: format!("Regime change detected {} trades ago", n_observations - cp),
                current_value: cp as f64,
                threshold_value: n_observations as f64 * 0.8,
            });
        }
    }

    if last.n_trades < low_confidence_trades {
        alerts.push(DecayAlert {
            severity: AlertSeverity::Info,
            category: AlertCategory::LowConfidence,
            message: format!(
                "Only {} trades in current regime (need {})",
                last.n_trades, low_confidence_trades
            ),
            current_value: last.n_trades as f64,
            threshold_value: low_confidence_trades as f64,
        });
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(sharpe: f64, win_rate: f64, mean: f64, n: usize) -> DecaySegment {
        DecaySegment {
            start_index: 0,
            end_index: n,
            mean_return: mean,
            std_return: 0.01,
            sharpe,
            win_rate,
            n_trades: n,
            total_pnl: mean * n as f64,
        }
    }

    #[test]
    fn test_classification_table() {
        let cases = [
            (2.5, 0.60, 0.01, DecayStatus::Strong),
            (1.0, 0.50, 0.01, DecayStatus::Healthy),
            (2.5, 0.50, 0.01, DecayStatus::Healthy),
            (0.3, 0.40, 0.002, DecayStatus::Warning),
            (0.8, 0.40, 0.003, DecayStatus::Warning),
            (-0.2, 0.40, -0.001, DecayStatus::Decayed),
            (-1.0, 0.30, -0.01, DecayStatus::Dead),
        ];
        for (sharpe, wr, mean, expected) in cases {
            let (status, _) = DecayStatus::classify(&segment(sharpe, wr, mean, 30));
            assert_eq!(status, expected, "sharpe={} wr={}", sharpe, wr);
        }
    }

    #[test]
    fn test_strong_weight_scales_and_caps() {
        let (_, w_low) = DecayStatus::classify(&segment(1.6, 0.6, 0.01, 30));
        let (_, w_mid) = DecayStatus::classify(&segment(2.5, 0.6, 0.01, 30));
        let (_, w_high) = DecayStatus::classify(&segment(9.0, 0.6, 0.01, 30));
        assert!(w_low >= 1.0 && w_low < w_mid);
        assert_eq!(w_high, 1.5);
    }

    #[test]
    fn test_classification_monotonic_in_sharpe() {
        for wr in [0.3, 0.5, 0.6, 0.8] {
            let mut prev_tier = 0u8;
            let mut prev_weight = 0.0;
            for step in 0..=200 {
                let sharpe = -3.0 + step as f64 * 0.05;
                // Mean shares the Sharpe's sign
                let (status, weight) =
                    DecayStatus::classify(&segment(sharpe, wr, sharpe * 0.001, 30));
                let tier = status.tier().unwrap();
                assert!(tier >= prev_tier, "tier dropped at sharpe={} wr={}", sharpe, wr);
                assert!(weight >= prev_weight);
                prev_tier = tier;
                prev_weight = weight;
            }
        }
    }

    #[test]
    fn test_alerts_on_decline() {
        let prev = segment(2.0, 0.65, 0.01, 40);
        let last = segment(-1.2, 0.35, -0.01, 10);
        let alerts = generate_alerts(&last, Some(&prev), &[40], 50, 15);

        let categories: Vec<AlertCategory> = alerts.iter().map(|a| a.category).collect();
        assert!(categories.contains(&AlertCategory::SharpeDecay));
        assert!(categories.contains(&AlertCategory::WinRateDecay));
        assert!(categories.contains(&AlertCategory::RegimeChange));
        assert!(categories.contains(&AlertCategory::LowConfidence));
        assert!(alerts.iter().any(|a| a.severity == AlertSeverity::Critical));
    }

    #[test]
    fn test_regime_change_alert_only_in_recent_fifth() {
        let prev = segment(2.0, 0.65, 0.01, 40);
        let last = segment(-1.2, 0.35, -0.01, 12);
        let has_regime_change = |cp: usize, n: usize| {
            generate_alerts(&last, Some(&prev), &[cp], n, 15)
                .iter()
                .any(|a| a.category == AlertCategory::RegimeChange)
        };

        // 0.8 * 52 = 41.6
        assert!(!has_regime_change(40, 52));
        assert!(has_regime_change(42, 52));
        assert!(has_regime_change(40, 50));
    }

    #[test]
    fn test_no_alerts_for_steady_regime() {
        let last = segment(1.8, 0.6, 0.01, 60);
        assert!(generate_alerts(&last, None, &[], 60, 15).is_empty());
    }
}
