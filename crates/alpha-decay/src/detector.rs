//! Decay Detector
//!
//! Segments an algorithm's PnL series at structural breaks and classifies
//! the most recent regime. Only the last segment drives the status; averaging
//! over all history is the validator's job.

use analysis_core::{AnalysisError, AnalysisResult, Trade};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::change_detector::{ChangePointEngine, CusumEngine, EngineKind, PeltEngine};
use crate::health_report::{generate_alerts, DecayReport, DecayStatus};
use crate::segment::{segments_from_change_points, DecaySegment};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecayConfig {
    /// Preferred engine; CUSUM is substituted when it is unavailable
    pub engine: EngineKind,
    pub min_segment_size: usize,
    /// Higher means fewer, more conservative change points
    pub penalty: f64,
    pub cusum_threshold: f64,
    pub cusum_slack: f64,
    /// Longest series the exact engine will take
    pub max_exact_len: usize,
    pub low_confidence_trades: usize,
    pub low_confidence_multiplier: f64,
    /// Weight reported with an `unknown` status
    pub unknown_weight: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::Pelt,
            min_segment_size: 8,
            penalty: 1.5,
            cusum_threshold: 5.0,
            cusum_slack: 0.5,
            max_exact_len: 1_500,
            low_confidence_trades: 15,
            low_confidence_multiplier: 0.8,
            unknown_weight: 0.5,
        }
    }
}

impl DecayConfig {
    pub fn validate(&self) -> AnalysisResult<()> {
        if self.min_segment_size == 0 {
            return Err(AnalysisError::InvalidData(
                "min_segment_size must be at least 1".to_string(),
            ));
        }
        if !self.penalty.is_finite() || self.penalty < 0.0 {
            return Err(AnalysisError::InvalidData(format!(
                "penalty must be a non-negative number, got {}",
                self.penalty
            )));
        }
        if !self.cusum_threshold.is_finite() || self.cusum_threshold <= 0.0 {
            return Err(AnalysisError::InvalidData(format!(
                "cusum_threshold must be positive, got {}",
                self.cusum_threshold
            )));
        }
        if !self.cusum_slack.is_finite() || self.cusum_slack < 0.0 {
            return Err(AnalysisError::InvalidData(format!(
                "cusum_slack must be a non-negative number, got {}",
                self.cusum_slack
            )));
        }
        if !(0.0..=1.0).contains(&self.low_confidence_multiplier)
            || !(0.0..=1.5).contains(&self.unknown_weight)
        {
            return Err(AnalysisError::InvalidData(
                "confidence multipliers must lie within the weight band".to_string(),
            ));
        }
        Ok(())
    }
}

pub struct DecayDetector {
    config: DecayConfig,
    engine: Box<dyn ChangePointEngine>,
    fallback: CusumEngine,
}

impl std::fmt::Debug for DecayDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecayDetector")
            .field("config", &self.config)
            .field("engine", &self.engine.kind())
            .finish()
    }
}

impl DecayDetector {
    pub fn new(config: DecayConfig) -> AnalysisResult<Self> {
        config.validate()?;
        let fallback = CusumEngine::new(config.cusum_threshold, config.cusum_slack);
        let engine: Box<dyn ChangePointEngine> = match config.engine {
            EngineKind::Pelt => Box::new(PeltEngine::new(config.max_exact_len)),
            EngineKind::Cusum => Box::new(fallback.clone()),
        };
        Ok(Self {
            config,
            engine,
            fallback,
        })
    }

    /// Use a caller-supplied engine, e.g. a tuned PELT bandwidth.
    pub fn with_engine(
        config: DecayConfig,
        engine: Box<dyn ChangePointEngine>,
    ) -> AnalysisResult<Self> {
        let mut detector = Self::new(config)?;
        detector.engine = engine;
        Ok(detector)
    }

    pub fn config(&self) -> &DecayConfig {
        &self.config
    }

    /// Segment `pnl_series` (ordered oldest first) and classify its most
    /// recent regime.
    pub fn detect(&self, pnl_series: &[f64]) -> AnalysisResult<DecayReport> {
        if let Some(pos) = pnl_series.iter().position(|v| !v.is_finite()) {
            return Err(AnalysisError::InvalidData(format!(
                "pnl series has a non-finite value at index {}",
                pos
            )));
        }

        let n = pnl_series.len();
        let min_size = self.config.min_segment_size;

        let (change_points, engine) = if n < 2 * min_size {
            debug!(n, min_size, "Series too short to segment");
            (Vec::new(), None)
        } else {
            let (cps, kind) = self.find_change_points(pnl_series)?;
            (cps, Some(kind))
        };

        let segments = segments_from_change_points(pnl_series, &change_points);
        let report = self.build_report(segments, change_points, engine, n);

        info!(
            n,
            status = report.status.as_str(),
            weight = report.recommended_weight,
            segments = report.n_segments(),
            "Decay detection complete"
        );
        Ok(report)
    }

    /// Detect on the realised return fractions of `trades`, which must be in
    /// exit-time order.
    pub fn detect_trades(&self, trades: &[Trade]) -> AnalysisResult<DecayReport> {
        analysis_core::ensure_chronological(trades)?;
        self.detect(&analysis_core::return_fractions(trades))
    }

    fn find_change_points(&self, series: &[f64]) -> AnalysisResult<(Vec<usize>, EngineKind)> {
        let min_size = self.config.min_segment_size;
        match self.engine.segment(series, min_size, self.config.penalty) {
            Ok(cps) => Ok((cps, self.engine.kind())),
            Err(AnalysisError::EngineUnavailable(reason)) => {
                warn!(%reason, "Change-point engine unavailable, falling back to CUSUM");
                let cps = self.fallback.segment(series, min_size, self.config.penalty)?;
                Ok((cps, EngineKind::Cusum))
            }
            Err(e) => Err(e),
        }
    }

    fn build_report(
        &self,
        segments: Vec<DecaySegment>,
        change_points: Vec<usize>,
        engine: Option<EngineKind>,
        n_observations: usize,
    ) -> DecayReport {
        let last = segments
            .last()
            .cloned()
            .unwrap_or_else(|| DecaySegment::empty(0));
        let previous = segments.len().checked_sub(2).map(|i| &segments[i]);

        let sharpe_delta = previous.map(|p| last.sharpe - p.sharpe);
        let win_rate_delta = previous.map(|p| last.win_rate - p.win_rate);

        if last.n_trades < 3 {
            return DecayReport {
                change_points,
                status: DecayStatus::Unknown,
                recommended_weight: self.config.unknown_weight,
                reason: format!(
                    "Insufficient data: {} trades in current regime",
                    last.n_trades
                ),
                engine,
                sharpe_delta,
                win_rate_delta,
                low_confidence: true,
                alerts: Vec::new(),
                n_observations,
                segments,
            };
        }

        let (status, base_weight) = DecayStatus::classify(&last);
        let low_confidence = last.n_trades < self.config.low_confidence_trades;

        let mut reason = format!(
            "Current regime ({} trades): Sharpe {:.2}, win rate {:.1}%",
            last.n_trades,
            last.sharpe,
            last.win_rate * 100.0
        );
        if let Some(delta) = sharpe_delta {
            reason.push_str(&format!(", Sharpe change {:+.2} vs prior regime", delta));
        }

        let mut weight = base_weight;
        if low_confidence {
            weight *= self.config.low_confidence_multiplier;
            reason.push_str(&format!(
                "; low confidence (fewer than {} trades)",
                self.config.low_confidence_trades
            ));
        }

        let alerts = generate_alerts(
            &last,
            previous,
            &change_points,
            n_observations,
            self.config.low_confidence_trades,
        );

        DecayReport {
            change_points,
            status,
            recommended_weight: weight.clamp(0.0, 1.5),
            reason,
            engine,
            sharpe_delta,
            win_rate_delta,
            low_confidence,
            alerts,
            n_observations,
            segments,
        }
    }
}

impl Default for DecayDetector {
    fn default() -> Self {
        let config = DecayConfig::default();
        let fallback = CusumEngine::new(config.cusum_threshold, config.cusum_slack);
        Self {
            engine: Box::new(PeltEngine::new(config.max_exact_len)),
            fallback,
            config,
        }
    }
}
