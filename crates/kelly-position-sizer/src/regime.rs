//! Market regime modifier
//!
//! Combines the composite market score with discrete trend and volatility
//! multipliers, then holds the product inside a fixed band so regime alone
//! never zeroes out or over-boosts a position.

use serde::{Deserialize, Serialize};

/// Regime snapshot supplied with a signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeContext {
    /// Composite market score, 0-100
    pub composite_score: f64,
    /// "bull", "sideways" or "bear"
    pub trend: String,
    /// "fear", "elevated", "normal" or "complacent"
    pub volatility: String,
}

impl RegimeContext {
    pub fn new(
        composite_score: f64,
        trend: impl Into<String>,
        volatility: impl Into<String>,
    ) -> Self {
        Self {
            composite_score,
            trend: trend.into(),
            volatility: volatility.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeWeights {
    /// Neutral composite score; score / center is the base multiplier.
    // FIXME: the base renormalisation assumes a 0-100 score centred at 50.
    // Revisit if the upstream composite range changes.
    pub composite_center: f64,
    pub bull: f64,
    pub sideways: f64,
    pub bear: f64,
    pub fear: f64,
    pub elevated: f64,
    pub normal: f64,
    pub complacent: f64,
    pub band_min: f64,
    pub band_max: f64,
}

impl Default for RegimeWeights {
    fn default() -> Self {
        Self {
            composite_center: 50.0,
            bull: 1.1,
            sideways: 0.9,
            bear: 0.6,
            fear: 0.7,
            elevated: 0.85,
            normal: 1.0,
            complacent: 0.95,
            band_min: 0.3,
            band_max: 1.2,
        }
    }
}

impl RegimeWeights {
    /// Unknown labels are neutral.
    pub fn trend_multiplier(&self, label: &str) -> f64 {
        match label.trim().to_ascii_lowercase().as_str() {
            "bull" | "bullish" => self.bull,
            "sideways" | "neutral" | "range" => self.sideways,
            "bear" | "bearish" => self.bear,
            _ => 1.0,
        }
    }

    pub fn volatility_multiplier(&self, label: &str) -> f64 {
        match label.trim().to_ascii_lowercase().as_str() {
            "fear" | "extreme" => self.fear,
            "elevated" | "high" => self.elevated,
            "normal" => self.normal,
            "complacent" | "low" => self.complacent,
            _ => 1.0,
        }
    }

    /// Modifier in `[band_min, band_max]`; 1.0 without regime context.
    pub fn modifier(&self, regime: Option<&RegimeContext>) -> f64 {
        let Some(regime) = regime else {
            return 1.0;
        };

        let score = if regime.composite_score.is_finite() {
            regime.composite_score.clamp(0.0, 100.0)
        } else {
            self.composite_center
        };
        let base = score / self.composite_center;

        let raw = base
            * self.trend_multiplier(&regime.trend)
            * self.volatility_multiplier(&regime.volatility);

        if raw.is_finite() {
            raw.clamp(self.band_min, self.band_max)
        } else {
            1.0
        }
    }
}
