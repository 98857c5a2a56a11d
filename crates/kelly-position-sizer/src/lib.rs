//! Position sizing
//!
//! Half-Kelly base scaled by EWMA volatility, market regime, the decay
//! detector's weight and signal strength, then bounded to
//! `[min_size_pct, max_position_pct]`.
//!
//! Full Kelly: `f* = (p * b - q) / b`, where `p` is the win rate, `q = 1 - p`
//! and `b` the average-win / average-loss ratio.

pub mod correlation;
pub mod regime;
pub mod volatility;

use analysis_core::{AnalysisError, AnalysisResult, Trade};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use correlation::{check_concentration, ConcentrationCheck};
pub use regime::{RegimeContext, RegimeWeights};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizerConfig {
    /// Floor of the final size; avoids dust-sized trades
    pub min_size_pct: f64,
    /// Ceiling of the final size and of the Kelly base
    pub max_position_pct: f64,
    /// Fractional Kelly multiplier (0.5 = half-Kelly)
    pub kelly_multiplier: f64,
    /// Annualised volatility target
    pub target_vol: f64,
    pub ewma_lambda: f64,
    pub vol_scalar_min: f64,
    pub vol_scalar_max: f64,
    /// Strength 0 maps to `strength_min`, 100 to `strength_max`
    pub strength_min: f64,
    pub strength_max: f64,
    pub decay_weight_max: f64,
    pub regime: RegimeWeights,
    /// Largest eigenvalue share tolerated by the correlation budget
    pub max_dominant_share: f64,
}

impl Default for SizerConfig {
    fn default() -> Self {
        Self {
            min_size_pct: 0.01,
            max_position_pct: 0.15,
            kelly_multiplier: 0.5,
            target_vol: 0.15,
            ewma_lambda: 0.94,
            vol_scalar_min: 0.1,
            vol_scalar_max: 3.0,
            strength_min: 0.5,
            strength_max: 1.0,
            decay_weight_max: 1.5,
            regime: RegimeWeights::default(),
            max_dominant_share: 0.30,
        }
    }
}

impl SizerConfig {
    pub fn validate(&self) -> AnalysisResult<()> {
        if !(self.max_position_pct > 0.0 && self.max_position_pct <= 1.0) {
            return Err(AnalysisError::InvalidData(
                "max_position_pct must be between 0 and 1".to_string(),
            ));
        }
        if !(self.min_size_pct >= 0.0 && self.min_size_pct <= self.max_position_pct) {
            return Err(AnalysisError::InvalidData(
                "min_size_pct must be >= 0 and <= max_position_pct".to_string(),
            ));
        }
        if !(self.kelly_multiplier > 0.0 && self.kelly_multiplier <= 1.0) {
            return Err(AnalysisError::InvalidData(
                "kelly_multiplier must be between 0 and 1".to_string(),
            ));
        }
        if !(self.ewma_lambda > 0.0 && self.ewma_lambda < 1.0) {
            return Err(AnalysisError::InvalidData(
                "ewma_lambda must be in (0, 1)".to_string(),
            ));
        }
        if !(self.target_vol > 0.0
            && self.vol_scalar_min > 0.0
            && self.vol_scalar_min <= self.vol_scalar_max)
        {
            return Err(AnalysisError::InvalidData(
                "volatility target and scalar bounds must be positive and ordered".to_string(),
            ));
        }
        if self.decay_weight_max.is_nan() || self.decay_weight_max < 0.0 {
            return Err(AnalysisError::InvalidData(
                "decay_weight_max must be non-negative".to_string(),
            ));
        }
        if !(self.strength_min >= 0.0 && self.strength_min <= self.strength_max) {
            return Err(AnalysisError::InvalidData(
                "strength band must be ordered".to_string(),
            ));
        }
        if !(self.regime.composite_center > 0.0 && self.regime.band_min <= self.regime.band_max) {
            return Err(AnalysisError::InvalidData(
                "regime center must be positive and band ordered".to_string(),
            ));
        }
        Ok(())
    }
}

/// Win/loss statistics of one algorithm
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlgoStats {
    /// 0.0 to 1.0
    pub win_rate: f64,
    /// Average winning return in percent (positive)
    pub avg_win_pct: f64,
    /// Average losing return in percent (positive magnitude)
    pub avg_loss_pct: f64,
    /// Most recent per-trade returns in percent, oldest first
    #[serde(default)]
    pub recent_returns: Vec<f64>,
}

impl AlgoStats {
    /// Derive statistics from an exit-ordered trade history, keeping the last
    /// `recent_window` returns for the volatility estimate.
    pub fn from_trades(trades: &[Trade], recent_window: usize) -> Self {
        if trades.is_empty() {
            return Self::default();
        }

        let (wins, losses): (Vec<f64>, Vec<f64>) = trades
            .iter()
            .map(|t| t.realized_return_pct)
            .filter(|r| *r != 0.0)
            .partition(|r| *r > 0.0);

        let avg = |values: &[f64]| {
            if values.is_empty() {
                0.0
            } else {
                values.iter().map(|v| v.abs()).sum::<f64>() / values.len() as f64
            }
        };

        let skip = trades.len().saturating_sub(recent_window);
        Self {
            win_rate: wins.len() as f64 / trades.len() as f64,
            avg_win_pct: avg(wins.as_slice()),
            avg_loss_pct: avg(losses.as_slice()),
            recent_returns: trades[skip..].iter().map(|t| t.realized_return_pct).collect(),
        }
    }
}

/// Everything needed to size one signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingRequest {
    /// 0-100; neutral when absent
    pub signal_strength: Option<f64>,
    pub algo_stats: AlgoStats,
    /// Decay detector's recommended weight; neutral when absent
    pub decay_weight: Option<f64>,
    pub regime: Option<RegimeContext>,
    pub capital_usd: f64,
    /// Overrides the configured ceiling for this signal
    #[serde(default)]
    pub max_position_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizingResult {
    pub kelly_base: f64,
    pub vol_scalar: f64,
    pub regime_modifier: f64,
    pub decay_weight: f64,
    pub strength_modifier: f64,
    /// Product of the multipliers before bounding
    pub raw_size: f64,
    pub final_size_pct: f64,
    pub dollar_amount: f64,
    pub reasoning: String,
}

impl SizingResult {
    pub fn payload(&self) -> SizingPayload {
        SizingPayload {
            final_size_pct: self.final_size_pct,
            dollar_amount: self.dollar_amount,
            kelly_base: self.kelly_base,
            vol_scalar: self.vol_scalar,
            regime_modifier: self.regime_modifier,
            decay_weight: self.decay_weight,
            strength_modifier: self.strength_modifier,
        }
    }
}

/// Wire shape of a sizing decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizingPayload {
    pub final_size_pct: f64,
    pub dollar_amount: f64,
    pub kelly_base: f64,
    pub vol_scalar: f64,
    pub regime_modifier: f64,
    pub decay_weight: f64,
    pub strength_modifier: f64,
}

/// Stateless position sizer. Holds only its configuration, which is checked
/// on construction.
#[derive(Debug, Clone, Default)]
pub struct PositionSizer {
    config: SizerConfig,
}

impl PositionSizer {
    pub fn new(config: SizerConfig) -> AnalysisResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SizerConfig {
        &self.config
    }

    /// Fractional Kelly clamped to `[0, max_position_pct]`.
    ///
    /// Zero whenever the win rate or either average is non-positive: there
    /// is no edge estimate to size from.
    pub fn kelly_base(&self, stats: &AlgoStats, max_position_pct: f64) -> f64 {
        let p = stats.win_rate;
        let avg_win = stats.avg_win_pct;
        let avg_loss = stats.avg_loss_pct;
        if !(p.is_finite() && avg_win.is_finite() && avg_loss.is_finite())
            || p <= 0.0
            || avg_win <= 0.0
            || avg_loss <= 0.0
        {
            return 0.0;
        }

        let p = p.min(1.0);
        let q = 1.0 - p;
        let b = avg_win / avg_loss;
        let full_kelly = (p * b - q) / b;

        let fractional = full_kelly * self.config.kelly_multiplier;
        if fractional.is_finite() {
            fractional.clamp(0.0, max_position_pct)
        } else {
            0.0
        }
    }

    /// Linear map of strength 0-100 onto the strength band.
    pub fn strength_modifier(&self, signal_strength: Option<f64>) -> f64 {
        match signal_strength {
            Some(s) if s.is_finite() => {
                let s = s.clamp(0.0, 100.0) / 100.0;
                self.config.strength_min + (self.config.strength_max - self.config.strength_min) * s
            }
            _ => 1.0,
        }
    }

    pub fn vol_scalar(&self, stats: &AlgoStats) -> f64 {
        let returns: Vec<f64> = stats
            .recent_returns
            .iter()
            .filter(|r| r.is_finite())
            .map(|r| r / 100.0)
            .collect();
        volatility::vol_scalar(
            &returns,
            self.config.ewma_lambda,
            self.config.target_vol,
            self.config.vol_scalar_min,
            self.config.vol_scalar_max,
        )
    }

    /// Size one signal.
    ///
    /// The result always lies in `[min_size_pct, max_position_pct]`. Missing
    /// context defaults to neutral multipliers. Negative or non-finite
    /// capital is rejected.
    pub fn size(&self, request: &SizingRequest) -> AnalysisResult<SizingResult> {
        if !request.capital_usd.is_finite() || request.capital_usd < 0.0 {
            return Err(AnalysisError::ContractViolation(format!(
                "capital must be a non-negative amount, got {}",
                request.capital_usd
            )));
        }

        let min_size = self.config.min_size_pct;
        let max_size = request
            .max_position_pct
            .filter(|m| m.is_finite())
            .unwrap_or(self.config.max_position_pct)
            .clamp(min_size, 1.0);

        let kelly_base = self.kelly_base(&request.algo_stats, max_size);
        let vol_scalar = self.vol_scalar(&request.algo_stats);
        let regime_modifier = self.config.regime.modifier(request.regime.as_ref());
        let decay_weight = match request.decay_weight {
            Some(w) if w.is_finite() => w.clamp(0.0, self.config.decay_weight_max),
            _ => 1.0,
        };
        let strength_modifier = self.strength_modifier(request.signal_strength);

        let raw_size = kelly_base * vol_scalar * regime_modifier * decay_weight * strength_modifier;
        let final_size_pct = if raw_size.is_finite() {
            raw_size.clamp(min_size, max_size)
        } else {
            min_size
        };
        let dollar_amount = request.capital_usd * final_size_pct;

        let reasoning = format!(
            "Size: {:.2}% (kelly {:.2}% x vol {:.2} x regime {:.2} x decay {:.2} \
             x strength {:.2} = {:.2}%, win_rate: {:.1}%, avg_win/loss: {:.2}/{:.2})",
            final_size_pct * 100.0,
            kelly_base * 100.0,
            vol_scalar,
            regime_modifier,
            decay_weight,
            strength_modifier,
            raw_size * 100.0,
            request.algo_stats.win_rate * 100.0,
            request.algo_stats.avg_win_pct,
            request.algo_stats.avg_loss_pct,
        );

        debug!(
            kelly_base,
            vol_scalar,
            regime_modifier,
            decay_weight,
            strength_modifier,
            final_size_pct,
            "Position sized"
        );

        Ok(SizingResult {
            kelly_base,
            vol_scalar,
            regime_modifier,
            decay_weight,
            strength_modifier,
            raw_size,
            final_size_pct,
            dollar_amount,
            reasoning,
        })
    }

    /// Correlation budget check over the currently held positions.
    pub fn check_concentration(&self, matrix: &[Vec<f64>]) -> ConcentrationCheck {
        correlation::check_concentration(matrix, self.config.max_dominant_share)
    }
}
