use alpha_decay::{DecayConfig, EngineKind};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use track_record_validator::ValidatorConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// JSON array of trade records
    pub trades_path: PathBuf,
    /// Payload destination; stdout when unset
    pub output_path: Option<PathBuf>,
    /// Optional HTTP POST target for the batch payload
    pub ingest_url: Option<String>,
    pub ingest_timeout_secs: u64,
    /// Strategies tested in total; defaults to the number loaded
    pub n_total_algorithms: Option<usize>,
    pub validator: ValidatorConfig,
    pub decay: DecayConfig,
}

impl RunnerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build from any variable source; `from_env` reads the process
    /// environment.
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let validator = ValidatorConfig {
            n_splits: get("VALIDATOR_N_SPLITS", "5")
                .parse()
                .context("VALIDATOR_N_SPLITS must be an integer")?,
            embargo_pct: get("VALIDATOR_EMBARGO_PCT", "0.02")
                .parse()
                .context("VALIDATOR_EMBARGO_PCT must be a number")?,
            ..Default::default()
        };
        validator.validate()?;

        let decay = DecayConfig {
            engine: get("DECAY_ENGINE", "pelt").parse::<EngineKind>()?,
            penalty: get("DECAY_PENALTY", "1.5")
                .parse()
                .context("DECAY_PENALTY must be a number")?,
            min_segment_size: get("DECAY_MIN_SEGMENT_SIZE", "8")
                .parse()
                .context("DECAY_MIN_SEGMENT_SIZE must be an integer")?,
            cusum_threshold: get("CUSUM_THRESHOLD", "5.0")
                .parse()
                .context("CUSUM_THRESHOLD must be a number")?,
            cusum_slack: get("CUSUM_SLACK", "0.5")
                .parse()
                .context("CUSUM_SLACK must be a number")?,
            ..Default::default()
        };
        decay.validate()?;

        let n_total_algorithms = match var("N_TOTAL_ALGORITHMS") {
            Some(raw) => Some(raw.parse().context("N_TOTAL_ALGORITHMS must be an integer")?),
            None => None,
        };

        Ok(Self {
            trades_path: var("TRADES_PATH").context("TRADES_PATH not set")?.into(),
            output_path: var("OUTPUT_PATH").filter(|s| !s.is_empty()).map(PathBuf::from),
            ingest_url: var("INGEST_URL").filter(|s| !s.is_empty()),
            ingest_timeout_secs: get("INGEST_TIMEOUT_SECS", "30")
                .parse()
                .context("INGEST_TIMEOUT_SECS must be an integer")?,
            n_total_algorithms,
            validator,
            decay,
        })
    }
}
