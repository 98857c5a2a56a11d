use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};

/// Asset class of the traded instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    #[serde(alias = "stocks", alias = "equity")]
    Stock,
    Etf,
    Crypto,
    Forex,
    #[serde(alias = "commodities")]
    Commodity,
    #[serde(other)]
    Other,
}

impl AssetClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Stock => "stock",
            AssetClass::Etf => "etf",
            AssetClass::Crypto => "crypto",
            AssetClass::Forex => "forex",
            AssetClass::Commodity => "commodity",
            AssetClass::Other => "other",
        }
    }
}

/// A closed trade produced by one algorithm.
///
/// Trades are immutable once created. Every time-series computation in the
/// workspace assumes a slice of trades ordered by `exit_time` ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub algorithm_id: String,
    pub asset_class: AssetClass,
    pub symbol: String,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    /// Signed return in percent (2.5 = +2.5%)
    pub realized_return_pct: f64,
    #[serde(default)]
    pub realized_pnl_usd: Option<f64>,
    /// Signal strength at entry, 0-100
    #[serde(default)]
    pub signal_strength: Option<f64>,
}

impl Trade {
    /// Return as a fraction (0.025 = +2.5%)
    pub fn return_fraction(&self) -> f64 {
        self.realized_return_pct / 100.0
    }

    pub fn is_win(&self) -> bool {
        self.realized_return_pct > 0.0
    }

    /// Build a trade from its wire representation.
    pub fn from_record(record: &TradeRecord) -> AnalysisResult<Self> {
        let entry_time = parse_timestamp(&record.entry_time)?;
        let exit_time = parse_timestamp(&record.exit_time)?;

        if exit_time < entry_time {
            return Err(AnalysisError::ContractViolation(format!(
                "{} {}: exit_time {} precedes entry_time {}",
                record.algorithm_name, record.symbol, record.exit_time, record.entry_time
            )));
        }
        if !record.realized_pct.is_finite() {
            return Err(AnalysisError::InvalidData(format!(
                "{} {}: realized_pct is not finite",
                record.algorithm_name, record.symbol
            )));
        }

        Ok(Self {
            algorithm_id: record.algorithm_name.clone(),
            asset_class: record.asset_class,
            symbol: record.symbol.clone(),
            entry_time,
            exit_time,
            realized_return_pct: record.realized_pct,
            realized_pnl_usd: record.realized_pnl_usd,
            signal_strength: record.signal_strength.map(|s| s.clamp(0.0, 100.0)),
        })
    }
}

/// Trade as delivered by the trade history store (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub algorithm_name: String,
    pub asset_class: AssetClass,
    pub symbol: String,
    /// ISO-8601
    pub entry_time: String,
    /// ISO-8601
    pub exit_time: String,
    pub realized_pct: f64,
    #[serde(default)]
    pub realized_pnl_usd: Option<f64>,
    #[serde(default)]
    pub signal_strength: Option<f64>,
}

/// Parse RFC 3339 timestamps, falling back to naive `YYYY-MM-DD HH:MM:SS`
/// (interpreted as UTC) which is what the SQL backend emits.
pub fn parse_timestamp(raw: &str) -> AnalysisResult<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(naive.and_utc());
        }
    }
    Err(AnalysisError::InvalidData(format!(
        "unparseable timestamp '{}'",
        raw
    )))
}

/// Sort trades by `exit_time` ascending. Stable, so trades closed at the
/// same instant keep their delivery order.
pub fn sort_chronologically(trades: &mut [Trade]) {
    trades.sort_by_key(|t| t.exit_time);
}

/// Reject trade sequences that are not ordered by `exit_time`.
pub fn ensure_chronological(trades: &[Trade]) -> AnalysisResult<()> {
    if let Some(i) = trades
        .windows(2)
        .position(|w| w[1].exit_time < w[0].exit_time)
    {
        return Err(AnalysisError::ContractViolation(format!(
            "trades not ordered by exit_time at index {} ({} after {})",
            i + 1,
            trades[i + 1].exit_time,
            trades[i].exit_time
        )));
    }
    Ok(())
}

/// Per-trade returns as fractions, in trade order.
pub fn return_fractions(trades: &[Trade]) -> Vec<f64> {
    trades.iter().map(Trade::return_fraction).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record(exit: &str) -> TradeRecord {
        TradeRecord {
            algorithm_name: "momentum_v2".to_string(),
            asset_class: AssetClass::Crypto,
            symbol: "BTC".to_string(),
            entry_time: "2024-03-01T00:00:00Z".to_string(),
            exit_time: exit.to_string(),
            realized_pct: 1.5,
            realized_pnl_usd: None,
            signal_strength: Some(140.0),
        }
    }

    #[test]
    fn test_from_record_parses_and_clamps() {
        let trade = Trade::from_record(&record("2024-03-02T12:00:00+00:00")).unwrap();
        assert_eq!(trade.exit_time - trade.entry_time, Duration::hours(36));
        assert_eq!(trade.signal_strength, Some(100.0));
        assert!((trade.return_fraction() - 0.015).abs() < 1e-12);
    }

    #[test]
    fn test_naive_timestamp_accepted() {
        let ts = parse_timestamp("2024-03-02 08:30:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 3, 2, 8, 30, 0).unwrap());
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_exit_before_entry_rejected() {
        let err = Trade::from_record(&record("2024-02-28T00:00:00Z")).unwrap_err();
        assert!(matches!(err, AnalysisError::ContractViolation(_)));
    }

    #[test]
    fn test_asset_class_aliases() {
        let parsed: AssetClass = serde_json::from_str("\"stocks\"").unwrap();
        assert_eq!(parsed, AssetClass::Stock);
        let unknown: AssetClass = serde_json::from_str("\"prediction_market\"").unwrap();
        assert_eq!(unknown, AssetClass::Other);
    }

    #[test]
    fn test_sort_and_ensure_chronological() {
        let mut trades: Vec<Trade> = ["2024-03-05T00:00:00Z", "2024-03-03T00:00:00Z"]
            .iter()
            .map(|ts| Trade::from_record(&record(ts)).unwrap())
            .collect();

        assert!(ensure_chronological(&trades).is_err());
        sort_chronologically(&mut trades);
        assert!(ensure_chronological(&trades).is_ok());
        assert!(trades[0].exit_time < trades[1].exit_time);
    }
}
