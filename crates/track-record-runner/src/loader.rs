use analysis_core::{sort_chronologically, Trade, TradeRecord};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// Trades grouped per algorithm, each group ordered by `exit_time`
#[derive(Debug, Clone, Default)]
pub struct LoadedTrades {
    pub by_algorithm: BTreeMap<String, Vec<Trade>>,
    /// Records rejected at parse time
    pub skipped: usize,
}

impl LoadedTrades {
    pub fn n_algorithms(&self) -> usize {
        self.by_algorithm.len()
    }

    pub fn n_trades(&self) -> usize {
        self.by_algorithm.values().map(Vec::len).sum()
    }
}

pub fn load_records(path: &Path) -> Result<Vec<TradeRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read trades from {}", path.display()))?;
    parse_records(&raw).with_context(|| format!("Invalid trade JSON in {}", path.display()))
}

pub fn parse_records(raw: &str) -> Result<Vec<TradeRecord>> {
    Ok(serde_json::from_str(raw)?)
}

/// Convert records to trades and group them per algorithm.
///
/// Malformed records (bad timestamps, exit before entry, non-finite
/// returns) are skipped with a warning rather than failing the batch.
pub fn group_by_algorithm(records: &[TradeRecord]) -> LoadedTrades {
    let mut loaded = LoadedTrades::default();

    for record in records {
        match Trade::from_record(record) {
            Ok(trade) => loaded
                .by_algorithm
                .entry(trade.algorithm_id.clone())
                .or_default()
                .push(trade),
            Err(e) => {
                warn!(
                    algorithm = %record.algorithm_name,
                    symbol = %record.symbol,
                    "Skipping trade: {}",
                    e
                );
                loaded.skipped += 1;
            }
        }
    }

    for trades in loaded.by_algorithm.values_mut() {
        sort_chronologically(trades);
    }

    info!(
        algorithms = loaded.n_algorithms(),
        trades = loaded.n_trades(),
        skipped = loaded.skipped,
        "Loaded trade history"
    );
    loaded
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {"algorithm_name": "rsi_reversal", "asset_class": "stock", "symbol": "AAPL",
         "entry_time": "2024-01-03T14:30:00Z", "exit_time": "2024-01-05T20:00:00Z",
         "realized_pct": 1.5, "realized_pnl_usd": 150.0, "signal_strength": 72},
        {"algorithm_name": "rsi_reversal", "asset_class": "stock", "symbol": "MSFT",
         "entry_time": "2024-01-02 14:30:00", "exit_time": "2024-01-04 20:00:00",
         "realized_pct": -0.8, "realized_pnl_usd": null, "signal_strength": null},
        {"algorithm_name": "whale_flow", "asset_class": "crypto", "symbol": "ETH",
         "entry_time": "2024-01-02T00:00:00Z", "exit_time": "2024-01-02T06:00:00Z",
         "realized_pct": 3.1},
        {"algorithm_name": "whale_flow", "asset_class": "crypto", "symbol": "SOL",
         "entry_time": "2024-01-09T00:00:00Z", "exit_time": "2024-01-08T00:00:00Z",
         "realized_pct": 0.4}
    ]"#;

    #[test]
    fn test_groups_sorts_and_skips() {
        let records = parse_records(SAMPLE).unwrap();
        assert_eq!(records.len(), 4);

        let loaded = group_by_algorithm(&records);
        assert_eq!(loaded.n_algorithms(), 2);
        assert_eq!(loaded.skipped, 1);

        let rsi = &loaded.by_algorithm["rsi_reversal"];
        assert_eq!(rsi.len(), 2);
        // Delivered out of order, sorted by exit time
        assert_eq!(rsi[0].symbol, "MSFT");
        assert_eq!(rsi[1].signal_strength, Some(72.0));
        assert_eq!(loaded.by_algorithm["whale_flow"].len(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_records(Path::new("/nonexistent/trades.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read trades"));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(parse_records("{\"not\": \"an array\"}").is_err());
    }
}
