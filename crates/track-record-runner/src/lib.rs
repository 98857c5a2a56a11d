//! Batch job around the validator and decay detector: loads trade history,
//! evaluates every algorithm in parallel, caches the reports for the sizer
//! and publishes the JSON payloads.

pub mod batch;
pub mod cache;
pub mod config;
pub mod ingest;
pub mod loader;
pub mod payload;

pub use batch::{run_batch, AlgorithmReport, BatchOutcome};
pub use cache::{AlgorithmState, ReportCache};
pub use config::RunnerConfig;
pub use ingest::IngestClient;
pub use loader::{group_by_algorithm, load_records, parse_records, LoadedTrades};
pub use payload::{AlgorithmPayload, BatchPayload};
