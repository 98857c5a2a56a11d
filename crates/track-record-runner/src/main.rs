use alpha_decay::DecayDetector;
use anyhow::{Context, Result};
use chrono::Utc;
use std::time::Duration;
use tracing::{error, info};
use track_record_runner::{
    group_by_algorithm, load_records, run_batch, BatchPayload, IngestClient, RunnerConfig,
};
use track_record_validator::TrackRecordValidator;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    let config = RunnerConfig::from_env()?;
    info!(
        trades = %config.trades_path.display(),
        engine = config.decay.engine.as_str(),
        n_splits = config.validator.n_splits,
        "Starting track record batch"
    );

    let records = load_records(&config.trades_path)?;
    let loaded = group_by_algorithm(&records);

    let validator = TrackRecordValidator::new(config.validator.clone())?;
    let detector = DecayDetector::new(config.decay.clone())?;
    let n_total = config.n_total_algorithms;

    // CPU-bound; keep it off the async workers
    let outcome = tokio::task::spawn_blocking(move || {
        run_batch(&loaded.by_algorithm, &validator, &detector, n_total)
    })
    .await
    .context("Batch task panicked")?;

    for (algorithm_id, e) in &outcome.failures {
        error!(algorithm = %algorithm_id, "Not published: {}", e);
    }

    let payload = BatchPayload::from_reports(&outcome.reports, Utc::now());
    let body = serde_json::to_string_pretty(&payload)?;

    match &config.output_path {
        Some(path) => {
            std::fs::write(path, &body)
                .with_context(|| format!("Failed to write payload to {}", path.display()))?;
            info!(path = %path.display(), "Payload written");
        }
        None => println!("{}", body),
    }

    if let Some(url) = &config.ingest_url {
        let client =
            IngestClient::new(url.clone(), Duration::from_secs(config.ingest_timeout_secs))?;
        client.publish(&payload).await?;
    }

    info!(
        algorithms = payload.n_algorithms,
        failed = outcome.failures.len(),
        "Track record batch finished"
    );
    Ok(())
}
