use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use crate::payload::BatchPayload;

/// Posts batch payloads to the API's ingestion endpoint.
pub struct IngestClient {
    client: Client,
    url: String,
}

impl IngestClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn publish(&self, payload: &BatchPayload) -> Result<()> {
        debug!(url = %self.url, algorithms = payload.n_algorithms, "Publishing batch payload");

        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("POST to {} failed", self.url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ingestion endpoint returned {}: {}", status, body);
        }

        info!(url = %self.url, %status, "Batch payload ingested");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_client_builds() {
        let client =
            IngestClient::new("http://localhost:8080/api/ingest", Duration::from_secs(30)).unwrap();
        assert_eq!(client.url(), "http://localhost:8080/api/ingest");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        // Port 9 (discard) on loopback is not expected to serve HTTP
        let client =
            IngestClient::new("http://127.0.0.1:9/ingest", Duration::from_secs(2)).unwrap();
        let payload = BatchPayload {
            generated_at: Utc::now(),
            n_algorithms: 0,
            algorithms: Vec::new(),
        };
        assert!(client.publish(&payload).await.is_err());
    }
}
