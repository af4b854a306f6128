use std::time::Duration;

use async_trait::async_trait;

use super::batch::Batch;
use crate::error::SubmissionError;

pub const DEFAULT_ENDPOINT: &str = "https://metrics-api.librato.com/v1/metrics";

/// Boundary that ships a finished batch somewhere.
#[async_trait]
pub trait Submit: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the batch could not be delivered.
    async fn submit(&self, batch: Batch) -> Result<(), SubmissionError>;
}

/// Librato account credentials, sent as HTTP basic auth.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Posts batches to the Librato metrics API.
#[derive(Debug, Clone)]
pub struct LibratoClient {
    http: reqwest::Client,
    endpoint: String,
    credentials: Credentials,
}

impl LibratoClient {
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, SubmissionError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| SubmissionError::ClientBuild { source })?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            credentials,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Submit for LibratoClient {
    async fn submit(&self, batch: Batch) -> Result<(), SubmissionError> {
        if batch.is_empty() {
            tracing::debug!(source = %batch.source, "skipping empty batch");
            return Ok(());
        }

        let measurements = batch.len();
        let response = self
            .http
            .post(&self.endpoint)
            .basic_auth(&self.credentials.email, Some(&self.credentials.token))
            .json(&batch)
            .send()
            .await
            .map_err(|source| SubmissionError::Transport {
                endpoint: self.endpoint.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SubmissionError::Status { status, body });
        }

        tracing::debug!(measurements, %status, "submitted batch");
        Ok(())
    }
}

/// Dry-run submitter: logs each batch as JSON instead of sending it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSubmitter;

#[async_trait]
impl Submit for LogSubmitter {
    async fn submit(&self, batch: Batch) -> Result<(), SubmissionError> {
        let json =
            serde_json::to_string(&batch).map_err(|source| SubmissionError::Encode { source })?;
        tracing::info!(measurements = batch.len(), batch = %json, "dry run");
        Ok(())
    }
}
