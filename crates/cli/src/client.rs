//! API client for a running controller daemon

use anyhow::{Context, Result};
use controller_lib::{HealthResponse, ReadinessResponse};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

/// API client for the controller daemon's health and knowledge routes
pub struct DaemonClient {
    client: Client,
    base_url: Url,
}

impl DaemonClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid daemon URL")?;

        Ok(Self { client, base_url })
    }

    /// GET `path`, also decoding the body of a 503.
    ///
    /// Health routes answer 503 with a regular JSON body when the
    /// controller is unhealthy or not ready.
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to reach controller daemon")?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::SERVICE_UNAVAILABLE {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        self.get("healthz").await
    }

    pub async fn readiness(&self) -> Result<ReadinessResponse> {
        self.get("readyz").await
    }

    pub async fn knowledge(&self) -> Result<Value> {
        self.get("knowledge").await
    }
}
