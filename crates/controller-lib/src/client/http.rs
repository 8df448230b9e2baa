//! reqwest-based implementation of the managed-system client

use super::retry::{parse_monitor_body, retry_fetch, RawMonitorData, RetryPolicy};
use super::ManagedSystem;
use crate::error::{AdaptationError, Result};
use crate::knowledge::SchemaKind;
use crate::observability::ControllerMetrics;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};
use url::Url;

const MONITOR_ENDPOINT: &str = "monitor";
const EXECUTE_ENDPOINT: &str = "execute";
const ADAPTATION_OPTIONS_ENDPOINT: &str = "adaptation_options";

/// HTTP client for the managed system's façade
pub struct HttpManagedSystem {
    client: Client,
    base_url: Url,
    retry: RetryPolicy,
    warmed_up: AtomicBool,
    metrics: ControllerMetrics,
}

impl HttpManagedSystem {
    /// Create a new client for `base_url`
    pub fn new(base_url: &str, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder().timeout(retry.request_timeout).build()?;

        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url,
            retry,
            warmed_up: AtomicBool::new(false),
            metrics: ControllerMetrics::new(),
        })
    }

    /// Skip the cold-start delay, e.g. when the managed system is known to
    /// be running already
    pub fn assume_warm(self) -> Self {
        self.warmed_up.store(true, Ordering::SeqCst);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn endpoint(&self, suffix: &str) -> Result<Url> {
        Ok(self.base_url.join(suffix.trim_start_matches('/'))?)
    }

    /// Map 404 and other error statuses onto the error taxonomy
    async fn check_status(url: &Url, response: Response) -> Result<Response> {
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            error!(url = %url, "Endpoint not reachable");
            return Err(AdaptationError::EndpointNotReachable {
                url: url.to_string(),
            });
        }

        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            error!(url = %url, status = status.as_u16(), body = %body, "Request failed");
            return Err(AdaptationError::RemoteFailure {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn get_json(&self, suffix: &str) -> Result<Value> {
        let url = self.endpoint(suffix)?;
        let response = self.client.get(url.clone()).send().await?;
        let response = Self::check_status(&url, response).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// One monitor attempt; every failure mode is transient
    async fn probe_monitor(&self, url: &Url) -> Result<RawMonitorData> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    format!("request timed out after {:?}", self.retry.request_timeout)
                } else {
                    format!("request failed: {}", e)
                };
                AdaptationError::TransientFetchFailure(reason)
            })?;

        if response.status() != StatusCode::OK {
            return Err(AdaptationError::TransientFetchFailure(format!(
                "unexpected status code {}",
                response.status().as_u16()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AdaptationError::TransientFetchFailure(format!("unreadable body: {}", e)))?;

        parse_monitor_body(&body)
    }
}

#[async_trait]
impl ManagedSystem for HttpManagedSystem {
    async fn fetch_schema(&self, kind: SchemaKind) -> Result<Value> {
        let schema = self.get_json(kind.endpoint()).await?;
        info!(schema = %kind, "Fetched schema");
        Ok(schema)
    }

    async fn fetch_monitor_data(&self) -> Result<RawMonitorData> {
        let url = self.endpoint(MONITOR_ENDPOINT)?;

        if !self.warmed_up.swap(true, Ordering::SeqCst) && !self.retry.warmup.is_zero() {
            info!(
                warmup_secs = self.retry.warmup.as_secs(),
                "Managed system may still be starting, waiting before first monitor fetch"
            );
            tokio::time::sleep(self.retry.warmup).await;
        }

        let outcome = retry_fetch(&self.retry, |_| self.probe_monitor(&url)).await;

        if outcome.attempts > 1 {
            self.metrics.inc_monitor_retries(outcome.attempts as u64 - 1);
        }
        if outcome.exhausted {
            warn!(url = %url, attempts = outcome.attempts, "Monitor data unavailable this cycle");
        } else {
            debug!(services = outcome.data.len(), attempts = outcome.attempts, "Monitor data received");
        }

        Ok(outcome.data)
    }

    async fn fetch_adaptation_options(&self) -> Result<Value> {
        self.get_json(ADAPTATION_OPTIONS_ENDPOINT).await
    }

    async fn submit_adaptation(&self, payload: &Value) -> Result<Value> {
        let url = self.endpoint(EXECUTE_ENDPOINT)?;
        let response = self.client.post(url.clone()).json(payload).send().await?;
        let response = Self::check_status(&url, response).await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        info!(status, body = %body, "Execute request succeeded");

        // The body is logged above; callers only get structured responses
        Ok(serde_json::from_str(&body).unwrap_or(Value::Null))
    }

    async fn ping(&self) -> Result<()> {
        let response = self.client.get(self.base_url.clone()).send().await?;
        info!(status = response.status().as_u16(), "Managed system answered ping");
        Ok(())
    }
}
