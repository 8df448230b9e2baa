//! Retry policy for monitor polling
//!
//! The managed system starts slowly and answers with a near-empty placeholder
//! document until it is ready. Each attempt is classified as either a usable
//! payload or a transient failure; after the configured number of attempts
//! the caller gets an empty mapping instead of an error.

use crate::error::{AdaptationError, Result};
use serde_json::{Map, Value};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Raw monitor document, keyed by service identifier
pub type RawMonitorData = Map<String, Value>;

/// Monitor retry configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first monitor fetch of the client's lifetime
    pub warmup: Duration,
    /// Maximum number of attempts per monitor call
    pub max_attempts: u32,
    /// Delay between two consecutive attempts
    pub retry_delay: Duration,
    /// Bound on each individual request
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            warmup: Duration::from_secs(120),
            max_attempts: 10,
            retry_delay: Duration::from_secs(3),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Policy without any sleeping, for tests and one-shot tools
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            warmup: Duration::ZERO,
            max_attempts,
            retry_delay: Duration::ZERO,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Result of a retried monitor fetch
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    /// Empty when every attempt failed
    pub data: RawMonitorData,
    /// Number of attempts made
    pub attempts: u32,
    pub exhausted: bool,
}

/// Classify a 200 response body.
///
/// Not-ready sentinels (empty object or a single top-level key), non-JSON
/// bodies and non-object documents are transient failures.
pub fn parse_monitor_body(body: &str) -> Result<RawMonitorData> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| AdaptationError::TransientFetchFailure(format!("invalid JSON body: {}", e)))?;

    match value {
        Value::Object(map) if map.len() > 1 => Ok(map),
        Value::Object(map) => Err(AdaptationError::TransientFetchFailure(format!(
            "managed system not ready ({} top-level keys)",
            map.len()
        ))),
        other => Err(AdaptationError::TransientFetchFailure(format!(
            "expected a JSON object, got {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Run `attempt` until it yields data or the policy is exhausted.
///
/// `attempt` receives the 1-based attempt number. The warm-up delay is not
/// applied here; callers decide when the managed system may still be cold.
pub async fn retry_fetch<F, Fut>(policy: &RetryPolicy, mut attempt: F) -> FetchOutcome
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<RawMonitorData>>,
{
    let max_attempts = policy.max_attempts.max(1);

    for number in 1..=max_attempts {
        debug!(attempt = number, max_attempts, "Fetching monitor data");

        match attempt(number).await {
            Ok(data) => {
                return FetchOutcome {
                    data,
                    attempts: number,
                    exhausted: false,
                }
            }
            Err(e) => {
                warn!(attempt = number, max_attempts, error = %e, "Monitor attempt failed");
            }
        }

        if number < max_attempts && !policy.retry_delay.is_zero() {
            tokio::time::sleep(policy.retry_delay).await;
        }
    }

    warn!(
        attempts = max_attempts,
        "Failed to fetch monitor data after maximum retries, returning empty snapshot"
    );

    FetchOutcome {
        data: RawMonitorData::new(),
        attempts: max_attempts,
        exhausted: true,
    }
}
