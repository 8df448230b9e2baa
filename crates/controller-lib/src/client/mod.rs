//! Client for the managed system's HTTP boundary
//!
//! This module provides:
//! - the `ManagedSystem` trait consumed by the controller phases
//! - an HTTP implementation backed by reqwest
//! - the monitor retry policy (warm-up, bounded attempts, not-ready sentinel)

mod http;
mod retry;


pub use http::HttpManagedSystem;
pub use retry::{parse_monitor_body, retry_fetch, FetchOutcome, RawMonitorData, RetryPolicy};

use crate::error::Result;
use crate::knowledge::SchemaKind;
use async_trait::async_trait;
use serde_json::Value;

/// Operations the controller performs against the managed system.
///
/// Test doubles implement this trait to feed synthetic telemetry into the
/// loop without a running system.
#[async_trait]
pub trait ManagedSystem: Send + Sync {
    /// GET one of the published schemas
    async fn fetch_schema(&self, kind: SchemaKind) -> Result<Value>;

    /// GET the current architecture snapshot, retrying while the system is
    /// cold. Returns an empty mapping once the retries are exhausted.
    async fn fetch_monitor_data(&self) -> Result<RawMonitorData>;

    /// GET the adaptation-option catalog
    async fn fetch_adaptation_options(&self) -> Result<Value>;

    /// POST a single adaptation payload to the execute endpoint
    async fn submit_adaptation(&self, payload: &Value) -> Result<Value>;

    /// Check that the managed system answers at all
    async fn ping(&self) -> Result<()>;
}
