//! CLI command implementations

pub mod adapt;
pub mod daemon;
pub mod inspect;
pub mod settings;

use crate::output::OutputFormat;
use anyhow::{Context, Result};
use controller_lib::{HttpManagedSystem, RetryPolicy};
use tracing::debug;

/// Global options shared by the commands that talk to the managed system
pub struct Session {
    pub base_url: String,
    pub format: OutputFormat,
    pub cold_start: bool,
    pub attempts: u32,
}

impl Session {
    /// Client for the managed system. The warm-up delay only applies with
    /// `--cold-start`.
    pub fn managed_system(&self) -> Result<HttpManagedSystem> {
        let retry = RetryPolicy {
            max_attempts: self.attempts.max(1),
            ..RetryPolicy::default()
        };

        let client = HttpManagedSystem::new(&self.base_url, retry)
            .with_context(|| format!("Invalid managed system URL '{}'", self.base_url))?;
        debug!(base_url = %self.base_url, attempts = self.attempts, cold_start = self.cold_start, "Managed system client ready");

        Ok(if self.cold_start {
            client
        } else {
            client.assume_warm()
        })
    }
}
