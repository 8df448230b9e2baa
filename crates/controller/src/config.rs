//! Controller configuration
//!
//! Values come from an optional file named by `MAPEK_CONFIG_FILE`, then
//! from `MAPEK_*` environment variables. Every key has a default.

use anyhow::{bail, Context, Result};
use controller_lib::{
    analyzer::{CapacitySettings, QosThresholds},
    AdaptationPolicy, LoopConfig, PolicyKind, RetryPolicy, ValidationSettings,
};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const ENV_PREFIX: &str = "MAPEK";
const CONFIG_FILE_VAR: &str = "MAPEK_CONFIG_FILE";

#[derive(Debug, Clone, Deserialize)]
pub struct ControllerConfig {
    /// Name attached to structured log events
    #[serde(default = "default_controller_name")]
    pub controller_name: String,

    /// Base URL of the managed system's HTTP façade
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Port of the health/metrics/knowledge API
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default)]
    pub policy: PolicyKind,

    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,

    /// Upper bound on one monitor fetch, retries included
    #[serde(default)]
    pub monitor_deadline_secs: Option<u64>,

    // Monitor retry policy
    #[serde(default = "default_warmup")]
    pub warmup_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    // QoS thresholds
    #[serde(default = "default_availability_floor")]
    pub availability_floor: f64,
    #[serde(default = "default_response_time_ceiling")]
    pub response_time_ceiling: f64,

    // Server/dimmer policy
    #[serde(default)]
    pub target_service: String,
    #[serde(default = "default_min_servers")]
    pub min_servers: u32,
    #[serde(default = "default_max_servers")]
    pub max_servers: u32,
    #[serde(default = "default_dimmer_margin")]
    pub dimmer_margin: f64,
    #[serde(default)]
    pub dimmer_min: f64,
    #[serde(default = "default_dimmer_max")]
    pub dimmer_max: f64,
    #[serde(default = "default_dimmer_max")]
    pub initial_dimmer: f64,

    // Schema validation switches
    #[serde(default = "default_true")]
    pub validate_monitor: bool,
    #[serde(default = "default_true")]
    pub validate_options: bool,
    #[serde(default)]
    pub validate_execute: bool,
}

fn default_controller_name() -> String {
    "mapek-controller".to_string()
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_cycle_interval() -> u64 {
    30
}

fn default_warmup() -> u64 {
    120
}

fn default_max_attempts() -> u32 {
    10
}

fn default_retry_delay() -> u64 {
    3
}

fn default_request_timeout() -> u64 {
    30
}

fn default_availability_floor() -> f64 {
    controller_lib::analyzer::DEFAULT_AVAILABILITY_FLOOR
}

fn default_response_time_ceiling() -> f64 {
    controller_lib::analyzer::DEFAULT_RESPONSE_TIME_CEILING
}

fn default_min_servers() -> u32 {
    1
}

fn default_max_servers() -> u32 {
    3
}

fn default_dimmer_margin() -> f64 {
    0.1
}

fn default_dimmer_max() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

impl ControllerConfig {
    /// Load from `MAPEK_CONFIG_FILE` (if set) and the environment
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_FILE_VAR).ok();
        Self::load_from(file.as_deref().map(Path::new), ENV_PREFIX)
    }

    pub fn load_from(file: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config = builder
            .add_source(config::Environment::with_prefix(env_prefix).try_parsing(true))
            .build()
            .context("failed to read controller configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("invalid controller configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations no policy can work with
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            bail!("max_attempts must be at least 1");
        }
        if self.cycle_interval_secs == 0 {
            bail!("cycle_interval_secs must be at least 1");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be at least 1");
        }
        if !self.dimmer_margin.is_finite() || self.dimmer_margin < 0.0 {
            bail!("dimmer_margin must be a non-negative number, got {}", self.dimmer_margin);
        }
        if self.min_servers > self.max_servers {
            bail!(
                "min_servers ({}) exceeds max_servers ({})",
                self.min_servers,
                self.max_servers
            );
        }
        if self.dimmer_min > self.dimmer_max {
            bail!(
                "dimmer_min ({}) exceeds dimmer_max ({})",
                self.dimmer_min,
                self.dimmer_max
            );
        }
        if self.policy == PolicyKind::ServerDimmer && self.target_service.is_empty() {
            bail!("the server-dimmer policy requires target_service");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            warmup: Duration::from_secs(self.warmup_secs),
            max_attempts: self.max_attempts,
            retry_delay: Duration::from_secs(self.retry_delay_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn thresholds(&self) -> QosThresholds {
        QosThresholds {
            availability_floor: self.availability_floor,
            response_time_ceiling: self.response_time_ceiling,
        }
    }

    pub fn capacity(&self) -> CapacitySettings {
        CapacitySettings {
            target_service: self.target_service.clone(),
            min_servers: self.min_servers,
            max_servers: self.max_servers,
            dimmer_margin: self.dimmer_margin,
            dimmer_min: self.dimmer_min,
            dimmer_max: self.dimmer_max,
            initial_dimmer: self.initial_dimmer,
        }
    }

    pub fn validation(&self) -> ValidationSettings {
        ValidationSettings {
            validate_monitor: self.validate_monitor,
            validate_options: self.validate_options,
            validate_execute: self.validate_execute,
        }
    }

    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            interval: Duration::from_secs(self.cycle_interval_secs),
            max_cycles: None,
        }
    }

    pub fn monitor_deadline(&self) -> Option<Duration> {
        self.monitor_deadline_secs.map(Duration::from_secs)
    }

    pub fn build_policy(&self) -> Box<dyn AdaptationPolicy> {
        self.policy.build(self.thresholds(), self.capacity())
    }
}
