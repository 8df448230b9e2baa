//! Observability infrastructure for the adaptation controller
//!
//! Provides:
//! - Prometheus metrics (cycle latency, retries, violations, submissions)
//! - Event-tagged structured logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Cycle latency buckets in seconds; a cycle includes monitor retry sleeps
const CYCLE_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 180.0];

static GLOBAL_METRICS: OnceLock<ControllerMetricsInner> = OnceLock::new();

struct ControllerMetricsInner {
    cycle_latency_seconds: Histogram,
    cycles: IntCounterVec,
    monitor_retries: IntCounter,
    qos_violations: IntCounter,
    adaptations_submitted: IntCounterVec,
    execute_failures: IntCounter,
    last_plan_size: IntGauge,
}

impl ControllerMetricsInner {
    fn new() -> Self {
        Self {
            cycle_latency_seconds: register_histogram!(
                "mapek_cycle_latency_seconds",
                "Wall time of one monitor-analyze-plan-execute cycle",
                CYCLE_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_latency_seconds"),

            cycles: register_int_counter_vec!(
                "mapek_cycles_total",
                "Adaptation cycles by outcome",
                &["outcome"]
            )
            .expect("Failed to register cycles_total"),

            monitor_retries: register_int_counter!(
                "mapek_monitor_retries_total",
                "Monitor fetch attempts beyond the first"
            )
            .expect("Failed to register monitor_retries_total"),

            qos_violations: register_int_counter!(
                "mapek_qos_violations_total",
                "Services found needing adaptation"
            )
            .expect("Failed to register qos_violations_total"),

            adaptations_submitted: register_int_counter_vec!(
                "mapek_adaptations_submitted_total",
                "Adaptation requests accepted by the managed system",
                &["operation"]
            )
            .expect("Failed to register adaptations_submitted_total"),

            execute_failures: register_int_counter!(
                "mapek_execute_failures_total",
                "Execute phases aborted by the managed system"
            )
            .expect("Failed to register execute_failures_total"),

            last_plan_size: register_int_gauge!(
                "mapek_last_plan_size",
                "Number of submissions in the most recent plan"
            )
            .expect("Failed to register last_plan_size"),
        }
    }
}

/// Handle to the process-wide controller metrics.
///
/// Clones share the same underlying collectors.
#[derive(Clone)]
pub struct ControllerMetrics {
    _private: (),
}

impl Default for ControllerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ControllerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ControllerMetricsInner {
        GLOBAL_METRICS.get_or_init(ControllerMetricsInner::new)
    }

    pub fn observe_cycle_latency(&self, duration_secs: f64) {
        self.inner().cycle_latency_seconds.observe(duration_secs);
    }

    /// Count a finished cycle, e.g. `executed`, `no_adaptation`, `skipped`
    pub fn inc_cycles(&self, outcome: &str) {
        self.inner().cycles.with_label_values(&[outcome]).inc();
    }

    pub fn inc_monitor_retries(&self, retries: u64) {
        self.inner().monitor_retries.inc_by(retries);
    }

    pub fn inc_qos_violations(&self, violations: u64) {
        self.inner().qos_violations.inc_by(violations);
    }

    pub fn inc_adaptations_submitted(&self, operation: &str) {
        self.inner()
            .adaptations_submitted
            .with_label_values(&[operation])
            .inc();
    }

    pub fn inc_execute_failures(&self) {
        self.inner().execute_failures.inc();
    }

    pub fn set_last_plan_size(&self, size: i64) {
        self.inner().last_plan_size.set(size);
    }
}

/// Structured logger for controller events
#[derive(Clone)]
pub struct StructuredLogger {
    controller_name: String,
}

impl StructuredLogger {
    pub fn new(controller_name: impl Into<String>) -> Self {
        Self {
            controller_name: controller_name.into(),
        }
    }

    pub fn log_startup(&self, version: &str, policy: &str, base_url: &str) {
        info!(
            event = "controller_started",
            controller = %self.controller_name,
            version = %version,
            policy = %policy,
            base_url = %base_url,
            "Adaptation controller started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "controller_shutdown",
            controller = %self.controller_name,
            reason = %reason,
            "Adaptation controller shutting down"
        );
    }

    pub fn log_cycle_started(&self, cycle: u64) {
        info!(
            event = "cycle_started",
            controller = %self.controller_name,
            cycle = cycle,
            "Adaptation cycle started"
        );
    }

    pub fn log_cycle_finished(&self, cycle: u64, outcome: &str, elapsed_ms: u128) {
        info!(
            event = "cycle_finished",
            controller = %self.controller_name,
            cycle = cycle,
            outcome = %outcome,
            elapsed_ms = elapsed_ms as u64,
            "Adaptation cycle finished"
        );
    }

    pub fn log_adaptation_submitted(&self, operation: &str, target: &str) {
        info!(
            event = "adaptation_submitted",
            controller = %self.controller_name,
            operation = %operation,
            target = %target,
            "Adaptation request accepted"
        );
    }

    pub fn log_execute_failed(&self, submitted: usize, error: &str) {
        warn!(
            event = "execute_failed",
            controller = %self.controller_name,
            submitted = submitted,
            error = %error,
            "Execute aborted, remaining requests not sent"
        );
    }

    pub fn log_monitor_unavailable(&self, cycle: u64) {
        warn!(
            event = "monitor_unavailable",
            controller = %self.controller_name,
            cycle = cycle,
            "No monitor data this cycle, skipping"
        );
    }
}
