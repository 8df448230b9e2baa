//! The MAPE-K phase operations over shared knowledge
//!
//! A cycle is `monitor → analyze → plan → execute`. `monitor` starts a new
//! cycle; every later phase requires its predecessor to have completed in
//! the same cycle. Analyze and plan report failures as `false` and leave
//! the knowledge of the previous cycle untouched.

mod r#loop;

pub use r#loop::{AdaptationLoop, LoopConfig, LoopExit};

use crate::client::{ManagedSystem, RawMonitorData};
use crate::error::{AdaptationError, Result};
use crate::executor::{ExecutionReport, Executor};
use crate::knowledge::{KnowledgeStore, SchemaKind};
use crate::models::{AdaptationOptions, MonitoredData, PlanData};
use crate::observability::{ControllerMetrics, StructuredLogger};
use crate::policy::AdaptationPolicy;
use crate::schema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Which documents are checked against the managed system's schemas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSettings {
    pub validate_monitor: bool,
    pub validate_options: bool,
    pub validate_execute: bool,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            validate_monitor: true,
            validate_options: true,
            validate_execute: false,
        }
    }
}

/// Last completed phase of the current cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CyclePhase {
    Idle,
    Monitored,
    Analyzed,
    Planned,
}

impl CyclePhase {
    fn as_str(&self) -> &'static str {
        match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Monitored => "monitor",
            CyclePhase::Analyzed => "analyze",
            CyclePhase::Planned => "plan",
        }
    }
}

/// How a full cycle ended
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The managed system produced no usable snapshot
    MonitorUnavailable,
    /// Analysis raised; the previous analysis is kept
    AnalysisFailed,
    /// Planning raised; the previous plan is kept
    PlanningFailed,
    /// Analysis found nothing to do, or no plan was produced
    NoAdaptation,
    /// A plan is ready but was not submitted (dry run)
    Planned,
    Executed(ExecutionReport),
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::MonitorUnavailable => "monitor_unavailable",
            CycleOutcome::AnalysisFailed => "analysis_failed",
            CycleOutcome::PlanningFailed => "planning_failed",
            CycleOutcome::NoAdaptation => "no_adaptation",
            CycleOutcome::Planned => "planned",
            CycleOutcome::Executed(_) => "executed",
        }
    }
}

/// A gated cycle together with the last phase it completed.
///
/// `completed` tells a monitor error (`Idle`) from an execute error
/// (`Planned`), and "nothing to do" after analyze from a failed plan.
#[derive(Debug)]
pub struct CycleTrace {
    pub completed: CyclePhase,
    pub outcome: Result<CycleOutcome>,
}

pub struct Controller {
    client: Arc<dyn ManagedSystem>,
    knowledge: KnowledgeStore,
    policy: Box<dyn AdaptationPolicy>,
    validation: ValidationSettings,
    monitor_deadline: Option<Duration>,
    phase: CyclePhase,
    metrics: ControllerMetrics,
    logger: StructuredLogger,
}

impl Controller {
    pub fn new(client: Arc<dyn ManagedSystem>, policy: Box<dyn AdaptationPolicy>) -> Self {
        Self {
            client,
            knowledge: KnowledgeStore::new(),
            policy,
            validation: ValidationSettings::default(),
            monitor_deadline: None,
            phase: CyclePhase::Idle,
            metrics: ControllerMetrics::new(),
            logger: StructuredLogger::new("mapek-controller"),
        }
    }

    /// Share an existing store, e.g. with the daemon's HTTP API
    pub fn with_knowledge(mut self, knowledge: KnowledgeStore) -> Self {
        self.knowledge = knowledge;
        self
    }

    pub fn with_validation(mut self, validation: ValidationSettings) -> Self {
        self.validation = validation;
        self
    }

    /// Bound the whole monitor fetch, retries included. An expired
    /// deadline counts as no data.
    pub fn with_monitor_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.monitor_deadline = deadline;
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn knowledge(&self) -> &KnowledgeStore {
        &self.knowledge
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    fn require(&self, phase: &'static str, requires: CyclePhase) -> Result<()> {
        if self.phase < requires {
            return Err(AdaptationError::PhaseOutOfOrder {
                phase,
                requires: requires.as_str(),
            });
        }
        Ok(())
    }

    /// Cached schema, fetched on first use
    pub async fn schema(&self, kind: SchemaKind) -> Result<Value> {
        if let Some(schema) = self.knowledge.read().await.schema(kind) {
            return Ok(schema.clone());
        }

        let schema = self.client.fetch_schema(kind).await?;
        self.knowledge.write().await.set_schema(kind, schema.clone());
        Ok(schema)
    }

    /// Validate `document` against the `kind` schema. A violation against a
    /// cached copy drops it and retries once with a freshly fetched schema.
    async fn validate_against(&self, kind: SchemaKind, document: &Value) -> Result<()> {
        let cached = self.knowledge.read().await.schema(kind).is_some();
        let schema = self.schema(kind).await?;

        match schema::validate(document, &schema) {
            Err(AdaptationError::SchemaViolation { .. }) if cached => {
                warn!(%kind, "Cached schema rejected the document, refetching");
                self.knowledge.write().await.schemas_mut().invalidate(kind);
                let fresh = self.schema(kind).await?;
                schema::validate(document, &fresh)
            }
            result => result,
        }
    }

    /// Cached adaptation-option catalog, fetched and validated on first use
    pub async fn adaptation_options(&self) -> Result<AdaptationOptions> {
        {
            let knowledge = self.knowledge.read().await;
            if !knowledge.adaptation_options().is_empty() {
                return Ok(knowledge.adaptation_options().clone());
            }
        }

        let catalog = self.client.fetch_adaptation_options().await?;
        if self.validation.validate_options {
            self.validate_against(SchemaKind::AdaptationOptions, &catalog)
                .await?;
        }

        let options = AdaptationOptions(catalog);
        self.knowledge
            .write()
            .await
            .set_adaptation_options(options.clone());
        Ok(options)
    }

    /// Fetch, validate and store a new snapshot. Starts a new cycle.
    ///
    /// Returns `false` when the managed system had no data after all
    /// retries; knowledge then keeps the previous snapshot.
    pub async fn monitor(&mut self) -> Result<bool> {
        self.phase = CyclePhase::Idle;

        let fetch = self.client.fetch_monitor_data();
        let raw = match self.monitor_deadline {
            Some(deadline) => match tokio::time::timeout(deadline, fetch).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(deadline_secs = deadline.as_secs(), "Monitor deadline exceeded");
                    RawMonitorData::new()
                }
            },
            None => fetch.await?,
        };
        if raw.is_empty() {
            warn!("Monitor returned no data, skipping cycle");
            return Ok(false);
        }

        let document = Value::Object(raw);
        if self.validation.validate_monitor {
            self.validate_against(SchemaKind::Monitor, &document).await?;
        }

        let data: MonitoredData = serde_json::from_value(document)?;
        info!(services = data.len(), "Monitored data stored");
        self.knowledge.write().await.set_monitored_data(data);

        self.phase = CyclePhase::Monitored;
        Ok(true)
    }

    /// Classify the current snapshot. Returns whether adaptation is needed.
    pub async fn analyze(&mut self) -> bool {
        if let Err(e) = self.require("analyze", CyclePhase::Monitored) {
            warn!(error = %e, "Analyze skipped");
            return false;
        }

        let result = {
            let knowledge = self.knowledge.read().await;
            self.policy.analyze(knowledge.monitored_data())
        };

        match result {
            Ok(analysis) => {
                let findings = analysis.findings();
                self.metrics.inc_qos_violations(analysis.violations() as u64);
                self.knowledge.write().await.set_analysis_data(analysis);
                self.phase = CyclePhase::Analyzed;

                if findings > 0 {
                    info!(policy = self.policy.name(), findings, "Adaptation needed");
                } else {
                    debug!(policy = self.policy.name(), "No adaptation needed");
                }
                findings > 0
            }
            Err(e) => {
                error!(policy = self.policy.name(), error = %e, "Analysis failed");
                false
            }
        }
    }

    /// Synthesize `plan_data` from the current analysis. Returns whether a
    /// non-empty plan was produced.
    pub async fn plan(&mut self) -> bool {
        if let Err(e) = self.require("plan", CyclePhase::Analyzed) {
            warn!(error = %e, "Plan skipped");
            return false;
        }

        let options = if self.policy.needs_catalog() {
            match self.adaptation_options().await {
                Ok(options) => options,
                Err(e) => {
                    error!(error = %e, "Adaptation options unavailable");
                    return false;
                }
            }
        } else {
            AdaptationOptions::default()
        };

        let result = {
            let knowledge = self.knowledge.read().await;
            self.policy.plan(knowledge.analysis_data(), &options)
        };

        match result {
            Ok(plan) => {
                let plan = plan.unwrap_or(PlanData::Empty);
                let size = plan.len();
                self.metrics.set_last_plan_size(size as i64);
                self.knowledge.write().await.set_plan_data(plan);
                self.phase = CyclePhase::Planned;

                if size > 0 {
                    info!(policy = self.policy.name(), submissions = size, "Plan ready");
                } else {
                    debug!(policy = self.policy.name(), "No plan this cycle");
                }
                size > 0
            }
            Err(e) => {
                error!(policy = self.policy.name(), error = %e, "Planning failed");
                false
            }
        }
    }

    /// Submit the current plan. Ends the cycle whatever the outcome.
    pub async fn execute(&mut self) -> Result<ExecutionReport> {
        self.require("execute", CyclePhase::Planned)?;
        self.phase = CyclePhase::Idle;

        let plan = self.knowledge.read().await.plan_data().clone();

        let schema = if self.validation.validate_execute {
            Some(self.schema(SchemaKind::Execute).await?)
        } else {
            None
        };

        let mut executor = Executor::new(self.client.as_ref()).with_logger(self.logger.clone());
        if let Some(schema) = &schema {
            executor = executor.with_schema(schema);
        }

        executor.execute(&plan).await
    }

    /// One full cycle with boolean gating between phases
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let start = Instant::now();
        let trace = self.traced_cycle(false).await;
        self.record_cycle(start.elapsed(), &trace.outcome);
        trace.outcome
    }

    /// Run the gated phases, stopping before execute when `dry_run` is set.
    /// Metrics are left to the caller.
    pub async fn traced_cycle(&mut self, dry_run: bool) -> CycleTrace {
        let mut completed = CyclePhase::Idle;
        let outcome = self.gated_cycle(dry_run, &mut completed).await;
        CycleTrace { completed, outcome }
    }

    fn record_cycle(&self, elapsed: Duration, outcome: &Result<CycleOutcome>) {
        self.metrics.observe_cycle_latency(elapsed.as_secs_f64());
        match outcome {
            Ok(outcome) => self.metrics.inc_cycles(outcome.label()),
            Err(_) => self.metrics.inc_cycles("failed"),
        }
    }

    async fn gated_cycle(
        &mut self,
        dry_run: bool,
        completed: &mut CyclePhase,
    ) -> Result<CycleOutcome> {
        if !self.monitor().await? {
            return Ok(CycleOutcome::MonitorUnavailable);
        }
        *completed = CyclePhase::Monitored;

        let needed = self.analyze().await;
        if self.phase < CyclePhase::Analyzed {
            return Ok(CycleOutcome::AnalysisFailed);
        }
        *completed = CyclePhase::Analyzed;
        if !needed {
            return Ok(CycleOutcome::NoAdaptation);
        }

        let planned = self.plan().await;
        if self.phase < CyclePhase::Planned {
            return Ok(CycleOutcome::PlanningFailed);
        }
        *completed = CyclePhase::Planned;
        if !planned {
            return Ok(CycleOutcome::NoAdaptation);
        }
        if dry_run {
            return Ok(CycleOutcome::Planned);
        }

        Ok(CycleOutcome::Executed(self.execute().await?))
    }
}

#[cfg(test)]
mod tests;
