//! Driving loop for the adaptation controller
//!
//! Runs one gated cycle per tick, reports per-phase health and stops on a
//! shutdown signal or on a deployment error.

use super::{Controller, CycleOutcome, CyclePhase, CycleTrace};
use crate::error::{AdaptationError, Result};
use crate::health::{components, HealthRegistry};
use crate::observability::StructuredLogger;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Time between cycle starts (default: 30 seconds)
    pub interval: Duration,
    /// Stop after this many cycles; runs until shutdown when `None`
    pub max_cycles: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            max_cycles: None,
        }
    }
}

/// Why the loop returned
#[derive(Debug, Clone, PartialEq)]
pub enum LoopExit {
    Shutdown,
    CyclesCompleted(u64),
    /// The managed system is misconfigured or unreachable
    Fatal(String),
}

pub struct AdaptationLoop {
    controller: Controller,
    config: LoopConfig,
    health: HealthRegistry,
    logger: StructuredLogger,
}

impl AdaptationLoop {
    pub fn new(controller: Controller, config: LoopConfig, health: HealthRegistry) -> Self {
        Self {
            controller,
            config,
            health,
            logger: StructuredLogger::new("mapek-loop"),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Run cycles until shutdown. A cycle in flight is never cancelled.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> LoopExit {
        info!(
            interval_secs = self.config.interval.as_secs(),
            policy = self.controller.policy_name(),
            "Starting adaptation loop"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycle = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!(cycles = cycle, "Shutting down adaptation loop");
                    return LoopExit::Shutdown;
                }
                _ = ticker.tick() => {
                    cycle += 1;
                    self.logger.log_cycle_started(cycle);
                    let start = Instant::now();

                    let outcome = self.cycle().await;

                    let elapsed = start.elapsed();
                    self.controller.record_cycle(elapsed, &outcome);

                    match outcome {
                        Ok(outcome) => {
                            if outcome == CycleOutcome::MonitorUnavailable {
                                self.logger.log_monitor_unavailable(cycle);
                            }
                            self.logger.log_cycle_finished(cycle, outcome.label(), elapsed.as_millis());
                        }
                        Err(e) if e.is_fatal() => {
                            error!(cycle, error = %e, "Deployment error, stopping adaptation loop");
                            self.logger.log_shutdown(&e.to_string());
                            return LoopExit::Fatal(e.to_string());
                        }
                        Err(e) => {
                            warn!(cycle, error = %e, "Cycle failed, continuing with the next one");
                            self.logger.log_cycle_finished(cycle, "failed", elapsed.as_millis());
                        }
                    }

                    if self.config.max_cycles.is_some_and(|max| cycle >= max) {
                        return LoopExit::CyclesCompleted(cycle);
                    }
                }
            }
        }
    }

    /// One gated cycle, then per-phase health derived from how far it got
    async fn cycle(&mut self) -> Result<CycleOutcome> {
        let CycleTrace { completed, outcome } = self.controller.traced_cycle(false).await;

        if completed >= CyclePhase::Monitored {
            self.health.set_healthy(components::MONITOR).await;
            self.health.set_ready(true).await;
        }
        if completed >= CyclePhase::Analyzed {
            self.health.set_healthy(components::ANALYZER).await;
        }
        if completed >= CyclePhase::Planned {
            self.health.set_healthy(components::PLANNER).await;
        }

        match &outcome {
            Ok(CycleOutcome::MonitorUnavailable) => {
                self.health
                    .set_degraded(components::MONITOR, "no monitor data after retries")
                    .await;
            }
            Ok(CycleOutcome::AnalysisFailed) => {
                self.health
                    .set_degraded(components::ANALYZER, "analysis failed, previous result kept")
                    .await;
            }
            Ok(CycleOutcome::PlanningFailed) => {
                self.health
                    .set_degraded(components::PLANNER, "planning failed, previous plan kept")
                    .await;
            }
            Ok(CycleOutcome::Executed(_)) => {
                self.health.set_healthy(components::EXECUTOR).await;
            }
            Ok(CycleOutcome::NoAdaptation) | Ok(CycleOutcome::Planned) => {}
            Err(e) => {
                let component = if completed == CyclePhase::Planned {
                    components::EXECUTOR
                } else {
                    components::MONITOR
                };
                self.report_failure(component, e).await;
            }
        }

        outcome
    }

    async fn report_failure(&self, component: &str, error: &AdaptationError) {
        if error.is_fatal() {
            self.health.set_unhealthy(component, error.to_string()).await;
        } else {
            self.health.set_degraded(component, error.to_string()).await;
        }
    }
}
