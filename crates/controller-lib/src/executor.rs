//! Plan execution against the managed system
//!
//! Requests are submitted one at a time in plan order. The first error
//! aborts the remaining submissions; accepted requests are not rolled back.

use crate::client::ManagedSystem;
use crate::error::Result;
use crate::models::{AdaptationRequest, PlanData};
use crate::observability::{ControllerMetrics, StructuredLogger};
use crate::schema;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

/// Outcome of a completed execute phase
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionReport {
    /// Number of payloads the managed system accepted
    pub submitted: usize,
    /// Response bodies in submission order
    pub responses: Vec<Value>,
}

/// One payload of a plan, paired with the labels used for logging
struct Submission {
    operation: &'static str,
    target: String,
    payload: Value,
}

fn submissions(plan: &PlanData) -> Result<Vec<Submission>> {
    match plan {
        PlanData::Empty => Ok(Vec::new()),
        PlanData::Requests { requests } => requests
            .iter()
            .map(|request: &AdaptationRequest| -> Result<Submission> {
                request.validate()?;
                Ok(Submission {
                    operation: request.operation().as_str(),
                    target: request.target().to_string(),
                    payload: serde_json::to_value(request)?,
                })
            })
            .collect(),
        PlanData::TargetState(target) => Ok(vec![Submission {
            operation: "targetState",
            target: format!("servers={} dimmer={}", target.server_number, target.dimmer_factor),
            payload: serde_json::to_value(target)?,
        }]),
    }
}

/// Submits plans through a [`ManagedSystem`]
pub struct Executor<'a> {
    client: &'a dyn ManagedSystem,
    execute_schema: Option<&'a Value>,
    metrics: ControllerMetrics,
    logger: StructuredLogger,
}

impl<'a> Executor<'a> {
    pub fn new(client: &'a dyn ManagedSystem) -> Self {
        Self {
            client,
            execute_schema: None,
            metrics: ControllerMetrics::new(),
            logger: StructuredLogger::new("executor"),
        }
    }

    /// Validate every payload against `schema` before the first submission
    pub fn with_schema(mut self, schema: &'a Value) -> Self {
        self.execute_schema = Some(schema);
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Submit `plan` in order, stopping at the first failure
    pub async fn execute(&self, plan: &PlanData) -> Result<ExecutionReport> {
        let submissions = submissions(plan)?;

        if let Some(schema) = self.execute_schema {
            for submission in &submissions {
                schema::validate(&submission.payload, schema)?;
            }
        }

        let mut report = ExecutionReport::default();
        for (index, submission) in submissions.iter().enumerate() {
            debug!(
                index,
                operation = submission.operation,
                target = %submission.target,
                "Submitting adaptation"
            );

            match self.client.submit_adaptation(&submission.payload).await {
                Ok(response) => {
                    self.metrics.inc_adaptations_submitted(submission.operation);
                    self.logger
                        .log_adaptation_submitted(submission.operation, &submission.target);
                    report.submitted += 1;
                    report.responses.push(response);
                }
                Err(e) => {
                    error!(
                        index,
                        remaining = submissions.len() - index - 1,
                        error = %e,
                        "Adaptation rejected, aborting execute"
                    );
                    self.metrics.inc_execute_failures();
                    self.logger.log_execute_failed(report.submitted, &e.to_string());
                    return Err(e);
                }
            }
        }

        Ok(report)
    }
}
