//! One-shot adaptation cycles and manual plan submission

use anyhow::{bail, Context, Result};
use colored::Colorize;
use controller_lib::analyzer::{
    CapacitySettings, QosThresholds, DEFAULT_AVAILABILITY_FLOOR, DEFAULT_RESPONSE_TIME_CEILING,
};
use controller_lib::{
    AdaptationRequest, Controller, CycleOutcome, CyclePhase, CycleTrace, ExecutionReport,
    Executor, ManagedSystem, PlanData, PolicyKind, SchemaKind,
};
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tabled::Tabled;

use super::Session;
use crate::output::{print_info, print_json, print_success, print_table, print_warning, OutputFormat};

/// Arguments of `mapek cycle`
pub struct CycleArgs {
    pub policy: PolicyKind,
    pub dry_run: bool,
    pub target_service: Option<String>,
    pub availability_floor: Option<f64>,
    pub response_time_ceiling: Option<f64>,
}

/// Row for the plan table
#[derive(Tabled, Serialize)]
struct PlanRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Operation")]
    operation: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

fn request_detail(request: &AdaptationRequest) -> String {
    match request {
        AdaptationRequest::AddInstances { count, .. } => format!("+{} instance(s)", count),
        AdaptationRequest::RemoveInstance { address, port, .. } => format!("{}:{}", address, port),
        AdaptationRequest::ChangeLbWeights { weights, .. } => weights
            .iter()
            .map(|(instance, weight)| format!("{}={:.2}", instance, weight))
            .collect::<Vec<_>>()
            .join(", "),
        AdaptationRequest::ChangeProperty {
            property_name,
            value,
            ..
        } => format!("{}={}", property_name, value),
    }
}

fn plan_rows(plan: &PlanData) -> Vec<PlanRow> {
    match plan {
        PlanData::Empty => Vec::new(),
        PlanData::Requests { requests } => requests
            .iter()
            .enumerate()
            .map(|(i, request)| PlanRow {
                position: i + 1,
                operation: request.operation().as_str().to_string(),
                target: request.target().to_string(),
                detail: request_detail(request),
            })
            .collect(),
        PlanData::TargetState(target) => vec![PlanRow {
            position: 1,
            operation: "targetState".into(),
            target: "-".into(),
            detail: format!(
                "servers={} dimmer={:.2}",
                target.server_number, target.dimmer_factor
            ),
        }],
    }
}

fn print_plan(plan: &PlanData) {
    println!("{}", "Adaptation Plan".bold());
    print_table(&plan_rows(plan), OutputFormat::Table);
}

fn print_report(report: &ExecutionReport) {
    print_success(&format!(
        "Managed system accepted {} submission(s)",
        report.submitted
    ));
}

/// Run monitor, analyze, plan and (unless `dry_run`) execute once
pub async fn run_cycle(session: &Session, args: CycleArgs) -> Result<()> {
    let thresholds = QosThresholds {
        availability_floor: args.availability_floor.unwrap_or(DEFAULT_AVAILABILITY_FLOOR),
        response_time_ceiling: args
            .response_time_ceiling
            .unwrap_or(DEFAULT_RESPONSE_TIME_CEILING),
    };
    let capacity = CapacitySettings {
        target_service: args.target_service.unwrap_or_default(),
        ..CapacitySettings::default()
    };
    if args.policy == PolicyKind::ServerDimmer && capacity.target_service.is_empty() {
        bail!("--target-service is required for the server-dimmer policy");
    }

    let client = session.managed_system()?;
    let mut controller = Controller::new(Arc::new(client), args.policy.build(thresholds, capacity));

    let CycleTrace { completed, outcome } = controller.traced_cycle(args.dry_run).await;
    let report = match outcome? {
        CycleOutcome::MonitorUnavailable => {
            print_warning(&format!(
                "Managed system returned no data after {} attempts",
                session.attempts
            ));
            return Ok(());
        }
        CycleOutcome::AnalysisFailed => bail!("Analysis failed; rerun with --verbose for details"),
        CycleOutcome::PlanningFailed => bail!("Planning failed; rerun with --verbose for details"),
        CycleOutcome::NoAdaptation | CycleOutcome::Planned => None,
        CycleOutcome::Executed(report) => Some(report),
    };

    let needed = completed >= CyclePhase::Planned;
    let (analysis, plan) = {
        let knowledge = controller.knowledge().read().await;
        let plan = if needed {
            knowledge.plan_data().clone()
        } else {
            PlanData::Empty
        };
        (knowledge.analysis_data().clone(), plan)
    };

    match session.format {
        OutputFormat::Json => print_json(&json!({
            "policy": args.policy,
            "findings": analysis.findings(),
            "analysis": analysis,
            "plan": plan,
            "execution": report,
        })),
        OutputFormat::Table => {
            if !needed {
                print_success(&format!("{}: no adaptation needed", args.policy));
                return Ok(());
            }
            if plan.is_empty() {
                print_info(&format!(
                    "{}: {} finding(s) but nothing to plan",
                    args.policy,
                    analysis.findings()
                ));
                return Ok(());
            }
            print_plan(&plan);
            match &report {
                Some(report) => print_report(report),
                None => print_info("Dry run, nothing submitted"),
            }
        }
    }

    Ok(())
}

/// Submit a plan file through the executor
pub async fn execute_plan(session: &Session, file: &Path, validate: bool) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read plan file {}", file.display()))?;
    let plan: PlanData = serde_json::from_str(&content)
        .context("Plan must be {\"requests\": [...]} or {\"server_number\", \"dimmer_factor\"}")?;

    if plan.is_empty() {
        print_warning("Plan is empty, nothing to submit");
        return Ok(());
    }

    let client = session.managed_system()?;
    let schema = if validate {
        Some(client.fetch_schema(SchemaKind::Execute).await?)
    } else {
        None
    };

    let mut executor = Executor::new(&client);
    if let Some(schema) = &schema {
        executor = executor.with_schema(schema);
    }
    let report = executor.execute(&plan).await?;

    match session.format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Table => {
            print_plan(&plan);
            print_report(&report);
        }
    }

    Ok(())
}
