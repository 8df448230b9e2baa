//! Selectable analyze/plan strategies
//!
//! Three strategies are available and exactly one is active per controller:
//! - `instance-scaling`: discrete add-instance decisions per implementation
//! - `qos-report`: per-service reports, scaling gated by the option catalog
//! - `server-dimmer`: numeric server count and dimmer control

use crate::analyzer::{
    analyze_report, analyze_scaling, assess_capacity, AnalysisData, CapacitySettings,
    QosThresholds,
};
use crate::error::{AdaptationError, Result};
use crate::models::{AdaptationOptions, MonitoredData, PlanData};
use crate::planner::{plan_report, plan_scaling, plan_server_dimmer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Analyze and plan behaviour of one strategy.
///
/// `plan` returns `Ok(None)` when no adaptation is needed this cycle.
pub trait AdaptationPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether `plan` reads the adaptation-option catalog
    fn needs_catalog(&self) -> bool {
        false
    }

    fn analyze(&self, data: &MonitoredData) -> Result<AnalysisData>;

    fn plan(&self, analysis: &AnalysisData, options: &AdaptationOptions) -> Result<Option<PlanData>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    #[default]
    InstanceScaling,
    QosReport,
    ServerDimmer,
}

impl PolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::InstanceScaling => "instance-scaling",
            PolicyKind::QosReport => "qos-report",
            PolicyKind::ServerDimmer => "server-dimmer",
        }
    }

    /// Build the strategy with its thresholds
    pub fn build(
        self,
        thresholds: QosThresholds,
        capacity: CapacitySettings,
    ) -> Box<dyn AdaptationPolicy> {
        match self {
            PolicyKind::InstanceScaling => Box::new(InstanceScalingPolicy::new(thresholds)),
            PolicyKind::QosReport => Box::new(QosReportPolicy::new(thresholds)),
            PolicyKind::ServerDimmer => Box::new(ServerDimmerPolicy::new(thresholds, capacity)),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "instance-scaling" => Ok(PolicyKind::InstanceScaling),
            "qos-report" => Ok(PolicyKind::QosReport),
            "server-dimmer" => Ok(PolicyKind::ServerDimmer),
            other => Err(format!(
                "unknown policy '{}', expected instance-scaling, qos-report or server-dimmer",
                other
            )),
        }
    }
}

fn unexpected_analysis(policy: &str, analysis: &AnalysisData) -> AdaptationError {
    let kind = match analysis {
        AnalysisData::Empty => "empty",
        AnalysisData::Scaling { .. } => "scaling",
        AnalysisData::Report { .. } => "report",
        AnalysisData::Capacity(_) => "capacity",
    };
    AdaptationError::Planning(format!("{} policy cannot plan from {} analysis", policy, kind))
}

fn non_empty(requests: Vec<crate::models::AdaptationRequest>) -> Option<PlanData> {
    if requests.is_empty() {
        None
    } else {
        Some(PlanData::requests(requests))
    }
}

/// Discrete scaling: one more instance per violating implementation
#[derive(Debug, Clone, Default)]
pub struct InstanceScalingPolicy {
    thresholds: QosThresholds,
}

impl InstanceScalingPolicy {
    pub fn new(thresholds: QosThresholds) -> Self {
        Self { thresholds }
    }
}

impl AdaptationPolicy for InstanceScalingPolicy {
    fn name(&self) -> &'static str {
        PolicyKind::InstanceScaling.as_str()
    }

    fn analyze(&self, data: &MonitoredData) -> Result<AnalysisData> {
        Ok(AnalysisData::Scaling {
            decisions: analyze_scaling(data, &self.thresholds)?,
        })
    }

    fn plan(&self, analysis: &AnalysisData, _options: &AdaptationOptions) -> Result<Option<PlanData>> {
        match analysis {
            AnalysisData::Scaling { decisions } => Ok(non_empty(plan_scaling(decisions))),
            other => Err(unexpected_analysis(self.name(), other)),
        }
    }
}

/// Qualitative reports, scale-out only where the catalog allows it
#[derive(Debug, Clone, Default)]
pub struct QosReportPolicy {
    thresholds: QosThresholds,
}

impl QosReportPolicy {
    pub fn new(thresholds: QosThresholds) -> Self {
        Self { thresholds }
    }
}

impl AdaptationPolicy for QosReportPolicy {
    fn name(&self) -> &'static str {
        PolicyKind::QosReport.as_str()
    }

    fn needs_catalog(&self) -> bool {
        true
    }

    fn analyze(&self, data: &MonitoredData) -> Result<AnalysisData> {
        Ok(AnalysisData::Report {
            services: analyze_report(data, &self.thresholds)?,
        })
    }

    fn plan(&self, analysis: &AnalysisData, options: &AdaptationOptions) -> Result<Option<PlanData>> {
        match analysis {
            AnalysisData::Report { services } => Ok(non_empty(plan_report(services, options))),
            other => Err(unexpected_analysis(self.name(), other)),
        }
    }
}

/// Numeric control of server count and dimmer factor
#[derive(Debug, Clone)]
pub struct ServerDimmerPolicy {
    thresholds: QosThresholds,
    capacity: CapacitySettings,
}

impl ServerDimmerPolicy {
    pub fn new(thresholds: QosThresholds, capacity: CapacitySettings) -> Self {
        Self {
            thresholds,
            capacity,
        }
    }
}

impl AdaptationPolicy for ServerDimmerPolicy {
    fn name(&self) -> &'static str {
        PolicyKind::ServerDimmer.as_str()
    }

    fn analyze(&self, data: &MonitoredData) -> Result<AnalysisData> {
        Ok(AnalysisData::Capacity(assess_capacity(
            data,
            &self.capacity,
            &self.thresholds,
        )?))
    }

    fn plan(&self, analysis: &AnalysisData, _options: &AdaptationOptions) -> Result<Option<PlanData>> {
        match analysis {
            AnalysisData::Capacity(assessment) => {
                Ok(plan_server_dimmer(assessment, &self.capacity).map(PlanData::TargetState))
            }
            other => Err(unexpected_analysis(self.name(), other)),
        }
    }
}
