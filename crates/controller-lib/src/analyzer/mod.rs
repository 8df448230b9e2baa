//! Analysis of monitored snapshots
//!
//! This module provides:
//! - QoS threshold evaluation with availability normalization
//! - per-service lifecycle classification and forced adaptations
//! - capacity assessment for server/dimmer control

mod capacity;
mod classify;
mod qos;


pub use capacity::{assess_capacity, CapacityAssessment, CapacitySettings};
pub use classify::{classify_service, ServiceReport};
pub use qos::{
    QosEntry, QosThresholds, QosViolation, DEFAULT_AVAILABILITY_FLOOR,
    DEFAULT_RESPONSE_TIME_CEILING,
};

use crate::error::Result;
use crate::models::{AdaptationRequest, MonitoredData};
use serde::Serialize;
use std::collections::BTreeMap;

/// Verdict of the discrete scaling analysis for one implementation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScalingDecision {
    /// QoS breached, one more instance is needed
    AddInstance,
    /// Lifecycle-mandated actions, used verbatim by the planner
    Forced(Vec<AdaptationRequest>),
}

/// Result of the analyze phase; the shape depends on the active policy
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisData {
    #[default]
    Empty,
    /// Implementation id to scaling verdict
    Scaling {
        decisions: BTreeMap<String, ScalingDecision>,
    },
    /// Service id to full classification
    Report {
        services: BTreeMap<String, ServiceReport>,
    },
    Capacity(CapacityAssessment),
}

impl AnalysisData {
    /// Number of services that need an adaptation
    pub fn findings(&self) -> usize {
        match self {
            AnalysisData::Empty => 0,
            AnalysisData::Scaling { decisions } => decisions.len(),
            AnalysisData::Report { services } => services
                .values()
                .filter(|r| r.has_violations() || !r.forced_adaptations.is_empty())
                .count(),
            AnalysisData::Capacity(_) => 1,
        }
    }

    /// Number of services currently breaching a QoS threshold.
    ///
    /// Unlike `findings`, lifecycle-forced actions and capacity assessments
    /// with an acceptable response time are not counted.
    pub fn violations(&self) -> usize {
        match self {
            AnalysisData::Empty => 0,
            AnalysisData::Scaling { decisions } => decisions
                .values()
                .filter(|d| matches!(d, ScalingDecision::AddInstance))
                .count(),
            AnalysisData::Report { services } => {
                services.values().filter(|r| r.has_violations()).count()
            }
            AnalysisData::Capacity(a) => usize::from(!a.rt_sufficient),
        }
    }
}

/// Discrete analysis: flag implementations needing an instance.
///
/// Forced adaptations take precedence over QoS-driven scaling.
pub fn analyze_scaling(
    data: &MonitoredData,
    thresholds: &QosThresholds,
) -> Result<BTreeMap<String, ScalingDecision>> {
    let mut decisions = BTreeMap::new();

    for snapshot in data.values() {
        let report = classify_service(snapshot, thresholds)?;
        if !report.forced_adaptations.is_empty() {
            decisions.insert(
                report.implementation_id,
                ScalingDecision::Forced(report.forced_adaptations),
            );
        } else if report.has_violations() {
            decisions.insert(report.implementation_id, ScalingDecision::AddInstance);
        }
    }

    Ok(decisions)
}

/// Qualitative analysis: a full report for every service
pub fn analyze_report(
    data: &MonitoredData,
    thresholds: &QosThresholds,
) -> Result<BTreeMap<String, ServiceReport>> {
    data.iter()
        .map(|(service, snapshot)| Ok((service.clone(), classify_service(snapshot, thresholds)?)))
        .collect()
}
