//! Per-service classification of instance lifecycle and QoS

use super::qos::{QosEntry, QosThresholds};
use crate::error::{AdaptationError, Result};
use crate::models::{AdaptationRequest, InstanceStatus, ServiceSnapshot};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Classification of one service for the current cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceReport {
    pub service_id: String,
    pub implementation_id: String,
    /// Active instances with their normalized QoS
    pub instances: Vec<QosEntry>,
    /// Booting or shut-down instances skipped this cycle
    pub not_actionable: Vec<String>,
    /// Actions mandated by lifecycle state
    pub forced_adaptations: Vec<AdaptationRequest>,
}

impl ServiceReport {
    pub fn has_violations(&self) -> bool {
        self.instances.iter().any(QosEntry::is_violating)
    }

    pub fn active_count(&self) -> usize {
        self.instances.len()
    }
}

/// Classify every instance of `snapshot`.
///
/// - `SHUTDOWN`/`BOOTING` instances are recorded as not actionable
/// - `FAILED` instances force a shutdown and never reach QoS evaluation;
///   without a derivable endpoint they are only recorded as not actionable
/// - `ACTIVE` instances are evaluated against `thresholds`
/// - a service without any active instance is forced to add one
pub fn classify_service(snapshot: &ServiceSnapshot, thresholds: &QosThresholds) -> Result<ServiceReport> {
    let implementation = &snapshot.current_implementation_id;
    let mut report = ServiceReport {
        service_id: snapshot.service_id.clone(),
        implementation_id: implementation.clone(),
        instances: Vec::new(),
        not_actionable: Vec::new(),
        forced_adaptations: Vec::new(),
    };

    for instance in &snapshot.snapshot {
        match instance.status {
            InstanceStatus::Shutdown | InstanceStatus::Booting => {
                debug!(
                    service = %snapshot.service_id,
                    instance = %instance.instance_id,
                    status = %instance.status,
                    "Instance not actionable this cycle"
                );
                report.not_actionable.push(instance.instance_id.clone());
            }
            InstanceStatus::Failed => match instance.endpoint() {
                Some((address, port)) => {
                    info!(
                        service = %snapshot.service_id,
                        instance = %instance.instance_id,
                        "Failed instance, forcing shutdown"
                    );
                    report
                        .forced_adaptations
                        .push(AdaptationRequest::remove_instance(implementation.clone(), address, port));
                }
                None => {
                    // No endpoint to address a removal to; the rest of the
                    // service is still classified
                    warn!(
                        service = %snapshot.service_id,
                        instance = %instance.instance_id,
                        "Failed instance has no address, cannot force its shutdown"
                    );
                    report.not_actionable.push(instance.instance_id.clone());
                }
            },
            InstanceStatus::Active => {
                let entry = thresholds
                    .evaluate(&instance.instance_id, instance.qos.as_ref())
                    .map_err(|e| {
                        AdaptationError::Analysis(format!("{} ({})", e, instance.instance_id))
                    })?;
                if entry.is_violating() {
                    info!(
                        service = %snapshot.service_id,
                        instance = %instance.instance_id,
                        availability = ?entry.availability,
                        response_time = ?entry.response_time,
                        "QoS violation"
                    );
                }
                report.instances.push(entry);
            }
        }
    }

    if report.active_count() == 0 {
        info!(service = %snapshot.service_id, "No active instance, forcing a new one");
        report
            .forced_adaptations
            .push(AdaptationRequest::add_instances(implementation.clone(), 1));
    }

    Ok(report)
}
