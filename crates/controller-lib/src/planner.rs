//! Plan synthesis
//!
//! Turns analysis results into either an ordered list of adaptation
//! requests or a numeric server/dimmer target state.

use crate::analyzer::{CapacityAssessment, CapacitySettings, ScalingDecision, ServiceReport};
use crate::models::{AdaptationOptions, AdaptationRequest, OperationKind, TargetState};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Discrete request-list policy: one `addInstances(impl, 1)` per flagged
/// implementation, forced action lists copied verbatim
pub fn plan_scaling(decisions: &BTreeMap<String, ScalingDecision>) -> Vec<AdaptationRequest> {
    let mut requests = Vec::new();

    for (implementation, decision) in decisions {
        match decision {
            ScalingDecision::Forced(actions) => {
                debug!(implementation = %implementation, actions = actions.len(), "Using forced adaptations");
                requests.extend(actions.iter().cloned());
            }
            ScalingDecision::AddInstance => {
                info!(implementation = %implementation, "Adaptation needed, planning one more instance");
                requests.push(AdaptationRequest::add_instances(implementation.clone(), 1));
            }
        }
    }

    requests
}

/// QoS-report policy: forced lists first, otherwise scale out violating
/// services the catalog allows to scale
pub fn plan_report(
    services: &BTreeMap<String, ServiceReport>,
    options: &AdaptationOptions,
) -> Vec<AdaptationRequest> {
    let mut requests = Vec::new();

    for report in services.values() {
        if !report.forced_adaptations.is_empty() {
            requests.extend(report.forced_adaptations.iter().cloned());
            continue;
        }
        if !report.has_violations() {
            continue;
        }

        let allowed = options.offers(&report.service_id, OperationKind::AddInstances)
            || options.offers(&report.implementation_id, OperationKind::AddInstances);
        if allowed {
            info!(service = %report.service_id, "QoS violated, planning one more instance");
            requests.push(AdaptationRequest::add_instances(report.implementation_id.clone(), 1));
        } else {
            warn!(
                service = %report.service_id,
                "QoS violated but the adaptation catalog offers no addInstances option"
            );
        }
    }

    requests
}

/// Threshold-reactive numeric policy. The first matching branch wins;
/// `None` means no adaptation this cycle.
pub fn plan_server_dimmer(
    assessment: &CapacityAssessment,
    settings: &CapacitySettings,
) -> Option<TargetState> {
    let a = assessment;
    let servers = a.current_servers;
    let dimmer = a.current_dimmer;
    let clamp = |value: f64| value.clamp(settings.dimmer_min, settings.dimmer_max);

    let target = if a.rt_sufficient && a.spare_utilization > 1.0 && !a.dimmer_at_max {
        TargetState {
            server_number: servers,
            dimmer_factor: clamp(dimmer + settings.dimmer_margin),
        }
    } else if a.rt_sufficient && a.dimmer_at_max && !a.server_booting && a.is_server_removable {
        TargetState {
            server_number: servers - 1,
            dimmer_factor: dimmer,
        }
    } else if !a.rt_sufficient && !a.server_booting && a.server_room {
        TargetState {
            server_number: servers + 1,
            dimmer_factor: dimmer,
        }
    } else if !a.rt_sufficient && !a.dimmer_at_min {
        TargetState {
            server_number: servers,
            dimmer_factor: clamp(dimmer - settings.dimmer_margin),
        }
    } else {
        debug!(service = %a.service_id, "No server/dimmer adaptation needed");
        return None;
    };

    info!(
        service = %a.service_id,
        server_number = target.server_number,
        dimmer_factor = target.dimmer_factor,
        "Planned target state"
    );
    Some(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{QosEntry, QosViolation};
    use serde_json::json;

    fn assessment() -> CapacityAssessment {
        CapacityAssessment {
            service_id: "swim".into(),
            implementation_id: "swim-impl".into(),
            current_servers: 3,
            active_servers: 3,
            current_dimmer: 0.5,
            average_response_time: Some(1.0),
            rt_sufficient: true,
            spare_utilization: 0.5,
            dimmer_at_max: false,
            dimmer_at_min: false,
            server_booting: false,
            is_server_removable: true,
            server_room: true,
        }
    }

    fn report(service: &str, violating: bool, forced: Vec<AdaptationRequest>) -> ServiceReport {
        let violations = if violating {
            vec![QosViolation::SlowResponse {
                observed: 5.0,
                ceiling: 3.0,
            }]
        } else {
            vec![]
        };
        ServiceReport {
            service_id: service.into(),
            implementation_id: format!("{}-impl", service),
            instances: vec![QosEntry {
                instance_id: format!("{}-1", service),
                availability: Some(99.0),
                response_time: Some(if violating { 5.0 } else { 1.0 }),
                violations,
            }],
            not_actionable: vec![],
            forced_adaptations: forced,
        }
    }

    #[test]
    fn test_dimmer_increase_branch() {
        let a = CapacityAssessment {
            rt_sufficient: true,
            spare_utilization: 1.5,
            dimmer_at_max: false,
            current_dimmer: 0.5,
            ..assessment()
        };
        let target = plan_server_dimmer(&a, &CapacitySettings::default()).unwrap();

        assert!((target.dimmer_factor - 0.6).abs() < 1e-9);
        assert_eq!(target.server_number, 3);
    }

    #[test]
    fn test_server_removal_branch() {
        let a = CapacityAssessment {
            dimmer_at_max: true,
            current_dimmer: 1.0,
            ..assessment()
        };
        let target = plan_server_dimmer(&a, &CapacitySettings::default()).unwrap();

        assert_eq!(target.server_number, 2);
        assert_eq!(target.dimmer_factor, 1.0);
    }

    #[test]
    fn test_server_addition_branch() {
        let a = CapacityAssessment {
            rt_sufficient: false,
            server_booting: false,
            server_room: true,
            current_servers: 3,
            ..assessment()
        };
        let target = plan_server_dimmer(&a, &CapacitySettings::default()).unwrap();

        assert_eq!(target.server_number, 4);
        assert_eq!(target.dimmer_factor, 0.5);
    }

    #[test]
    fn test_dimmer_decrease_branch() {
        let a = CapacityAssessment {
            rt_sufficient: false,
            server_room: false,
            ..assessment()
        };
        let target = plan_server_dimmer(&a, &CapacitySettings::default()).unwrap();

        assert_eq!(target.server_number, 3);
        assert!((target.dimmer_factor - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_booting_server_blocks_addition() {
        let a = CapacityAssessment {
            rt_sufficient: false,
            server_booting: true,
            ..assessment()
        };
        let target = plan_server_dimmer(&a, &CapacitySettings::default()).unwrap();
        // Falls through to the dimmer branch
        assert_eq!(target.server_number, 3);
        assert!(target.dimmer_factor < 0.5);
    }

    #[test]
    fn test_no_plan_branch() {
        let saturated = CapacityAssessment {
            rt_sufficient: false,
            server_room: false,
            dimmer_at_min: true,
            current_dimmer: 0.0,
            ..assessment()
        };
        assert!(plan_server_dimmer(&saturated, &CapacitySettings::default()).is_none());

        let steady = assessment();
        assert!(plan_server_dimmer(&steady, &CapacitySettings::default()).is_none());
    }

    #[test]
    fn test_dimmer_is_clamped() {
        let a = CapacityAssessment {
            spare_utilization: 2.0,
            current_dimmer: 0.95,
            ..assessment()
        };
        let target = plan_server_dimmer(&a, &CapacitySettings::default()).unwrap();
        assert_eq!(target.dimmer_factor, 1.0);
    }

    #[test]
    fn test_plan_scaling_order_and_forced_verbatim() {
        let forced = vec![
            AdaptationRequest::remove_instance("b-impl", "10.0.0.2", 8080),
            AdaptationRequest::add_instances("b-impl", 1),
        ];
        let mut decisions = BTreeMap::new();
        decisions.insert("c-impl".to_string(), ScalingDecision::AddInstance);
        decisions.insert("a-impl".to_string(), ScalingDecision::AddInstance);
        decisions.insert("b-impl".to_string(), ScalingDecision::Forced(forced.clone()));

        let requests = plan_scaling(&decisions);

        assert_eq!(requests.len(), 4);
        assert_eq!(requests[0], AdaptationRequest::add_instances("a-impl", 1));
        assert_eq!(&requests[1..3], forced.as_slice());
        assert_eq!(requests[3], AdaptationRequest::add_instances("c-impl", 1));
    }

    #[test]
    fn test_plan_report_consults_catalog() {
        let mut services = BTreeMap::new();
        services.insert("restaurant".to_string(), report("restaurant", true, vec![]));
        services.insert("ordering".to_string(), report("ordering", true, vec![]));
        services.insert("payment".to_string(), report("payment", false, vec![]));

        let options = AdaptationOptions(json!({"restaurant": ["addInstances"]}));
        let requests = plan_report(&services, &options);

        assert_eq!(
            requests,
            vec![AdaptationRequest::add_instances("restaurant-impl", 1)]
        );
    }

    #[test]
    fn test_plan_report_forced_ignores_catalog() {
        let forced = vec![AdaptationRequest::remove_instance("ordering-impl", "10.0.0.3", 9000)];
        let mut services = BTreeMap::new();
        services.insert("ordering".to_string(), report("ordering", true, forced.clone()));

        let requests = plan_report(&services, &AdaptationOptions::default());
        assert_eq!(requests, forced);
    }
}
