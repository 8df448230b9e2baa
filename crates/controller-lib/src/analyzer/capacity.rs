//! Capacity assessment for server/dimmer control

use super::qos::QosThresholds;
use crate::error::{AdaptationError, Result};
use crate::models::{InstanceStatus, MonitoredData};
use serde::{Deserialize, Serialize};

const EPSILON: f64 = 1e-9;

/// Bounds of the numeric server/dimmer controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacitySettings {
    /// Service whose servers and dimmer are controlled
    pub target_service: String,
    pub min_servers: u32,
    pub max_servers: u32,
    /// Step applied to the dimmer factor per cycle
    pub dimmer_margin: f64,
    pub dimmer_min: f64,
    pub dimmer_max: f64,
    /// Dimmer assumed when the snapshot does not report one
    pub initial_dimmer: f64,
}

impl Default for CapacitySettings {
    fn default() -> Self {
        Self {
            target_service: String::new(),
            min_servers: 1,
            max_servers: 3,
            dimmer_margin: 0.1,
            dimmer_min: 0.0,
            dimmer_max: 1.0,
            initial_dimmer: 1.0,
        }
    }
}

/// Derived state the numeric planner decides on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityAssessment {
    pub service_id: String,
    pub implementation_id: String,
    /// Active plus booting servers
    pub current_servers: u32,
    pub active_servers: u32,
    pub current_dimmer: f64,
    pub average_response_time: Option<f64>,
    pub rt_sufficient: bool,
    /// Active servers minus their summed utilization
    pub spare_utilization: f64,
    pub dimmer_at_max: bool,
    pub dimmer_at_min: bool,
    pub server_booting: bool,
    pub is_server_removable: bool,
    pub server_room: bool,
}

/// Derive the capacity state of the target service
pub fn assess_capacity(
    data: &MonitoredData,
    settings: &CapacitySettings,
    thresholds: &QosThresholds,
) -> Result<CapacityAssessment> {
    let service = data
        .get(&settings.target_service)
        .or_else(|| {
            data.values()
                .find(|s| s.service_id == settings.target_service)
        })
        .ok_or_else(|| {
            AdaptationError::Analysis(format!(
                "target service {:?} not present in monitored data",
                settings.target_service
            ))
        })?;

    let active: Vec<_> = service
        .snapshot
        .iter()
        .filter(|i| i.status == InstanceStatus::Active)
        .collect();
    let booting = service.count_with_status(InstanceStatus::Booting) as u32;
    let active_servers = active.len() as u32;
    let current_servers = active_servers + booting;

    let response_times: Vec<f64> = active
        .iter()
        .filter_map(|i| i.qos.as_ref().and_then(|q| q.response_time))
        .collect();
    let average_response_time = if response_times.is_empty() {
        None
    } else {
        Some(response_times.iter().sum::<f64>() / response_times.len() as f64)
    };

    let total_utilization: f64 = active
        .iter()
        .filter_map(|i| i.qos.as_ref().and_then(|q| q.utilization))
        .sum();
    let spare_utilization = if active.iter().any(|i| i.qos.as_ref().and_then(|q| q.utilization).is_some()) {
        active_servers as f64 - total_utilization
    } else {
        0.0
    };

    let current_dimmer = service.dimmer.unwrap_or(settings.initial_dimmer);

    Ok(CapacityAssessment {
        service_id: service.service_id.clone(),
        implementation_id: service.current_implementation_id.clone(),
        current_servers,
        active_servers,
        current_dimmer,
        average_response_time,
        rt_sufficient: average_response_time
            .map(|rt| rt <= thresholds.response_time_ceiling)
            .unwrap_or(true),
        spare_utilization,
        dimmer_at_max: current_dimmer >= settings.dimmer_max - EPSILON,
        dimmer_at_min: current_dimmer <= settings.dimmer_min + EPSILON,
        server_booting: booting > 0,
        is_server_removable: current_servers > settings.min_servers,
        server_room: current_servers < settings.max_servers,
    })
}
