//! QoS threshold evaluation

use crate::models::Qos;
use serde::{Deserialize, Serialize};

/// Default availability floor in percent
pub const DEFAULT_AVAILABILITY_FLOOR: f64 = 85.0;

/// Default response-time ceiling in seconds
pub const DEFAULT_RESPONSE_TIME_CEILING: f64 = 3.0;

/// QoS targets an active instance must meet
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QosThresholds {
    /// Availability below this percentage is a violation
    pub availability_floor: f64,
    /// Response time above this many seconds is a violation
    pub response_time_ceiling: f64,
}

impl Default for QosThresholds {
    fn default() -> Self {
        Self {
            availability_floor: DEFAULT_AVAILABILITY_FLOOR,
            response_time_ceiling: DEFAULT_RESPONSE_TIME_CEILING,
        }
    }
}

/// A single threshold breach
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QosViolation {
    LowAvailability { observed: f64, floor: f64 },
    SlowResponse { observed: f64, ceiling: f64 },
}

/// Normalized QoS of one active instance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QosEntry {
    pub instance_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<QosViolation>,
}

impl QosEntry {
    pub fn is_violating(&self) -> bool {
        !self.violations.is_empty()
    }
}

impl QosThresholds {
    /// Evaluate one instance's QoS. Missing measurements never violate.
    pub fn evaluate(&self, instance_id: &str, qos: Option<&Qos>) -> Result<QosEntry, String> {
        let mut entry = QosEntry {
            instance_id: instance_id.to_string(),
            availability: None,
            response_time: None,
            violations: Vec::new(),
        };

        let Some(qos) = qos else {
            return Ok(entry);
        };

        if let Some(availability) = &qos.availability {
            let observed = availability.as_percent()?;
            entry.availability = Some(observed);
            if observed < self.availability_floor {
                entry.violations.push(QosViolation::LowAvailability {
                    observed,
                    floor: self.availability_floor,
                });
            }
        }

        if let Some(observed) = qos.response_time {
            entry.response_time = Some(observed);
            if observed > self.response_time_ceiling {
                entry.violations.push(QosViolation::SlowResponse {
                    observed,
                    ceiling: self.response_time_ceiling,
                });
            }
        }

        Ok(entry)
    }
}
