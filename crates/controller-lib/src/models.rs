//! Core data models exchanged with the managed system

use crate::error::{AdaptationError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Latest monitored architecture, keyed by service identifier
pub type MonitoredData = BTreeMap<String, ServiceSnapshot>;

/// Lifecycle status of a managed service instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Booting,
    Active,
    Failed,
    Shutdown,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Booting => "BOOTING",
            InstanceStatus::Active => "ACTIVE",
            InstanceStatus::Failed => "FAILED",
            InstanceStatus::Shutdown => "SHUTDOWN",
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Availability as reported by the managed system: either a number or a
/// percent-suffixed string such as `"97.5%"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Availability {
    Percent(f64),
    Text(String),
}

impl Availability {
    /// Normalize to a numeric percentage
    pub fn as_percent(&self) -> std::result::Result<f64, String> {
        match self {
            Availability::Percent(value) => Ok(*value),
            Availability::Text(raw) => {
                let trimmed = raw.trim();
                let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
                number
                    .parse::<f64>()
                    .map_err(|_| format!("unparsable availability {:?}", raw))
            }
        }
    }
}

/// QoS measurements of one instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Qos {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<Availability>,
    /// Seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
    /// Busy fraction in `[0, 1]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utilization: Option<f64>,
}

/// One instance record inside a service snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSnapshot {
    pub instance_id: String,
    pub status: InstanceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Absent for infrastructure-internal services
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qos: Option<Qos>,
}

impl InstanceSnapshot {
    /// Network endpoint of the instance.
    ///
    /// Uses explicit `address`/`port` when present, otherwise parses an
    /// instance id of the form `implementation@host:port`.
    pub fn endpoint(&self) -> Option<(String, u16)> {
        if let (Some(address), Some(port)) = (&self.address, self.port) {
            return Some((address.clone(), port));
        }
        let (_, host_port) = self.instance_id.rsplit_once('@')?;
        let (host, port) = host_port.rsplit_once(':')?;
        Some((host.to_string(), port.parse().ok()?))
    }
}

/// Snapshot of one service as returned by the `monitor` endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSnapshot {
    pub service_id: String,
    pub current_implementation_id: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub instances: Value,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub snapshot: Vec<InstanceSnapshot>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub instance_config: Value,
    /// Current throttle factor, reported by dimmer-capable services
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimmer: Option<f64>,
}

impl ServiceSnapshot {
    pub fn count_with_status(&self, status: InstanceStatus) -> usize {
        self.snapshot.iter().filter(|i| i.status == status).count()
    }

    pub fn active_count(&self) -> usize {
        self.count_with_status(InstanceStatus::Active)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<InstanceSnapshot>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<InstanceSnapshot>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Operation names understood by the `execute` endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    #[serde(rename = "addInstances")]
    AddInstances,
    #[serde(rename = "removeInstance")]
    RemoveInstance,
    #[serde(rename = "changeLBWeights")]
    ChangeLbWeights,
    #[serde(rename = "changeProperty")]
    ChangeProperty,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::AddInstances => "addInstances",
            OperationKind::RemoveInstance => "removeInstance",
            OperationKind::ChangeLbWeights => "changeLBWeights",
            OperationKind::ChangeProperty => "changeProperty",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "addInstances" => Some(OperationKind::AddInstances),
            "removeInstance" => Some(OperationKind::RemoveInstance),
            "changeLBWeights" => Some(OperationKind::ChangeLbWeights),
            "changeProperty" => Some(OperationKind::ChangeProperty),
            _ => None,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single adaptation request, tagged by `operation` on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation")]
pub enum AdaptationRequest {
    #[serde(rename = "addInstances")]
    AddInstances {
        #[serde(rename = "serviceImplementationName")]
        service_name: String,
        #[serde(rename = "numberOfInstances")]
        count: u32,
    },
    #[serde(rename = "removeInstance")]
    RemoveInstance {
        #[serde(rename = "serviceImplementationName")]
        service_name: String,
        address: String,
        port: u16,
    },
    #[serde(rename = "changeLBWeights")]
    ChangeLbWeights {
        #[serde(rename = "weightsId")]
        service_id: String,
        weights: BTreeMap<String, f64>,
        #[serde(rename = "instancesToRemoveWeightOf", default)]
        instances_to_clear: Vec<String>,
    },
    #[serde(rename = "changeProperty")]
    ChangeProperty {
        #[serde(rename = "serviceName")]
        service_name: String,
        #[serde(rename = "propertiesName")]
        property_name: String,
        #[serde(rename = "propertiesToChange")]
        value: String,
    },
}

impl AdaptationRequest {
    pub fn add_instances(service_name: impl Into<String>, count: u32) -> Self {
        AdaptationRequest::AddInstances {
            service_name: service_name.into(),
            count,
        }
    }

    pub fn remove_instance(service_name: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        AdaptationRequest::RemoveInstance {
            service_name: service_name.into(),
            address: address.into(),
            port,
        }
    }

    pub fn operation(&self) -> OperationKind {
        match self {
            AdaptationRequest::AddInstances { .. } => OperationKind::AddInstances,
            AdaptationRequest::RemoveInstance { .. } => OperationKind::RemoveInstance,
            AdaptationRequest::ChangeLbWeights { .. } => OperationKind::ChangeLbWeights,
            AdaptationRequest::ChangeProperty { .. } => OperationKind::ChangeProperty,
        }
    }

    /// Service (or implementation) the request acts on
    pub fn target(&self) -> &str {
        match self {
            AdaptationRequest::AddInstances { service_name, .. }
            | AdaptationRequest::RemoveInstance { service_name, .. }
            | AdaptationRequest::ChangeProperty { service_name, .. } => service_name,
            AdaptationRequest::ChangeLbWeights { service_id, .. } => service_id,
        }
    }

    /// Reject requests whose required fields are present but unusable
    pub fn validate(&self) -> Result<()> {
        let missing = |field: &str| {
            Err(AdaptationError::violation(format!(
                "{}: \"{}\" is required",
                self.operation(),
                field
            )))
        };

        match self {
            AdaptationRequest::AddInstances { service_name, count } => {
                if service_name.is_empty() {
                    return missing("serviceImplementationName");
                }
                if *count == 0 {
                    return missing("numberOfInstances");
                }
            }
            AdaptationRequest::RemoveInstance {
                service_name,
                address,
                ..
            } => {
                if service_name.is_empty() {
                    return missing("serviceImplementationName");
                }
                if address.is_empty() {
                    return missing("address");
                }
            }
            AdaptationRequest::ChangeLbWeights {
                service_id,
                weights,
                ..
            } => {
                if service_id.is_empty() {
                    return missing("weightsId");
                }
                if weights.is_empty() {
                    return missing("weights");
                }
            }
            AdaptationRequest::ChangeProperty {
                service_name,
                property_name,
                value,
            } => {
                if service_name.is_empty() {
                    return missing("serviceName");
                }
                if property_name.is_empty() {
                    return missing("propertiesName");
                }
                if value.is_empty() {
                    return missing("propertiesToChange");
                }
            }
        }
        Ok(())
    }
}

/// Numeric target state for server/dimmer controlled systems
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetState {
    pub server_number: u32,
    pub dimmer_factor: f64,
}

/// Output of the plan phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlanData {
    Requests {
        requests: Vec<AdaptationRequest>,
    },
    TargetState(TargetState),
    #[default]
    Empty,
}

impl PlanData {
    pub fn requests(requests: Vec<AdaptationRequest>) -> Self {
        PlanData::Requests { requests }
    }

    /// Number of submissions the executor will make
    pub fn len(&self) -> usize {
        match self {
            PlanData::Requests { requests } => requests.len(),
            PlanData::TargetState(_) => 1,
            PlanData::Empty => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Catalog of adaptation actions offered by the managed system.
///
/// Kept as the raw document so that it can be validated against the
/// options schema. Two layouts are understood: an object keyed by service
/// whose values list operations (as names or `{operation: ..}` objects),
/// and an array of `{service|serviceId, operation}` entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdaptationOptions(pub Value);

impl AdaptationOptions {
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            Value::Array(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Whether the catalog lists `operation` for `service`
    pub fn offers(&self, service: &str, operation: OperationKind) -> bool {
        match &self.0 {
            Value::Object(map) => map
                .get(service)
                .and_then(Value::as_array)
                .map(|entries| entries.iter().any(|e| entry_operation(e) == Some(operation)))
                .unwrap_or(false),
            Value::Array(entries) => entries.iter().any(|entry| {
                let named = ["service", "serviceId", "serviceImplementationName"]
                    .iter()
                    .filter_map(|key| entry.get(*key).and_then(Value::as_str))
                    .any(|name| name == service);
                named && entry_operation(entry) == Some(operation)
            }),
            _ => false,
        }
    }
}

fn entry_operation(entry: &Value) -> Option<OperationKind> {
    match entry {
        Value::String(name) => OperationKind::parse(name),
        Value::Object(_) => entry
            .get("operation")
            .and_then(Value::as_str)
            .and_then(OperationKind::parse),
        _ => None,
    }
}
