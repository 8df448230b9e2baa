//! Read-only views of the managed system

use anyhow::Result;
use colored::Colorize;
use controller_lib::{
    Controller, MonitoredData, PolicyKind, SchemaKind, ValidationSettings,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tabled::Tabled;

use super::Session;
use crate::output::{
    color_status, format_availability, format_seconds, print_json, print_table, print_warning,
    OutputFormat,
};

/// Row for the monitor table
#[derive(Tabled, Serialize)]
struct InstanceRow {
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Implementation")]
    implementation: String,
    #[tabled(rename = "Instance")]
    instance: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Availability")]
    availability: String,
    #[tabled(rename = "Response")]
    response_time: String,
    #[tabled(rename = "Utilization")]
    utilization: String,
}

/// Row for the adaptation options table
#[derive(Tabled, Serialize)]
struct OptionRow {
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Operations")]
    operations: String,
}

/// Controller used for one-shot reads; the policy is never consulted
fn reader(session: &Session, validation: ValidationSettings) -> Result<Controller> {
    let client = session.managed_system()?;
    let policy = PolicyKind::default().build(Default::default(), Default::default());
    Ok(Controller::new(Arc::new(client), policy).with_validation(validation))
}

/// Print a schema published by the managed system
pub async fn show_schema(session: &Session, kind: SchemaKind) -> Result<()> {
    let controller = reader(session, ValidationSettings::default())?;
    let schema = controller.schema(kind).await?;
    print_json(&schema);
    Ok(())
}

/// Show the monitored architecture, one row per instance
pub async fn show_monitor(session: &Session, validate: bool) -> Result<()> {
    let mut controller = reader(
        session,
        ValidationSettings {
            validate_monitor: validate,
            ..ValidationSettings::default()
        },
    )?;

    if !controller.monitor().await? {
        print_warning(&format!(
            "Managed system returned no data after {} attempts",
            session.attempts
        ));
        return Ok(());
    }

    let knowledge = controller.knowledge().read().await;
    let data = knowledge.monitored_data();

    match session.format {
        OutputFormat::Json => print_json(data),
        OutputFormat::Table => {
            println!("{}", "Monitored Architecture".bold());
            print_table(&instance_rows(data), OutputFormat::Table);
            println!("\nTotal: {} services", data.len());
        }
    }

    Ok(())
}

fn instance_rows(data: &MonitoredData) -> Vec<InstanceRow> {
    let mut rows = Vec::new();

    for (service_id, service) in data {
        if service.snapshot.is_empty() {
            rows.push(InstanceRow {
                service: service_id.clone(),
                implementation: service.current_implementation_id.clone(),
                instance: "-".into(),
                status: "-".into(),
                availability: "-".into(),
                response_time: "-".into(),
                utilization: "-".into(),
            });
            continue;
        }

        for instance in &service.snapshot {
            let qos = instance.qos.as_ref();
            let availability = qos
                .and_then(|q| q.availability.as_ref())
                .and_then(|a| a.as_percent().ok());
            rows.push(InstanceRow {
                service: service_id.clone(),
                implementation: service.current_implementation_id.clone(),
                instance: instance.instance_id.clone(),
                status: color_status(instance.status.as_str()),
                availability: format_availability(availability),
                response_time: format_seconds(qos.and_then(|q| q.response_time)),
                utilization: qos
                    .and_then(|q| q.utilization)
                    .map(|u| format!("{:.0}%", u * 100.0))
                    .unwrap_or_else(|| "-".into()),
            });
        }
    }

    rows
}

/// Show the adaptation option catalog
pub async fn show_options(session: &Session, validate: bool) -> Result<()> {
    let controller = reader(
        session,
        ValidationSettings {
            validate_options: validate,
            ..ValidationSettings::default()
        },
    )?;

    let options = controller.adaptation_options().await?;
    if options.is_empty() {
        print_warning("Managed system offers no adaptation options");
        return Ok(());
    }

    match session.format {
        OutputFormat::Json => print_json(&options),
        OutputFormat::Table => match option_rows(&options.0) {
            Some(rows) => print_table(&rows, OutputFormat::Table),
            None => print_json(&options),
        },
    }

    Ok(())
}

/// Tabulate the keyed catalog layout; other layouts are printed as JSON
fn option_rows(catalog: &Value) -> Option<Vec<OptionRow>> {
    let services = catalog.as_object()?;

    Some(
        services
            .iter()
            .map(|(service, entries)| {
                let operations = entries
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|entry| match entry {
                                Value::String(name) => Some(name.as_str()),
                                other => other.get("operation").and_then(Value::as_str),
                            })
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .unwrap_or_default();
                OptionRow {
                    service: service.clone(),
                    operations,
                }
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_instance_rows_cover_empty_services() {
        let data: MonitoredData = serde_json::from_value(json!({
            "restaurant": {
                "serviceId": "restaurant",
                "currentImplementationId": "restaurant-impl",
                "snapshot": [{
                    "instanceId": "restaurant-impl@10.0.0.1:8080",
                    "status": "ACTIVE",
                    "qos": {"availability": "97.5%", "responseTime": 0.25, "utilization": 0.4}
                }]
            },
            "gateway": {
                "serviceId": "gateway",
                "currentImplementationId": "gateway-impl",
                "snapshot": null
            }
        }))
        .unwrap();

        let rows = instance_rows(&data);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].service, "gateway");
        assert_eq!(rows[0].instance, "-");
        assert_eq!(rows[1].availability, "97.5%");
        assert_eq!(rows[1].response_time, "0.250s");
        assert_eq!(rows[1].utilization, "40%");
    }

    #[test]
    fn test_option_rows_from_keyed_catalog() {
        let catalog = json!({
            "restaurant": ["addInstances", {"operation": "removeInstance"}]
        });

        let rows = option_rows(&catalog).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].operations, "addInstances, removeInstance");
        assert!(option_rows(&json!([{"service": "restaurant"}])).is_none());
    }
}
