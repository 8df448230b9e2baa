//! Queries against a running controller daemon

use anyhow::Result;
use colored::Colorize;
use controller_lib::HealthResponse;
use serde::Serialize;
use serde_json::{json, Value};
use tabled::Tabled;

use crate::client::DaemonClient;
use crate::output::{
    color_status, format_timestamp, print_info, print_json, print_table, print_warning,
    OutputFormat,
};

/// Row for the component health table
#[derive(Tabled, Serialize)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    component: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Last Check")]
    last_check: String,
}

fn component_rows(health: &HealthResponse) -> Vec<ComponentRow> {
    let mut names: Vec<&String> = health.components.keys().collect();
    names.sort();

    names
        .into_iter()
        .map(|name| {
            let component = &health.components[name];
            let status = serde_json::to_value(component.status)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            ComponentRow {
                component: name.clone(),
                status: color_status(&status),
                message: component.message.clone().unwrap_or_else(|| "-".into()),
                last_check: format_timestamp(component.last_check_timestamp),
            }
        })
        .collect()
}

/// Show liveness and readiness of the daemon
pub async fn show_status(daemon_url: &str, format: OutputFormat) -> Result<()> {
    let client = DaemonClient::new(daemon_url)?;
    let health = client.health().await?;
    let readiness = client.readiness().await?;

    match format {
        OutputFormat::Json => print_json(&json!({
            "health": health,
            "readiness": readiness,
        })),
        OutputFormat::Table => {
            let overall = serde_json::to_value(health.status)?;
            println!("{}", "Controller Status".bold());
            println!("{}", "=".repeat(50));
            println!("Daemon:   {}", daemon_url.cyan());
            println!(
                "Health:   {}",
                color_status(overall.as_str().unwrap_or_default())
            );
            println!(
                "Ready:    {}",
                if readiness.ready {
                    "yes".green()
                } else {
                    "no".red()
                }
            );
            if let Some(reason) = &readiness.reason {
                print_info(reason);
            }
            println!();
            print_table(&component_rows(&health), OutputFormat::Table);
        }
    }

    Ok(())
}

/// Show the knowledge snapshot the daemon is working from
pub async fn show_knowledge(daemon_url: &str, format: OutputFormat) -> Result<()> {
    let client = DaemonClient::new(daemon_url)?;
    let knowledge = client.knowledge().await?;

    match format {
        OutputFormat::Json => print_json(&knowledge),
        OutputFormat::Table => {
            let summary = KnowledgeSummary::from_snapshot(&knowledge);
            println!("{}", "Controller Knowledge".bold());
            println!("{}", "=".repeat(50));
            println!("Captured:          {}", summary.captured_at);
            println!("Services:          {}", summary.services);
            println!("Analysis:          {}", summary.analysis_kind);
            println!("Plan submissions:  {}", summary.plan_size);
            println!("Cached schemas:    {}", summary.schemas);
            if summary.services == 0 {
                print_warning("No monitored data yet");
            }
            print_info("Use --format json to see the full snapshot");
        }
    }

    Ok(())
}

/// Headline numbers of a knowledge snapshot
#[derive(Debug, PartialEq)]
struct KnowledgeSummary {
    captured_at: String,
    services: usize,
    analysis_kind: String,
    plan_size: usize,
    schemas: usize,
}

impl KnowledgeSummary {
    fn from_snapshot(snapshot: &Value) -> Self {
        let plan = &snapshot["plan_data"];
        let plan_size = if let Some(requests) = plan.get("requests").and_then(Value::as_array) {
            requests.len()
        } else if plan.get("server_number").is_some() {
            1
        } else {
            0
        };

        Self {
            captured_at: snapshot["captured_at"]
                .as_i64()
                .map(format_timestamp)
                .unwrap_or_else(|| "-".into()),
            services: snapshot["monitored_data"]
                .as_object()
                .map(|m| m.len())
                .unwrap_or(0),
            analysis_kind: snapshot["analysis_data"]["kind"]
                .as_str()
                .unwrap_or("empty")
                .to_string(),
            plan_size,
            schemas: snapshot["schemas"]
                .as_object()
                .map(|m| m.len())
                .unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_of_snapshot() {
        let snapshot = json!({
            "captured_at": 0,
            "monitored_data": {"restaurant": {}, "gateway": {}},
            "analysis_data": {"kind": "scaling", "decisions": {"restaurant-impl": "addInstance"}},
            "plan_data": {"requests": [{"operation": "addInstances"}]},
        });

        let summary = KnowledgeSummary::from_snapshot(&snapshot);

        assert_eq!(summary.captured_at, "1970-01-01 00:00:00 UTC");
        assert_eq!(summary.services, 2);
        assert_eq!(summary.analysis_kind, "scaling");
        assert_eq!(summary.plan_size, 1);
    }

    #[test]
    fn test_summary_of_target_state_plan() {
        let snapshot = json!({
            "plan_data": {"server_number": 2, "dimmer_factor": 0.5},
        });

        let summary = KnowledgeSummary::from_snapshot(&snapshot);

        assert_eq!(summary.plan_size, 1);
        assert_eq!(summary.services, 0);
        assert_eq!(summary.analysis_kind, "empty");
    }
}
