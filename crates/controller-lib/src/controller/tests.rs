//! Phase tests driven by a scripted managed system

use super::*;
use crate::analyzer::{AnalysisData, CapacitySettings, QosThresholds};
use crate::client::RawMonitorData;
use crate::models::AdaptationRequest;
use crate::policy::PolicyKind;
use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Managed-system double replaying queued monitor payloads
#[derive(Default)]
struct ScriptedSystem {
    monitor: Mutex<VecDeque<Value>>,
    schemas: HashMap<SchemaKind, Value>,
    options: Value,
    reject_submission: Option<usize>,
    submitted: Mutex<Vec<Value>>,
    schema_fetches: AtomicUsize,
    option_fetches: AtomicUsize,
}

impl ScriptedSystem {
    fn with_monitor(payloads: Vec<Value>) -> Self {
        let mut schemas = HashMap::new();
        schemas.insert(SchemaKind::Monitor, json!({"type": "object"}));
        schemas.insert(SchemaKind::Execute, json!({"type": "object"}));
        schemas.insert(SchemaKind::AdaptationOptions, json!({"type": "object"}));
        Self {
            monitor: Mutex::new(payloads.into()),
            schemas,
            ..Self::default()
        }
    }

    fn submitted(&self) -> Vec<Value> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ManagedSystem for ScriptedSystem {
    async fn fetch_schema(&self, kind: SchemaKind) -> Result<Value> {
        self.schema_fetches.fetch_add(1, Ordering::SeqCst);
        self.schemas
            .get(&kind)
            .cloned()
            .ok_or_else(|| AdaptationError::EndpointNotReachable {
                url: format!("http://scripted/{}", kind.endpoint()),
            })
    }

    async fn fetch_monitor_data(&self) -> Result<RawMonitorData> {
        let next = self.monitor.lock().unwrap().pop_front();
        Ok(match next {
            Some(Value::Object(map)) => map,
            _ => RawMonitorData::new(),
        })
    }

    async fn fetch_adaptation_options(&self) -> Result<Value> {
        self.option_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.options.clone())
    }

    async fn submit_adaptation(&self, payload: &Value) -> Result<Value> {
        let mut submitted = self.submitted.lock().unwrap();
        if self.reject_submission == Some(submitted.len()) {
            return Err(AdaptationError::RemoteFailure {
                status: 500,
                body: "rejected".into(),
            });
        }
        submitted.push(payload.clone());
        Ok(json!({"status": "ok"}))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

fn service(id: &str, availability: &str, response_time: f64) -> Value {
    json!({
        "serviceId": id,
        "currentImplementationId": format!("{}-impl", id),
        "instances": [format!("{}-impl@10.0.0.1:58085", id)],
        "snapshot": [{
            "instanceId": format!("{}-impl@10.0.0.1:58085", id),
            "status": "ACTIVE",
            "qos": {"availability": availability, "responseTime": response_time}
        }],
        "instanceConfig": {}
    })
}

fn degraded_payload() -> Value {
    json!({
        "restaurant": service("restaurant", "70%", 0.4),
        "ordering": service("ordering", "99%", 0.4)
    })
}

fn healthy_payload() -> Value {
    json!({
        "restaurant": service("restaurant", "99%", 0.4),
        "ordering": service("ordering", "99%", 0.4)
    })
}

fn controller(system: Arc<ScriptedSystem>, kind: PolicyKind) -> Controller {
    Controller::new(
        system,
        kind.build(QosThresholds::default(), CapacitySettings::default()),
    )
}

#[tokio::test]
async fn test_full_cycle_submits_scale_out() {
    let system = Arc::new(ScriptedSystem::with_monitor(vec![degraded_payload()]));
    let mut controller = controller(system.clone(), PolicyKind::InstanceScaling);

    let outcome = controller.run_cycle().await.unwrap();

    match outcome {
        CycleOutcome::Executed(report) => assert_eq!(report.submitted, 1),
        other => panic!("expected execution, got {:?}", other),
    }
    assert_eq!(
        system.submitted(),
        vec![json!({
            "operation": "addInstances",
            "serviceImplementationName": "restaurant-impl",
            "numberOfInstances": 1
        })]
    );
    assert_eq!(controller.phase(), CyclePhase::Idle);
}

#[tokio::test]
async fn test_healthy_system_needs_no_adaptation() {
    let system = Arc::new(ScriptedSystem::with_monitor(vec![healthy_payload()]));
    let mut controller = controller(system.clone(), PolicyKind::InstanceScaling);

    let outcome = controller.run_cycle().await.unwrap();

    assert_eq!(outcome, CycleOutcome::NoAdaptation);
    assert!(system.submitted().is_empty());
}

#[tokio::test]
async fn test_phases_out_of_order() {
    let system = Arc::new(ScriptedSystem::with_monitor(vec![degraded_payload()]));
    let mut controller = controller(system, PolicyKind::InstanceScaling);

    assert!(!controller.analyze().await);
    assert!(!controller.plan().await);
    assert!(matches!(
        controller.execute().await,
        Err(AdaptationError::PhaseOutOfOrder {
            phase: "execute",
            requires: "plan"
        })
    ));

    assert!(controller.monitor().await.unwrap());
    assert!(!controller.plan().await);
    assert_eq!(controller.phase(), CyclePhase::Monitored);
}

#[tokio::test]
async fn test_empty_monitor_keeps_previous_snapshot() {
    let system = Arc::new(ScriptedSystem::with_monitor(vec![healthy_payload()]));
    let mut controller = controller(system, PolicyKind::InstanceScaling);

    assert!(controller.monitor().await.unwrap());
    assert_eq!(controller.run_cycle().await.unwrap(), CycleOutcome::MonitorUnavailable);

    let knowledge = controller.knowledge().read().await;
    assert_eq!(knowledge.monitored_data().len(), 2);
}

#[tokio::test]
async fn test_monitor_schema_fetched_once() {
    let system = Arc::new(ScriptedSystem::with_monitor(vec![
        healthy_payload(),
        healthy_payload(),
    ]));
    let mut controller = controller(system.clone(), PolicyKind::InstanceScaling);

    controller.run_cycle().await.unwrap();
    controller.run_cycle().await.unwrap();

    assert_eq!(system.schema_fetches.load(Ordering::SeqCst), 1);
    assert!(controller
        .knowledge()
        .read()
        .await
        .monitor_schema()
        .is_some());
}

#[tokio::test]
async fn test_monitor_schema_violation_is_raised() {
    let mut system = ScriptedSystem::with_monitor(vec![healthy_payload()]);
    system.schemas.insert(
        SchemaKind::Monitor,
        json!({"type": "object", "required": ["payment"]}),
    );
    let mut controller = controller(Arc::new(system), PolicyKind::InstanceScaling);

    let result = controller.monitor().await;

    match result {
        Err(AdaptationError::SchemaViolation { violations }) => {
            assert!(violations.iter().any(|v| v.contains("payment")));
        }
        other => panic!("expected schema violation, got {:?}", other),
    }
    assert!(controller.knowledge().read().await.monitored_data().is_empty());
}

#[tokio::test]
async fn test_stale_cached_schema_is_refetched() {
    let system = Arc::new(ScriptedSystem::with_monitor(vec![healthy_payload()]));
    let mut controller = controller(system.clone(), PolicyKind::InstanceScaling);
    controller.knowledge().write().await.set_schema(
        SchemaKind::Monitor,
        json!({"type": "object", "required": ["payment"]}),
    );

    assert!(controller.monitor().await.unwrap());

    assert_eq!(system.schema_fetches.load(Ordering::SeqCst), 1);
    assert_eq!(
        controller.knowledge().read().await.monitor_schema(),
        Some(&json!({"type": "object"}))
    );
}

#[tokio::test]
async fn test_schema_refetched_once_per_violation() {
    let mut system = ScriptedSystem::with_monitor(vec![healthy_payload(), healthy_payload()]);
    system.schemas.insert(
        SchemaKind::Monitor,
        json!({"type": "object", "required": ["payment"]}),
    );
    let system = Arc::new(system);
    let mut controller = controller(system.clone(), PolicyKind::InstanceScaling);

    assert!(controller.monitor().await.is_err());
    assert_eq!(system.schema_fetches.load(Ordering::SeqCst), 1);

    let result = controller.monitor().await;
    assert!(matches!(result, Err(AdaptationError::SchemaViolation { .. })));
    assert_eq!(system.schema_fetches.load(Ordering::SeqCst), 2);
}

fn broken_payload() -> Value {
    json!({
        "restaurant": service("restaurant", "not-a-number", 0.4),
        "ordering": service("ordering", "99%", 0.4)
    })
}

#[tokio::test]
async fn test_cycle_reports_failed_analysis() {
    let system = Arc::new(ScriptedSystem::with_monitor(vec![broken_payload()]));
    let mut controller = controller(system.clone(), PolicyKind::InstanceScaling);

    let trace = controller.traced_cycle(false).await;

    assert_eq!(trace.completed, CyclePhase::Monitored);
    assert_eq!(trace.outcome.unwrap(), CycleOutcome::AnalysisFailed);
    assert!(system.submitted().is_empty());
}

#[tokio::test]
async fn test_dry_run_stops_before_execute() {
    let system = Arc::new(ScriptedSystem::with_monitor(vec![degraded_payload()]));
    let mut controller = controller(system.clone(), PolicyKind::InstanceScaling);

    let trace = controller.traced_cycle(true).await;

    assert_eq!(trace.completed, CyclePhase::Planned);
    assert_eq!(trace.outcome.unwrap(), CycleOutcome::Planned);
    assert_eq!(controller.phase(), CyclePhase::Planned);
    assert!(system.submitted().is_empty());
    assert_eq!(controller.knowledge().read().await.plan_data().len(), 1);
}

#[tokio::test]
async fn test_no_adaptation_trace_stops_after_analysis() {
    let system = Arc::new(ScriptedSystem::with_monitor(vec![healthy_payload()]));
    let mut controller = controller(system, PolicyKind::InstanceScaling);

    let trace = controller.traced_cycle(true).await;

    assert_eq!(trace.completed, CyclePhase::Analyzed);
    assert_eq!(trace.outcome.unwrap(), CycleOutcome::NoAdaptation);
}

#[tokio::test]
async fn test_failed_analysis_keeps_previous_result() {
    let system = Arc::new(ScriptedSystem::with_monitor(vec![degraded_payload(), broken_payload()]));
    let mut controller = controller(system, PolicyKind::InstanceScaling);

    assert!(controller.monitor().await.unwrap());
    assert!(controller.analyze().await);
    let before = controller.knowledge().read().await.analysis_data().clone();

    assert!(controller.monitor().await.unwrap());
    assert!(!controller.analyze().await);

    let after = controller.knowledge().read().await.analysis_data().clone();
    assert_eq!(before, after);
    assert!(matches!(after, AnalysisData::Scaling { .. }));
}

#[tokio::test]
async fn test_qos_report_fetches_catalog_lazily() {
    let mut system = ScriptedSystem::with_monitor(vec![degraded_payload(), degraded_payload()]);
    system.options = json!({"restaurant": [{"operation": "addInstances"}]});
    let system = Arc::new(system);
    let mut controller = controller(system.clone(), PolicyKind::QosReport);

    controller.run_cycle().await.unwrap();
    controller.run_cycle().await.unwrap();

    assert_eq!(system.option_fetches.load(Ordering::SeqCst), 1);
    assert_eq!(system.submitted().len(), 2);
}

#[tokio::test]
async fn test_qos_report_without_catalog_entry_plans_nothing() {
    let mut system = ScriptedSystem::with_monitor(vec![degraded_payload()]);
    system.options = json!({"ordering": ["addInstances"]});
    let system = Arc::new(system);
    let mut controller = controller(system.clone(), PolicyKind::QosReport);

    assert_eq!(controller.run_cycle().await.unwrap(), CycleOutcome::NoAdaptation);
    assert!(controller.knowledge().read().await.plan_data().is_empty());
    assert!(system.submitted().is_empty());
}

#[tokio::test]
async fn test_execute_failure_propagates() {
    let mut system = ScriptedSystem::with_monitor(vec![json!({
        "restaurant": service("restaurant", "70%", 0.4),
        "ordering": service("ordering", "70%", 0.4)
    })]);
    system.reject_submission = Some(1);
    let system = Arc::new(system);
    let mut controller = controller(system.clone(), PolicyKind::InstanceScaling);

    let result = controller.run_cycle().await;

    assert!(matches!(
        result,
        Err(AdaptationError::RemoteFailure { status: 500, .. })
    ));
    // BTreeMap order: ordering-impl first, restaurant-impl rejected
    assert_eq!(system.submitted().len(), 1);
    assert_eq!(
        controller.knowledge().read().await.plan_data().len(),
        2
    );
}

#[tokio::test]
async fn test_plan_replaces_previous_plan() {
    let system = Arc::new(ScriptedSystem::with_monitor(vec![
        degraded_payload(),
        healthy_payload(),
    ]));
    let mut controller = controller(system, PolicyKind::InstanceScaling);

    controller.run_cycle().await.unwrap();
    assert_eq!(
        controller.knowledge().read().await.plan_data(),
        &PlanData::requests(vec![AdaptationRequest::add_instances("restaurant-impl", 1)])
    );

    assert!(controller.monitor().await.unwrap());
    assert!(!controller.analyze().await);
    assert!(!controller.plan().await);
    assert!(controller.knowledge().read().await.plan_data().is_empty());
}

mod loop_tests {
    use super::*;
    use crate::health::{components, ComponentStatus, HealthRegistry};
    use std::time::Duration;
    use tokio::sync::broadcast;

    fn fast_loop(controller: Controller, health: HealthRegistry, max_cycles: u64) -> AdaptationLoop {
        let config = LoopConfig {
            interval: Duration::from_millis(1),
            max_cycles: Some(max_cycles),
        };
        AdaptationLoop::new(controller, config, health)
    }

    #[tokio::test]
    async fn test_loop_runs_bounded_cycles() {
        let system = Arc::new(ScriptedSystem::with_monitor(vec![
            degraded_payload(),
            degraded_payload(),
        ]));
        let health = HealthRegistry::for_phases().await;
        let (_tx, rx) = broadcast::channel(1);

        let exit = fast_loop(controller(system.clone(), PolicyKind::InstanceScaling), health.clone(), 2)
            .run(rx)
            .await;

        assert_eq!(exit, LoopExit::CyclesCompleted(2));
        assert_eq!(system.submitted().len(), 2);
        assert!(health.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_loop_stops_on_missing_endpoint() {
        let mut system = ScriptedSystem::with_monitor(vec![healthy_payload(), healthy_payload()]);
        system.schemas.clear();
        let health = HealthRegistry::for_phases().await;
        let (_tx, rx) = broadcast::channel(1);

        let exit = fast_loop(controller(Arc::new(system), PolicyKind::InstanceScaling), health.clone(), 5)
            .run(rx)
            .await;

        assert!(matches!(exit, LoopExit::Fatal(_)));
        let status = health.health().await;
        assert_eq!(status.components[components::MONITOR].status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_loop_survives_execute_failure() {
        let mut system = ScriptedSystem::with_monitor(vec![degraded_payload(), degraded_payload()]);
        system.reject_submission = Some(0);
        let system = Arc::new(system);
        let health = HealthRegistry::for_phases().await;
        let (_tx, rx) = broadcast::channel(1);

        let exit = fast_loop(controller(system.clone(), PolicyKind::InstanceScaling), health.clone(), 2)
            .run(rx)
            .await;

        assert_eq!(exit, LoopExit::CyclesCompleted(2));
        assert!(system.submitted().is_empty());
        let status = health.health().await;
        assert_eq!(status.components[components::EXECUTOR].status, ComponentStatus::Degraded);
    }

    #[tokio::test]
    async fn test_loop_degrades_analyzer_on_failed_analysis() {
        let system = Arc::new(ScriptedSystem::with_monitor(vec![broken_payload()]));
        let health = HealthRegistry::for_phases().await;
        let (_tx, rx) = broadcast::channel(1);

        let exit = fast_loop(controller(system.clone(), PolicyKind::InstanceScaling), health.clone(), 1)
            .run(rx)
            .await;

        assert_eq!(exit, LoopExit::CyclesCompleted(1));
        let status = health.health().await;
        assert_eq!(status.components[components::MONITOR].status, ComponentStatus::Healthy);
        assert_eq!(status.components[components::ANALYZER].status, ComponentStatus::Degraded);
        assert!(system.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_loop_honours_shutdown() {
        let system = Arc::new(ScriptedSystem::with_monitor(vec![degraded_payload()]));
        let (tx, rx) = broadcast::channel(1);
        tx.send(()).unwrap();

        let exit = AdaptationLoop::new(
            controller(system.clone(), PolicyKind::InstanceScaling),
            LoopConfig::default(),
            HealthRegistry::new(),
        )
        .run(rx)
        .await;

        assert_eq!(exit, LoopExit::Shutdown);
        assert!(system.submitted().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_deadline_counts_as_no_data() {
        struct StalledSystem;

        #[async_trait]
        impl ManagedSystem for StalledSystem {
            async fn fetch_schema(&self, _kind: SchemaKind) -> Result<Value> {
                Ok(json!({}))
            }
            async fn fetch_monitor_data(&self) -> Result<RawMonitorData> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(RawMonitorData::new())
            }
            async fn fetch_adaptation_options(&self) -> Result<Value> {
                Ok(json!({}))
            }
            async fn submit_adaptation(&self, _payload: &Value) -> Result<Value> {
                Ok(Value::Null)
            }
            async fn ping(&self) -> Result<()> {
                Ok(())
            }
        }

        let mut controller = Controller::new(
            Arc::new(StalledSystem),
            PolicyKind::InstanceScaling.build(QosThresholds::default(), CapacitySettings::default()),
        )
        .with_monitor_deadline(Some(Duration::from_secs(5)));

        assert!(!controller.monitor().await.unwrap());
        assert_eq!(controller.phase(), CyclePhase::Idle);
    }
}
