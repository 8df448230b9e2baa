//! Integration tests for the controller API endpoints

#[path = "../src/api.rs"]
#[allow(dead_code)]
mod api;

use api::{create_router, AppState};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use controller_lib::{
    health::{components, HealthRegistry},
    observability::ControllerMetrics,
    AdaptationRequest, KnowledgeStore, PlanData,
};
use std::sync::Arc;
use tower::ServiceExt;

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::for_phases().await;
    let state = Arc::new(AppState::new(
        health_registry,
        ControllerMetrics::new(),
        KnowledgeStore::new(),
    ));
    (create_router(state.clone()), state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let (status, body) = get(app, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    for name in components::ALL {
        assert!(health["components"][name].is_object());
    }
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, state) = setup_test_app().await;
    state
        .health_registry
        .set_degraded(components::MONITOR, "no monitor data after retries")
        .await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
    assert_eq!(
        health["components"]["monitor"]["message"],
        "no monitor data after retries"
    );
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app().await;
    state
        .health_registry
        .set_unhealthy(components::EXECUTOR, "endpoint not reachable")
        .await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_follows_registry() {
    let (app, state) = setup_test_app().await;

    let (status, readiness) = get_json(app.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);

    state.health_registry.set_ready(true).await;
    let (status, readiness) = get_json(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, state) = setup_test_app().await;
    state.metrics.observe_cycle_latency(0.4);
    state.metrics.inc_cycles("executed");
    state.metrics.inc_adaptations_submitted("addInstances");

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    assert!(text.contains("mapek_cycle_latency_seconds_bucket"));
    assert!(text.contains("mapek_cycles_total{outcome=\"executed\"}"));
    assert!(text.contains("mapek_adaptations_submitted_total{operation=\"addInstances\"}"));
}

#[tokio::test]
async fn test_knowledge_endpoint_reflects_store() {
    let (app, state) = setup_test_app().await;
    state
        .knowledge
        .write()
        .await
        .set_plan_data(PlanData::requests(vec![AdaptationRequest::add_instances(
            "restaurant-impl",
            1,
        )]));

    let (status, knowledge) = get_json(app, "/knowledge").await;

    assert_eq!(status, StatusCode::OK);
    assert!(knowledge["captured_at"].is_i64());
    assert_eq!(
        knowledge["plan_data"]["requests"][0]["serviceImplementationName"],
        "restaurant-impl"
    );
    assert_eq!(knowledge["analysis_data"]["kind"], "empty");
}
