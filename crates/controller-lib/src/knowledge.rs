//! Shared Knowledge of the MAPE-K loop
//!
//! Holds the latest monitored snapshot, the analysis result, the current
//! plan, the adaptation-option catalog and the cached schemas. Every setter
//! overwrites the previous value wholesale.

use crate::analyzer::AnalysisData;
use crate::models::{AdaptationOptions, MonitoredData, PlanData};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Schemas published by the managed system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
    Monitor,
    Execute,
    AdaptationOptions,
}

impl SchemaKind {
    pub const ALL: [SchemaKind; 3] = [
        SchemaKind::Monitor,
        SchemaKind::Execute,
        SchemaKind::AdaptationOptions,
    ];

    /// Endpoint suffix serving this schema
    pub fn endpoint(&self) -> &'static str {
        match self {
            SchemaKind::Monitor => "monitor_schema",
            SchemaKind::Execute => "execute_schema",
            SchemaKind::AdaptationOptions => "adaptation_options_schema",
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.endpoint())
    }
}

/// Schemas fetched once and reused until one of them rejects a document
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct SchemaCache {
    schemas: HashMap<SchemaKind, Value>,
}

impl SchemaCache {
    pub fn get(&self, kind: SchemaKind) -> Option<&Value> {
        self.schemas.get(&kind)
    }

    pub fn insert(&mut self, kind: SchemaKind, schema: Value) {
        self.schemas.insert(kind, schema);
    }

    pub fn contains(&self, kind: SchemaKind) -> bool {
        self.schemas.contains_key(&kind)
    }

    pub fn invalidate(&mut self, kind: SchemaKind) {
        self.schemas.remove(&kind);
    }
}

/// Knowledge base shared by the four phases
#[derive(Debug, Clone, Default, Serialize)]
pub struct Knowledge {
    monitored_data: MonitoredData,
    analysis_data: AnalysisData,
    plan_data: PlanData,
    adaptation_options: AdaptationOptions,
    schemas: SchemaCache,
}

impl Knowledge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn monitored_data(&self) -> &MonitoredData {
        &self.monitored_data
    }

    pub fn set_monitored_data(&mut self, data: MonitoredData) {
        self.monitored_data = data;
    }

    pub fn analysis_data(&self) -> &AnalysisData {
        &self.analysis_data
    }

    pub fn set_analysis_data(&mut self, data: AnalysisData) {
        self.analysis_data = data;
    }

    pub fn plan_data(&self) -> &PlanData {
        &self.plan_data
    }

    pub fn set_plan_data(&mut self, plan: PlanData) {
        self.plan_data = plan;
    }

    pub fn adaptation_options(&self) -> &AdaptationOptions {
        &self.adaptation_options
    }

    pub fn set_adaptation_options(&mut self, options: AdaptationOptions) {
        self.adaptation_options = options;
    }

    pub fn monitor_schema(&self) -> Option<&Value> {
        self.schemas.get(SchemaKind::Monitor)
    }

    pub fn execute_schema(&self) -> Option<&Value> {
        self.schemas.get(SchemaKind::Execute)
    }

    pub fn adaptation_options_schema(&self) -> Option<&Value> {
        self.schemas.get(SchemaKind::AdaptationOptions)
    }

    pub fn schema(&self, kind: SchemaKind) -> Option<&Value> {
        self.schemas.get(kind)
    }

    pub fn set_schema(&mut self, kind: SchemaKind, schema: Value) {
        self.schemas.insert(kind, schema);
    }

    pub fn schemas_mut(&mut self) -> &mut SchemaCache {
        &mut self.schemas
    }
}

/// Point-in-time copy of Knowledge served by the controller API
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeSnapshot {
    pub captured_at: i64,
    #[serde(flatten)]
    pub knowledge: Knowledge,
}

/// Knowledge guarded by a single writer lock.
///
/// The driving loop is the only writer; readers (the HTTP API) take
/// consistent copies between phases.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeStore {
    inner: Arc<RwLock<Knowledge>>,
}

impl KnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, Knowledge> {
        self.inner.read().await
    }

    pub async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, Knowledge> {
        self.inner.write().await
    }

    pub async fn snapshot(&self) -> KnowledgeSnapshot {
        KnowledgeSnapshot {
            captured_at: chrono::Utc::now().timestamp(),
            knowledge: self.inner.read().await.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AdaptationRequest, ServiceSnapshot};
    use serde_json::json;

    fn snapshot(service: &str) -> ServiceSnapshot {
        serde_json::from_value(json!({
            "serviceId": service,
            "currentImplementationId": format!("{}-impl", service),
            "snapshot": []
        }))
        .unwrap()
    }

    #[test]
    fn test_knowledge_starts_empty() {
        let knowledge = Knowledge::new();
        assert!(knowledge.monitored_data().is_empty());
        assert!(knowledge.plan_data().is_empty());
        assert!(knowledge.adaptation_options().is_empty());
        for kind in SchemaKind::ALL {
            assert!(knowledge.schema(kind).is_none());
        }
    }

    #[test]
    fn test_set_overwrites_without_merge() {
        let mut knowledge = Knowledge::new();

        let mut first = MonitoredData::new();
        first.insert("a".into(), snapshot("a"));
        first.insert("b".into(), snapshot("b"));
        knowledge.set_monitored_data(first);

        let mut second = MonitoredData::new();
        second.insert("c".into(), snapshot("c"));
        knowledge.set_monitored_data(second);

        let keys: Vec<_> = knowledge.monitored_data().keys().cloned().collect();
        assert_eq!(keys, vec!["c".to_string()]);

        knowledge.set_plan_data(PlanData::requests(vec![AdaptationRequest::add_instances("a", 1)]));
        knowledge.set_plan_data(PlanData::Empty);
        assert!(knowledge.plan_data().is_empty());
    }

    #[test]
    fn test_schema_cache_invalidation() {
        let mut knowledge = Knowledge::new();
        knowledge.set_schema(SchemaKind::Monitor, json!({"type": "object"}));
        knowledge.set_schema(SchemaKind::Execute, json!({"type": "object"}));
        assert!(knowledge.monitor_schema().is_some());
        assert!(knowledge.execute_schema().is_some());

        knowledge.schemas_mut().invalidate(SchemaKind::Monitor);
        assert!(knowledge.monitor_schema().is_none());
        assert!(knowledge.execute_schema().is_some());
    }

    #[tokio::test]
    async fn test_store_snapshot_is_a_copy() {
        let store = KnowledgeStore::new();
        store
            .write()
            .await
            .set_plan_data(PlanData::requests(vec![AdaptationRequest::add_instances("a", 1)]));

        let snapshot = store.snapshot().await;
        store.write().await.set_plan_data(PlanData::Empty);

        assert_eq!(snapshot.knowledge.plan_data().len(), 1);
        assert!(store.read().await.plan_data().is_empty());
    }
}
