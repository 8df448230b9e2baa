//! Self-adaptation controller library
//!
//! This crate provides the core of a MAPE-K control loop:
//! - Knowledge store shared by the phases
//! - JSON Schema validation of monitor, option and execute documents
//! - HTTP client for the managed system with cold-start retries
//! - Analysis and planning strategies behind `AdaptationPolicy`
//! - Ordered, fail-fast plan execution
//! - Health checks and observability

pub mod analyzer;
pub mod client;
pub mod controller;
pub mod error;
pub mod executor;
pub mod health;
pub mod knowledge;
pub mod models;
pub mod observability;
pub mod planner;
pub mod policy;
pub mod schema;

pub use client::{HttpManagedSystem, ManagedSystem, RetryPolicy};
pub use controller::{
    AdaptationLoop, Controller, CycleOutcome, CyclePhase, CycleTrace, LoopConfig, LoopExit,
    ValidationSettings,
};
pub use error::{AdaptationError, Result};
pub use executor::{ExecutionReport, Executor};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use knowledge::{Knowledge, KnowledgeSnapshot, KnowledgeStore, SchemaKind};
pub use models::*;
pub use observability::{ControllerMetrics, StructuredLogger};
pub use policy::{AdaptationPolicy, PolicyKind};
