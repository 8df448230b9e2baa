//! Adaptation controller daemon
//!
//! Runs the MAPE-K loop against a managed system and serves health,
//! metrics and knowledge over HTTP.

use anyhow::{anyhow, Result};
use controller_lib::{
    health::HealthRegistry,
    observability::{ControllerMetrics, StructuredLogger},
    AdaptationLoop, Controller, HttpManagedSystem, KnowledgeStore, LoopExit, ManagedSystem,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const CONTROLLER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = config::ControllerConfig::load()?;
    info!(
        base_url = %config.base_url,
        policy = %config.policy,
        interval_secs = config.cycle_interval_secs,
        "Controller configured"
    );

    let health_registry = HealthRegistry::for_phases().await;
    let metrics = ControllerMetrics::new();
    let logger = StructuredLogger::new(&config.controller_name);
    logger.log_startup(CONTROLLER_VERSION, config.policy.as_str(), &config.base_url);

    let client = HttpManagedSystem::new(&config.base_url, config.retry_policy())?;
    if let Err(e) = client.ping().await {
        warn!(error = %e, "Managed system not answering yet, relying on monitor retries");
    }
    let knowledge = KnowledgeStore::new();
    let controller = Controller::new(Arc::new(client), config.build_policy())
        .with_knowledge(knowledge.clone())
        .with_validation(config.validation())
        .with_monitor_deadline(config.monitor_deadline())
        .with_logger(logger.clone());

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics,
        knowledge,
    ));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let adaptation_loop = AdaptationLoop::new(controller, config.loop_config(), health_registry)
        .with_logger(logger.clone());
    let mut loop_handle = tokio::spawn(adaptation_loop.run(shutdown_rx));

    let exit = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
            // Lets a cycle in flight finish
            let _ = shutdown_tx.send(());
            loop_handle.await?
        }
        exit = &mut loop_handle => exit?,
    };

    api_handle.abort();

    match exit {
        LoopExit::Fatal(reason) => Err(anyhow!("adaptation loop stopped: {}", reason)),
        other => {
            info!(exit = ?other, "Adaptation loop finished, shutting down");
            Ok(())
        }
    }
}
