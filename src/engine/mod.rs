pub mod api;
pub mod compare;
pub mod config;
pub mod error;
pub mod judge;
pub mod lifecycle;
pub mod metrics;
pub mod models;
pub mod problems;
pub mod queue;
pub mod sandbox;
pub mod store;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;

use crate::engine::{
    api::routes,
    config::EngineConfig,
    judge::Judge,
    lifecycle::SubmissionService,
    metrics::MetricsRegistry,
    problems::InMemoryProblems,
    queue::Scheduler,
    sandbox::{LanguageRegistry, SandboxFactory},
    store::MemoryStore,
    worker::spawn_worker_pool,
};

pub async fn run() -> anyhow::Result<()> {
    let config = EngineConfig::from_env();
    init_tracing(&config);

    let problems = match &config.problems_path {
        Some(path) => InMemoryProblems::load(path)
            .await
            .context("problem catalogue init failed")?,
        None => {
            tracing::warn!("PROBLEMS_PATH not set, every submission will fail lookup");
            InMemoryProblems::default()
        }
    };
    let languages = match &config.languages_path {
        Some(path) => LanguageRegistry::load(path)
            .await
            .context("language registry init failed")?,
        None => LanguageRegistry::builtin(),
    };
    tracing::info!(
        problems = problems.len(),
        languages = ?languages.names(),
        backend = ?config.sandbox.backend,
        "catalogues loaded"
    );

    let store = Arc::new(MemoryStore::new(config.persistence_path.clone()));
    let metrics = Arc::new(MetricsRegistry::new());
    let scheduler = Scheduler::new(config.queue_capacity, metrics.clone());
    let sandbox = SandboxFactory::from_config(&config.sandbox, languages);
    let judge = Arc::new(Judge::new(
        store.clone(),
        Arc::new(problems),
        sandbox,
        metrics.clone(),
    ));

    spawn_worker_pool(
        config.worker_count.max(1),
        scheduler.receiver(),
        judge,
        metrics.clone(),
    );

    let service = SubmissionService::new(store, scheduler, config.max_code_bytes);
    let app: Router = routes(config.api_keys.clone(), service, metrics);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .context("failed to bind listener")?;
    let local = listener
        .local_addr()
        .unwrap_or(SocketAddr::from(([0, 0, 0, 0], 0)));
    tracing::info!(bind = %local, workers = config.worker_count, "judge engine ready");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("judge server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

fn init_tracing(config: &EngineConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_current_span(false)
        .with_span_list(false)
        .init();
}
