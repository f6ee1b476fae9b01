pub mod api;
pub mod classifier;
pub mod config;
pub mod dailylog;
pub mod error;
pub mod ingest;
pub mod insight;
pub mod pipeline;
pub mod producers;
pub mod state;
pub mod todo;
pub mod vault;

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::Result;
use crate::insight::InsightEngine;
use crate::pipeline::Pipeline;
use crate::producers::keystroke::NoFrontmostApp;
use crate::state::AppState;

/// Boots the daemon: loads config, wires up the shared state, spawns
/// every background task, and serves the HTTP surface until ctrl-c.
pub async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = config::init_config()?;
    config::validate_config(&config)?;
    tracing::info!("vault_path = {:?}", config.vault_path);

    let state = Arc::new(AppState::new(config.clone())?);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut tasks = Vec::new();

    let pipeline = Pipeline::new(
        state.queue.clone(),
        state.classifier.clone(),
        state.todo_store.clone(),
        state.daily_log.clone(),
        state.vault.clone(),
    );
    tasks.push(tokio::spawn({
        let rx = shutdown_rx.clone();
        async move { pipeline.run(rx).await }
    }));

    tasks.push(tokio::spawn({
        let queue = state.queue.clone();
        let rx = shutdown_rx.clone();
        async move { producers::clipboard::run(queue, rx).await }
    }));

    tasks.push(tokio::spawn({
        let queue = state.queue.clone();
        let rx = shutdown_rx.clone();
        async move { producers::browser_history::run(queue, rx).await }
    }));

    tasks.push(tokio::spawn({
        let queue = state.queue.clone();
        let dirs = config.watch_dirs.clone();
        let rx = shutdown_rx.clone();
        async move { producers::filesystem::run(queue, dirs, rx).await }
    }));

    if config.input_hook.enabled {
        tasks.push(tokio::spawn({
            let queue = state.queue.clone();
            let dedicated = config.input_hook.dedicated_apps.clone();
            let rx = shutdown_rx.clone();
            async move {
                producers::keystroke::run(queue, dedicated, Arc::new(NoFrontmostApp), rx).await
            }
        }));
    }

    tasks.push(tokio::spawn({
        let queue = state.queue.clone();
        let buffers = state.terminal_buffers.clone();
        let rx = shutdown_rx.clone();
        async move { api::terminal::run_sweep(queue, buffers, rx).await }
    }));

    let provider = Box::new(classifier::OpenAiCompatibleProvider::new(&config.llm));
    let insight_engine = Arc::new(InsightEngine::new(
        state.vault.clone(),
        state.daily_log.clone(),
        state.todo_store.clone(),
        Some(Arc::from(provider as Box<dyn classifier::LlmProvider>)),
    ));
    tasks.push(tokio::spawn({
        let rx = shutdown_rx.clone();
        let daily_time = config.insight.daily_time.clone();
        async move { insight_engine.run_scheduler(daily_time, rx).await }
    }));

    let port = config.http_port;
    let server_state = state.clone();
    let server = tokio::spawn(async move {
        if let Err(e) = api::run_server(server_state, port).await {
            tracing::error!("HTTP server exited: {e}");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| error::SoulAgentError::Config(format!("failed to listen for ctrl-c: {e}")))?;
    tracing::info!("shutdown requested");

    let _ = shutdown_tx.send(true);
    server.abort();

    for task in tasks {
        let _ = tokio::time::timeout(std::time::Duration::from_secs(3), task).await;
    }

    Ok(())
}
