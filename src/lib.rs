//! outagewatch -- root-cause outage classification for uptime probe heartbeats.
//!
//! This crate ingests heartbeats from a local router probe and external
//! reachability probes, classifies multi-probe failure patterns (power, ISP,
//! router, partial), and gates the resulting alerts and recovery notices.

pub mod api;
pub mod config;
pub mod detect;
pub mod notify;
pub mod probes;
pub mod report;
pub mod storage;

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::{AnalysisConfig, AppConfig, NotifyConfig};
use crate::detect::engine::AnalysisEngine;
use crate::detect::NotificationGate;
use crate::notify::{DeliverySink, LogSink, TelegramSink};
use crate::probes::{PatternRoleClassifier, ProbeRegistry};
use crate::storage::{EventStore, OutageLog};

/// Known probes: configured ones first (explicit roles win), then every
/// probe that has already reported.
pub fn build_registry(config: &AnalysisConfig, store: &EventStore) -> Result<ProbeRegistry> {
    let classifier = PatternRoleClassifier::new(&config.router_pattern)?;
    let registry = ProbeRegistry::new(Arc::new(classifier));
    for p in &config.probes {
        match p.role {
            Some(role) => registry.register_with_role(&p.name, role),
            None => registry.register(&p.name),
        };
    }
    for id in store.distinct_probes()? {
        registry.register(&id);
    }
    Ok(registry)
}

/// Telegram when credentials are present, otherwise the log.
pub fn build_sink(config: &NotifyConfig) -> Result<Arc<dyn DeliverySink>> {
    if config.telegram_configured() {
        let sink = TelegramSink::new(&config.telegram_bot_token, &config.telegram_chat_id)
            .context("failed to set up Telegram delivery")?
            .with_api_base(&config.telegram_api_base);
        tracing::info!("Delivering notifications to Telegram");
        Ok(Arc::new(sink))
    } else {
        tracing::warn!("No Telegram credentials configured, notifications go to the log only");
        Ok(Arc::new(LogSink))
    }
}

/// Start the outagewatch daemon: webhook/API server, analysis engine, and tick.
pub async fn serve(config: AppConfig) -> Result<()> {
    // 1. Initialize Storage
    let db_path = &config.storage.db_path;
    tracing::info!(%db_path, "Initializing database");
    let pool = storage::open_pool(db_path)?;
    let store = EventStore::new(pool.clone());
    let outages = OutageLog::new(pool);

    // 2. Probe registry and delivery
    let registry = build_registry(&config.analysis, &store)?;
    tracing::info!(probes = registry.len(), "Probe registry loaded");
    let sink = build_sink(&config.notify)?;

    // 3. Start Analysis Engine (single writer) and its periodic tick
    let engine = AnalysisEngine::new(
        store.clone(),
        registry.clone(),
        NotificationGate::new(config.notify.cooldown()),
        sink,
        config.analysis.window(),
    );
    let (handle, _engine_task) = engine.spawn();
    let _ticker = handle.spawn_ticker(config.analysis.tick());

    // 4. Start API Server
    let addr: std::net::SocketAddr = config.server.bind.parse()?;
    let app = api::router(api::state::AppState {
        store,
        outages,
        registry,
        engine: handle,
        window: config.analysis.window(),
    });

    tracing::info!(%addr, "outagewatch listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
        })
        .await?;

    Ok(())
}
