//! Gift Escrow Service — Entry Point
//!
//! Initializes configuration, logging, persistence, and the escrow
//! services. Runs until SIGINT/SIGTERM.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Open the repository (JSONL journal + snapshot store)
//! 4. Restore the in-memory store from the latest snapshot
//! 5. Wire BalanceEngine, DealService, AdminService, SessionManager
//! 6. Spawn health server (/live + /ready)
//! 7. Spawn periodic snapshot + flow-expiry tasks
//! 8. Wait for SIGINT → graceful shutdown (snapshot→exit)

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

mod adapters;
mod config;
mod domain;
mod ports;
mod usecases;

use adapters::notify::TracingNotifier;
use adapters::persistence::{MemoryStore, RepositoryImpl};
use ports::repository::Repository;
use usecases::{AdminService, BalanceEngine, DealService, SessionManager};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration from config.toml ──────────────
    let config = config::loader::load_config("config.toml")
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new(&config.service.log_level)
                }),
        )
        .json()
        .init();

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        admins = config.admin.user_ids.len(),
        "Starting gift escrow service"
    );

    // ── 3. Shutdown signal channels ─────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let (health_tx, health_rx) = watch::channel(true);

    // ── 4. Open repository and restore state ────────────────
    let repo = Arc::new(
        RepositoryImpl::from_data_dir(&config.persistence.data_dir)
            .await
            .context("Failed to open repository")?,
    );

    let store = match repo.load_latest_snapshot().await {
        Ok(Some(snapshot)) => Arc::new(MemoryStore::from_snapshot(snapshot)),
        Ok(None) => Arc::new(MemoryStore::new()),
        Err(e) => {
            warn!(error = %e, "Snapshot unreadable, starting fresh");
            Arc::new(MemoryStore::new())
        }
    };

    // ── 5. Wire services ────────────────────────────────────
    let notifier = Arc::new(TracingNotifier);
    let balance = Arc::new(BalanceEngine::new(
        Arc::clone(&store),
        Arc::clone(&repo),
        Arc::clone(&notifier),
        config.admin.notify_recipient(),
    ));
    let deals = Arc::new(DealService::new(
        Arc::clone(&store),
        Arc::clone(&store),
        Arc::clone(&balance),
        Arc::clone(&notifier),
        &config,
    ));
    let _admin = Arc::new(AdminService::new(
        Arc::clone(&balance),
        Arc::clone(&store),
        Arc::clone(&notifier),
        &config,
    ));
    let sessions = Arc::new(SessionManager::new(config.flows.ttl_seconds));

    // Log committed transitions for the operator.
    let mut event_rx = deals.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            info!(
                deal_id = event.deal.id,
                kind = ?event.kind,
                status = %event.deal.status,
                "Deal state changed"
            );
        }
    });

    // ── 6. Spawn health server ──────────────────────────────
    let health_handle = tokio::spawn(serve_health(
        health_rx,
        config.health.bind_address.clone(),
    ));

    // ── 7. Periodic snapshot task ───────────────────────────
    let snapshot_store = Arc::clone(&store);
    let snapshot_repo = Arc::clone(&repo);
    let snapshot_interval = config.persistence.snapshot_interval_seconds;
    let mut snapshot_shutdown = shutdown_tx.subscribe();
    let snapshot_handle = tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(snapshot_interval));
        ticker.tick().await; // First tick fires immediately; skip it.
        loop {
            tokio::select! {
                _ = snapshot_shutdown.recv() => break,
                _ = ticker.tick() => {
                    let snapshot = snapshot_store.export_snapshot().await;
                    if let Err(e) = snapshot_repo.save_snapshot(&snapshot).await {
                        error!(error = %e, "Periodic snapshot failed");
                    }
                }
            }
        }
    });

    // ── 8. Flow-expiry sweeper ──────────────────────────────
    let sweep_sessions = Arc::clone(&sessions);
    let mut sweep_shutdown = shutdown_tx.subscribe();
    let sweep_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = sweep_shutdown.recv() => break,
                _ = ticker.tick() => {
                    sweep_sessions.purge_expired().await;
                }
            }
        }
    });

    info!("All tasks spawned — escrow service is running");

    // ── 9. Wait for SIGINT ──────────────────────────────────
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("SIGINT received, initiating graceful shutdown");
        }
    }

    // ── Graceful shutdown (snapshot→exit) ───────────────────

    // 1. Signal all tasks to stop
    let _ = shutdown_tx.send(());
    info!("Shutdown signal broadcast to all tasks");

    // 2. Mark health as unhealthy (readiness probe → 503)
    let _ = health_tx.send(false);

    // 3. Final snapshot so no committed state is lost
    let snapshot = store.export_snapshot().await;
    match repo.save_snapshot(&snapshot).await {
        Ok(()) => info!("Final snapshot saved"),
        Err(e) => error!(error = %e, "Final snapshot failed"),
    }

    // 4. Wait for background tasks (up to 5s each)
    let _ = tokio::time::timeout(Duration::from_secs(5), snapshot_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), sweep_handle).await;

    // 5. Stop health server
    health_handle.abort();

    info!("Shutdown complete");
    Ok(())
}

/// Serve health endpoints.
///
/// - `/live`  — Liveness probe: 200 if process is running
/// - `/ready` — Readiness probe: 503 during graceful shutdown
async fn serve_health(health_rx: watch::Receiver<bool>, bind_address: String) -> Result<()> {
    use axum::{extract::State, http::StatusCode, routing::get, Router};

    let app = Router::new()
        .route("/live", get(|| async { StatusCode::OK }))
        .route(
            "/ready",
            get(
                move |State(rx): State<watch::Receiver<bool>>| async move {
                    if *rx.borrow() {
                        StatusCode::OK
                    } else {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                },
            ),
        )
        .with_state(health_rx);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!(%bind_address, "Health server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
