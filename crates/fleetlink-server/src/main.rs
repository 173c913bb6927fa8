//! # fleetlink-server
//!
//! Wires the C1–C8 library crates into a running process: loads configuration, initializes
//! structured logging, runs startup recovery, spawns the manager/session-engine/subscriber
//! hub, optionally auto-connects the configured SITL endpoint, serves the subscriber channel
//! and request surface, and shuts down gracefully on `ctrl_c`.

mod app;
mod auth;
mod config;
mod http;
mod storage;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use fleetlink_core::{DroneManager, Storage, Uin};
use fleetlink_hub::{commands, SubscriberHub};
use fleetlink_session::SessionEngine;

use app::{router, AppState};
use auth::JwtAuthProvider;
use config::Config;
use storage::memory::InMemoryStorage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env().context("loading configuration")?;

    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    storage
        .mark_all_offline()
        .await
        .context("startup recovery: marking all drones offline")?;

    let manager = Arc::new(DroneManager::new());
    let cancel = CancellationToken::new();

    let (session_handle, session_join) = SessionEngine::spawn(
        storage.clone(),
        manager.subscribe_telemetry(),
        manager.subscribe_status(),
        cancel.clone(),
    );

    let hub = SubscriberHub::spawn(manager.clone(), cancel.clone());
    let auth = Arc::new(JwtAuthProvider::new(&config.jwt_secret));

    if let Some(sitl) = &config.sitl_connection {
        auto_connect_sitl(&manager, sitl);
    }

    let state = Arc::new(AppState {
        manager: manager.clone(),
        hub,
        auth,
        session: session_handle,
    });

    let app = router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "fleetlink-server listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding request surface on {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await
        .context("serving request surface")?;

    cancel.cancel();
    if let Err(err) = session_join.await {
        tracing::warn!(%err, "session engine task panicked during shutdown");
    }

    Ok(())
}

/// Registers and connects the configured default vehicle endpoint under a synthetic system
/// owner, so a SITL instance on the configured port is live without an operator registering
/// it by hand (§6: `SITL_CONNECTION`).
fn auto_connect_sitl(manager: &Arc<DroneManager>, connection_string: &str) {
    let endpoint = match commands::parse_connection_string(connection_string) {
        Ok(endpoint) => endpoint,
        Err(err) => {
            tracing::warn!(%err, connection_string, "SITL_CONNECTION is malformed, skipping auto-connect");
            return;
        }
    };

    let system_owner = fleetlink_core::UserId(uuid::Uuid::nil());
    let registration = manager.register(
        system_owner,
        "sitl".to_string(),
        Uin("sitl-default".to_string()),
        endpoint,
        None,
    );

    let drone_id = match registration {
        Ok(drone_id) => drone_id,
        Err(err) => {
            tracing::warn!(%err, "failed to register the default SITL vehicle");
            return;
        }
    };

    let manager = manager.clone();
    tokio::spawn(async move {
        if let Err(err) = manager.connect(drone_id).await {
            tracing::warn!(%err, %drone_id, "failed to auto-connect the default SITL vehicle");
        }
    });
}

/// Completes once `ctrl_c` fires, then cancels every background task (link receive loops,
/// the session engine, the subscriber hub's dispatchers) so the process drains cleanly.
async fn shutdown_signal(cancel: CancellationToken) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received, draining tasks");
    cancel.cancel();
}
