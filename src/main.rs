//! Substrate context host.
//!
//! Mounts one provider against the configured node and logs every snapshot
//! until SIGINT/SIGTERM.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │                      SubstrateProvider                        │
//!   │                                                               │
//!   │  ┌────────────────────┐           ┌───────────────────────┐   │
//!   │  │ ConnectionTracker  │           │ AccountSourceTracker  │   │
//!   │  │  WsConnector       │           │  extension / keyring  │   │
//!   │  └─────────┬──────────┘           └───────────┬───────────┘   │
//!   │            │        milestones (mpsc)         │               │
//!   │            └──────────────┬───────────────────┘               │
//!   │                           ▼                                   │
//!   │                  ┌─────────────────┐                          │
//!   │                  │ Store (reducer) │──▶ Snapshot broadcast ───┼──▶ host
//!   │                  └─────────────────┘                          │
//!   └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `substrate-context [config.toml]`

use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

use substrate_context::accounts::{select_discovery, HostEnvironment, Keyring};
use substrate_context::chain::WsConnector;
use substrate_context::config::{load_config, ContextConfig};
use substrate_context::lifecycle::signals::shutdown_signal;
use substrate_context::observability::{logging, metrics};
use substrate_context::{ProviderProps, Snapshot, SubstrateProvider};

fn log_snapshot(snapshot: &Snapshot) {
    let runtime = snapshot.api().and_then(|api| api.runtime());
    tracing::info!(
        connection = snapshot.connection.status.label(),
        accounts = snapshot.accounts.label(),
        account_count = snapshot.accounts.accounts().map_or(0, |a| a.len()),
        chain = runtime.as_ref().map_or("-", |r| r.chain.as_str()),
        "Snapshot"
    );
    if let Some(e) = snapshot.connection.error() {
        tracing::warn!(error = %e, "Connection error");
    }
    if let Some(e) = snapshot.accounts.error() {
        tracing::warn!(error = %e, "Account discovery error");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => load_config(Path::new(&path))?,
        None => ContextConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!("substrate-context v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        endpoint = %config.api.endpoint,
        source = ?config.accounts.source,
        app_name = %config.accounts.app_name,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let keyring = Arc::new(Keyring::new());
    let discovery = match select_discovery(&config.accounts, &HostEnvironment::native(), Some(keyring.clone())) {
        Ok(discovery) => discovery,
        Err(e) => {
            tracing::error!(error = %e, "No usable account source; set accounts.source = \"keyring\"");
            return Err(e.into());
        }
    };

    let props = ProviderProps::from_config(&config)?;
    let provider = SubstrateProvider::new(props, Arc::new(WsConnector), discovery);
    tracing::info!(session = %provider.session_id(), "Provider created");

    let mut changes = provider.subscribe();
    provider.mount();

    let signal = shutdown_signal();
    tokio::pin!(signal);

    loop {
        tokio::select! {
            _ = &mut signal => break,
            change = changes.recv() => match change {
                Ok(snapshot) => log_snapshot(&snapshot),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Snapshot log lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    provider.unmount();

    if keyring.is_loaded() {
        match keyring.save() {
            Ok(true) => tracing::info!("Keyring saved"),
            Ok(false) => {}
            Err(e) => tracing::error!(error = %e, "Failed to save keyring"),
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
