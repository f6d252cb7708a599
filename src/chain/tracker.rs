//! Connection lifecycle tracker.
//!
//! # Responsibilities
//! - Issue exactly one connection attempt per provider
//! - Translate client milestones into connection transitions
//! - Stop forwarding once the provider shuts down
//!
//! # Data Flow
//! ```text
//! start() → Init → connector.open()
//!   ├─ Err  → Failed
//!   └─ Ok   → pump: Connected → Connected(api) + is_ready waiter → Ready(api)
//!                   Ready → Ready(api)
//!                   Disconnected → Disconnected
//!                   Error(e) → Failed(e)
//! ```
//!
//! # Design Decisions
//! - Reconnection belongs to the client; the tracker only relays
//! - Both the direct ready milestone and the post-connect waiter are forwarded

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::chain::service::{ApiHandle, ChainConnection, ChainConnector};
use crate::chain::types::{ApiOptions, ChainEvent};
use crate::lifecycle::Shutdown;
use crate::state::{ApiStatus, ConnectionEvent, Dispatcher};

pub struct ConnectionTracker {
    connector: Arc<dyn ChainConnector>,
    dispatcher: Dispatcher,
    started: AtomicBool,
    shutdown: Shutdown,
}

impl ConnectionTracker {
    pub fn new(connector: Arc<dyn ChainConnector>, dispatcher: Dispatcher, shutdown: Shutdown) -> Self {
        Self {
            connector,
            dispatcher,
            started: AtomicBool::new(false),
            shutdown,
        }
    }

    /// Start the single connection attempt.
    ///
    /// Returns `false` when an attempt was already issued.
    pub fn start(&self, options: &ApiOptions) -> bool {
        if self.dispatcher.snapshot().connection.status != ApiStatus::Uninitialized {
            tracing::debug!("Connection already initialised, ignoring start");
            return false;
        }
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::debug!("Connection attempt already issued, ignoring start");
            return false;
        }

        self.dispatcher.dispatch(ConnectionEvent::Init);
        tracing::info!(
            endpoint = %options.endpoint,
            network = options.network.as_deref().unwrap_or("-"),
            "Connecting to chain"
        );

        match self.connector.open(options) {
            Ok(ChainConnection { api, events }) => {
                let span = tracing::info_span!("connection", endpoint = %options.endpoint);
                tokio::spawn(
                    pump_events(api, events, self.dispatcher.clone(), self.shutdown.clone()).instrument(span),
                );
            }
            Err(e) => {
                tracing::warn!(endpoint = %options.endpoint, error = %e, "Failed to open chain connection");
                self.dispatcher.dispatch(ConnectionEvent::Failed(e));
            }
        }
        true
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ConnectionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionTracker")
            .field("started", &self.is_started())
            .finish()
    }
}

async fn pump_events(
    api: ApiHandle,
    mut events: mpsc::UnboundedReceiver<ChainEvent>,
    dispatcher: Dispatcher,
    shutdown: Shutdown,
) {
    let stopped = shutdown.signalled();
    tokio::pin!(stopped);
    let mut waiter: Option<JoinHandle<()>> = None;

    loop {
        let event = tokio::select! {
            biased;
            _ = &mut stopped => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        match event {
            ChainEvent::Connected => {
                tracing::info!("Chain transport connected");
                dispatcher.dispatch(ConnectionEvent::Connected(api.clone()));
                let next = tokio::spawn(
                    wait_ready(api.clone(), dispatcher.clone(), shutdown.clone()).in_current_span(),
                );
                // Only the latest transport waits for readiness.
                if let Some(previous) = waiter.replace(next) {
                    previous.abort();
                }
            }
            ChainEvent::Ready => {
                tracing::info!("Chain API ready");
                dispatcher.dispatch(ConnectionEvent::Ready(api.clone()));
            }
            ChainEvent::Disconnected => {
                tracing::warn!("Chain transport disconnected");
                dispatcher.dispatch(ConnectionEvent::Disconnected);
            }
            ChainEvent::Error(e) => {
                tracing::warn!(error = %e, "Chain client error");
                dispatcher.dispatch(ConnectionEvent::Failed(e));
            }
        }
    }
    if let Some(waiter) = waiter {
        waiter.abort();
    }
    tracing::debug!("Connection event pump stopped");
}

async fn wait_ready(api: ApiHandle, dispatcher: Dispatcher, shutdown: Shutdown) {
    tokio::select! {
        biased;
        _ = shutdown.signalled() => {}
        _ = api.is_ready() => {
            tracing::debug!("API handshake finished after connect");
            dispatcher.dispatch(ConnectionEvent::Ready(api));
        }
    }
}
