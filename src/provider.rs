//! Provider hosting the merged connection/account snapshot.
//!
//! # Responsibilities
//! - Own the store, both trackers and the shutdown coordinator
//! - Start both trackers on mount
//! - Stop every background task and release the account subscription on unmount
//!
//! # Data Flow
//! ```text
//! mount() ─┬→ ConnectionTracker::start(api_options)
//!          └→ AccountSourceTracker::start(app_name, ss58_format)
//! trackers → Store → snapshot() / subscribe() / wait_for()
//! unmount() → store teardown → subscription release → shutdown
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::accounts::{AccountDiscovery, AccountSourceTracker, DiscoveryRequest, SubscribeOptions};
use crate::chain::{ApiOptions, ChainConnector, ConnectionTracker};
use crate::config::ContextConfig;
use crate::definitions::TypeParseError;
use crate::lifecycle::Shutdown;
use crate::state::{Snapshot, Store};

/// Application identity presented to wallet extensions by default.
pub const DEFAULT_APP_NAME: &str = "Litentry dApp";

/// Inputs of a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderProps {
    pub api_options: ApiOptions,
    pub app_name: String,
    /// Passed through to account discovery.
    pub ss58_format: Option<u16>,
}

impl ProviderProps {
    pub fn new(api_options: ApiOptions) -> Self {
        Self {
            api_options,
            app_name: DEFAULT_APP_NAME.to_string(),
            ss58_format: None,
        }
    }

    pub fn from_config(config: &ContextConfig) -> Result<Self, TypeParseError> {
        Ok(Self {
            api_options: ApiOptions::from_config(&config.api)?,
            app_name: config.accounts.app_name.clone(),
            ss58_format: config.accounts.ss58_format,
        })
    }

    pub fn discovery_request(&self) -> DiscoveryRequest {
        DiscoveryRequest {
            app_name: self.app_name.clone(),
            options: SubscribeOptions {
                ss58_format: self.ss58_format,
            },
        }
    }
}

/// Host of the connection and account state machines.
///
/// Must be created inside a Tokio runtime.
pub struct SubstrateProvider {
    session_id: Uuid,
    props: ProviderProps,
    store: Store,
    connection: ConnectionTracker,
    accounts: AccountSourceTracker,
    shutdown: Shutdown,
    span: tracing::Span,
    unmounted: AtomicBool,
}

impl SubstrateProvider {
    pub fn new(
        props: ProviderProps,
        connector: Arc<dyn ChainConnector>,
        discovery: Arc<dyn AccountDiscovery>,
    ) -> Self {
        let session_id = Uuid::new_v4();
        let span = tracing::info_span!("provider", session = %session_id);
        let shutdown = Shutdown::new();
        let store = Store::spawn(&shutdown);
        let connection = ConnectionTracker::new(connector, store.dispatcher(), shutdown.clone());
        let accounts = AccountSourceTracker::new(discovery, store.dispatcher());

        Self {
            session_id,
            props,
            store,
            connection,
            accounts,
            shutdown,
            span,
            unmounted: AtomicBool::new(false),
        }
    }

    /// Start both trackers. Returns `true` if anything was started.
    pub fn mount(&self) -> bool {
        let _enter = self.span.enter();
        if self.unmounted.load(Ordering::SeqCst) {
            tracing::warn!("Mount after unmount ignored");
            return false;
        }

        let connection = self.connection.start(&self.props.api_options);
        let accounts = self.accounts.start(&self.props.discovery_request());
        if connection || accounts {
            tracing::info!(
                endpoint = %self.props.api_options.endpoint,
                app_name = %self.props.app_name,
                "Provider mounted"
            );
        }
        connection || accounts
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.snapshot()
    }

    /// Every snapshot produced from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Snapshot>> {
        self.store.subscribe()
    }

    /// First snapshot matching `pred`, or `None` once the provider stops.
    pub async fn wait_for<F>(&self, pred: F) -> Option<Arc<Snapshot>>
    where
        F: Fn(&Snapshot) -> bool,
    {
        tokio::select! {
            snapshot = self.store.wait_for(pred) => snapshot,
            _ = self.shutdown.signalled() => None,
        }
    }

    /// Tear down. Idempotent.
    pub fn unmount(&self) {
        if self.unmounted.swap(true, Ordering::SeqCst) {
            return;
        }
        let _enter = self.span.enter();
        self.store.teardown();
        self.accounts.teardown();
        self.shutdown.trigger();
        tracing::info!("Provider unmounted");
    }

    pub fn is_unmounted(&self) -> bool {
        self.unmounted.load(Ordering::SeqCst)
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn props(&self) -> &ProviderProps {
        &self.props
    }
}

impl Drop for SubstrateProvider {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl std::fmt::Debug for SubstrateProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubstrateProvider")
            .field("session_id", &self.session_id)
            .field("props", &self.props)
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContextConfig;

    #[test]
    fn test_props_defaults() {
        let props = ProviderProps::new(ApiOptions::new("ws://127.0.0.1:9944"));
        assert_eq!(props.app_name, "Litentry dApp");
        assert_eq!(props.discovery_request().options.ss58_format, None);
    }

    #[test]
    fn test_props_from_config() {
        let mut config = ContextConfig::default();
        config.accounts.ss58_format = Some(31);
        config.api.network = Some("litentry".into());

        let props = ProviderProps::from_config(&config).unwrap();
        assert_eq!(props.app_name, DEFAULT_APP_NAME);
        assert_eq!(props.api_options.network.as_deref(), Some("litentry"));
        assert!(props.api_options.types.is_some());

        let request = props.discovery_request();
        assert_eq!(request.app_name, "Litentry dApp");
        assert_eq!(request.options.ss58_format, Some(31));
    }
}
