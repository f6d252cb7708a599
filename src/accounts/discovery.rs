//! Account discovery contract and strategy selection.

use async_trait::async_trait;
use std::sync::Arc;

use crate::accounts::extension::{ExtensionDiscovery, InjectedExtension};
use crate::accounts::keyring::{Keyring, KeyringDiscovery, KeyringOptions};
use crate::accounts::types::{AccountSink, DiscoveryError, KeyringError, SubscribeOptions, Unsubscribe};
use crate::config::{AccountSourceKind, AccountsConfig};

/// Enumerates signer accounts and reports changes.
///
/// `authorize` must succeed before `subscribe` is called. The sink always
/// receives the complete current collection.
#[async_trait]
pub trait AccountDiscovery: Send + Sync {
    async fn authorize(&self, app_name: &str) -> Result<(), DiscoveryError>;

    async fn subscribe(
        &self,
        app_name: &str,
        options: &SubscribeOptions,
        sink: AccountSink,
    ) -> Result<Unsubscribe, DiscoveryError>;
}

/// Capabilities of the host the provider runs in.
#[derive(Clone, Default)]
pub struct HostEnvironment {
    extensions: Option<Vec<Arc<dyn InjectedExtension>>>,
}

impl HostEnvironment {
    /// A host without wallet extension support.
    pub fn native() -> Self {
        Self { extensions: None }
    }

    /// A host exposing the given wallet extensions.
    pub fn with_extensions(extensions: Vec<Arc<dyn InjectedExtension>>) -> Self {
        Self {
            extensions: Some(extensions),
        }
    }

    pub fn supports_extensions(&self) -> bool {
        self.extensions.is_some()
    }

    pub fn extensions(&self) -> Option<&[Arc<dyn InjectedExtension>]> {
        self.extensions.as_deref()
    }
}

impl std::fmt::Debug for HostEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Option<Vec<&str>> = self
            .extensions
            .as_ref()
            .map(|exts| exts.iter().map(|e| e.name()).collect());
        f.debug_struct("HostEnvironment").field("extensions", &names).finish()
    }
}

/// Pick the discovery strategy for `config` on `host`.
///
/// The extension strategy fails fast on hosts without extension support.
/// The keyring strategy needs a keyring store and merges extension
/// accounts when the host has them and `merge_extension_accounts` is set.
pub fn select_discovery(
    config: &AccountsConfig,
    host: &HostEnvironment,
    keyring: Option<Arc<Keyring>>,
) -> Result<Arc<dyn AccountDiscovery>, DiscoveryError> {
    match config.source {
        AccountSourceKind::Extension => {
            let extensions = host.extensions().ok_or_else(|| {
                DiscoveryError::EnvironmentUnsupported("host has no wallet extension support".into())
            })?;
            tracing::debug!(extensions = extensions.len(), "Using wallet extension discovery");
            Ok(Arc::new(ExtensionDiscovery::new(extensions.to_vec())))
        }
        AccountSourceKind::Keyring => {
            let keyring = keyring.ok_or(DiscoveryError::Keyring(KeyringError::NotProvided))?;
            let upstream = match host.extensions() {
                Some(extensions) if config.merge_extension_accounts => {
                    Some(Arc::new(ExtensionDiscovery::new(extensions.to_vec())) as Arc<dyn AccountDiscovery>)
                }
                _ => None,
            };
            tracing::debug!(
                development = config.load_development_accounts,
                merge_extensions = upstream.is_some(),
                "Using keyring discovery"
            );
            Ok(Arc::new(KeyringDiscovery::new(
                keyring,
                KeyringOptions::from_config(config),
                upstream,
            )))
        }
    }
}
