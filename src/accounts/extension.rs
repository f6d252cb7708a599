//! Wallet extension discovery.
//!
//! # Responsibilities
//! - Enable every injected extension under the application name
//! - Merge per-extension account lists into one collection
//! - Re-deliver the merged collection whenever one extension changes
//!
//! # Design Decisions
//! - Extension order is preserved in the merged collection
//! - `meta.source` is always the name of the extension that supplied the account
//! - An extension that fails a one-shot fetch contributes nothing

use arc_swap::ArcSwap;
use async_trait::async_trait;
use futures_util::future::join_all;
use std::sync::{Arc, Mutex};

use crate::accounts::discovery::AccountDiscovery;
use crate::accounts::types::{AccountSink, DiscoveryError, InjectedAccount, SubscribeOptions, Unsubscribe};

/// A wallet extension as exposed by the host.
#[async_trait]
pub trait InjectedExtension: Send + Sync {
    fn name(&self) -> &str;

    /// Ask the user to authorize `app_name`.
    async fn enable(&self, app_name: &str) -> Result<Arc<dyn InjectedAccounts>, DiscoveryError>;
}

/// Account access granted by an enabled extension.
#[async_trait]
pub trait InjectedAccounts: Send + Sync {
    async fn get(&self, options: &SubscribeOptions) -> Result<Vec<InjectedAccount>, DiscoveryError>;

    /// Deliver the extension's full list now and on every change.
    fn subscribe(&self, options: &SubscribeOptions, sink: AccountSink) -> Unsubscribe;
}

#[derive(Clone)]
struct EnabledExtension {
    name: String,
    accounts: Arc<dyn InjectedAccounts>,
}

/// Discovery over all wallet extensions of the host.
pub struct ExtensionDiscovery {
    extensions: Vec<Arc<dyn InjectedExtension>>,
    enabled: ArcSwap<Vec<EnabledExtension>>,
}

impl ExtensionDiscovery {
    pub fn new(extensions: Vec<Arc<dyn InjectedExtension>>) -> Self {
        Self {
            extensions,
            enabled: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Names of the extensions that authorized the application.
    pub fn enabled_names(&self) -> Vec<String> {
        self.enabled.load().iter().map(|e| e.name.clone()).collect()
    }

    /// One-shot fetch of the merged collection.
    pub async fn accounts(&self, options: &SubscribeOptions) -> Result<Vec<InjectedAccount>, DiscoveryError> {
        let enabled = self.enabled.load_full();
        if enabled.is_empty() {
            return Err(DiscoveryError::NotAuthorized);
        }

        let lists = join_all(enabled.iter().map(|ext| async move {
            match ext.accounts.get(options).await {
                Ok(accounts) => tag_source(accounts, &ext.name),
                Err(e) => {
                    tracing::warn!(extension = %ext.name, error = %e, "Failed to fetch extension accounts");
                    Vec::new()
                }
            }
        }))
        .await;

        Ok(lists.into_iter().flatten().collect())
    }
}

fn tag_source(accounts: Vec<InjectedAccount>, source: &str) -> Vec<InjectedAccount> {
    accounts
        .into_iter()
        .map(|mut account| {
            account.meta.source = source.to_string();
            account
        })
        .collect()
}

#[async_trait]
impl AccountDiscovery for ExtensionDiscovery {
    async fn authorize(&self, app_name: &str) -> Result<(), DiscoveryError> {
        let results = join_all(self.extensions.iter().map(|ext| async move {
            (ext.name().to_string(), ext.enable(app_name).await)
        }))
        .await;

        let mut enabled = Vec::with_capacity(results.len());
        for (name, result) in results {
            match result {
                Ok(accounts) => enabled.push(EnabledExtension { name, accounts }),
                Err(e) => tracing::warn!(extension = %name, error = %e, "Extension refused authorization"),
            }
        }

        if enabled.is_empty() {
            return Err(DiscoveryError::NoExtension(app_name.to_string()));
        }

        tracing::info!(
            app_name = %app_name,
            enabled = enabled.len(),
            available = self.extensions.len(),
            "Wallet extensions enabled"
        );
        self.enabled.store(Arc::new(enabled));
        Ok(())
    }

    async fn subscribe(
        &self,
        _app_name: &str,
        options: &SubscribeOptions,
        sink: AccountSink,
    ) -> Result<Unsubscribe, DiscoveryError> {
        let enabled = self.enabled.load_full();
        if enabled.is_empty() {
            return Err(DiscoveryError::NotAuthorized);
        }

        let latest: Arc<Mutex<Vec<Option<Vec<InjectedAccount>>>>> = Arc::new(Mutex::new(vec![None; enabled.len()]));
        let mut releases = Vec::with_capacity(enabled.len());

        for (index, ext) in enabled.iter().enumerate() {
            let latest = latest.clone();
            let sink = sink.clone();
            let name = ext.name.clone();
            // Deliver under the lock so merges reach the sink in merge order.
            let per_extension = AccountSink::new(move |accounts| {
                let mut latest = latest.lock().expect("extension accounts mutex poisoned");
                latest[index] = Some(tag_source(accounts, &name));
                let merged: Vec<InjectedAccount> = latest.iter().flatten().flatten().cloned().collect();
                sink.deliver(merged);
            });
            releases.push(ext.accounts.subscribe(options, per_extension));
        }

        Ok(Unsubscribe::all(releases))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
    const BOB: &str = "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty";

    /// In-memory extension whose list can be changed from the test.
    struct MemoryExtension {
        name: &'static str,
        accept: bool,
        accounts: Arc<MemoryAccounts>,
    }

    struct MemoryAccounts {
        list: Mutex<Vec<InjectedAccount>>,
        sinks: Mutex<Vec<AccountSink>>,
    }

    impl MemoryAccounts {
        fn set(&self, list: Vec<InjectedAccount>) {
            *self.list.lock().unwrap() = list.clone();
            for sink in self.sinks.lock().unwrap().iter() {
                sink.deliver(list.clone());
            }
        }
    }

    impl MemoryExtension {
        fn new(name: &'static str, accept: bool, list: Vec<InjectedAccount>) -> Arc<Self> {
            Arc::new(Self {
                name,
                accept,
                accounts: Arc::new(MemoryAccounts {
                    list: Mutex::new(list),
                    sinks: Mutex::new(Vec::new()),
                }),
            })
        }
    }

    #[async_trait]
    impl InjectedExtension for MemoryExtension {
        fn name(&self) -> &str {
            self.name
        }

        async fn enable(&self, _app_name: &str) -> Result<Arc<dyn InjectedAccounts>, DiscoveryError> {
            if self.accept {
                Ok(self.accounts.clone())
            } else {
                Err(DiscoveryError::Rejected("user rejected".into()))
            }
        }
    }

    #[async_trait]
    impl InjectedAccounts for MemoryAccounts {
        async fn get(&self, _options: &SubscribeOptions) -> Result<Vec<InjectedAccount>, DiscoveryError> {
            Ok(self.list.lock().unwrap().clone())
        }

        fn subscribe(&self, _options: &SubscribeOptions, sink: AccountSink) -> Unsubscribe {
            sink.deliver(self.list.lock().unwrap().clone());
            self.sinks.lock().unwrap().push(sink);
            Unsubscribe::noop()
        }
    }

    fn capture() -> (AccountSink, Arc<Mutex<Vec<Vec<InjectedAccount>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let inner = seen.clone();
        let sink = AccountSink::new(move |accounts| inner.lock().unwrap().push(accounts));
        (sink, seen)
    }

    fn addresses(list: &[InjectedAccount]) -> Vec<&str> {
        list.iter().map(|a| a.address.as_str()).collect()
    }

    #[tokio::test]
    async fn test_no_extension() {
        let discovery = ExtensionDiscovery::new(vec![]);
        let err = discovery.authorize("Litentry dApp").await.unwrap_err();
        assert_eq!(err, DiscoveryError::NoExtension("Litentry dApp".into()));

        let rejecting = ExtensionDiscovery::new(vec![MemoryExtension::new("a", false, vec![])]);
        assert!(matches!(
            rejecting.authorize("app").await,
            Err(DiscoveryError::NoExtension(_))
        ));
    }

    #[tokio::test]
    async fn test_subscribe_requires_authorize() {
        let discovery = ExtensionDiscovery::new(vec![MemoryExtension::new("a", true, vec![])]);
        let (sink, _) = capture();
        let err = discovery
            .subscribe("app", &SubscribeOptions::default(), sink)
            .await
            .err()
            .unwrap();
        assert_eq!(err, DiscoveryError::NotAuthorized);
    }

    #[tokio::test]
    async fn test_merged_deliveries_in_extension_order() {
        let first = MemoryExtension::new("polkadot-js", true, vec![InjectedAccount::new(ALICE, "x")]);
        let refused = MemoryExtension::new("talisman", false, vec![]);
        let second = MemoryExtension::new("subwallet-js", true, vec![InjectedAccount::new(BOB, "x")]);
        let discovery = ExtensionDiscovery::new(vec![first.clone(), refused, second.clone()]);

        discovery.authorize("app").await.unwrap();
        assert_eq!(discovery.enabled_names(), vec!["polkadot-js", "subwallet-js"]);

        let (sink, seen) = capture();
        discovery
            .subscribe("app", &SubscribeOptions::default(), sink)
            .await
            .unwrap();

        first.accounts.set(vec![]);
        let seen = seen.lock().unwrap();
        assert_eq!(addresses(&seen[0]), vec![ALICE]);
        assert_eq!(addresses(&seen[1]), vec![ALICE, BOB]);
        assert_eq!(addresses(&seen[2]), vec![BOB]);
        assert_eq!(seen[1][0].meta.source, "polkadot-js");
        assert_eq!(seen[1][1].meta.source, "subwallet-js");
    }

    #[tokio::test]
    async fn test_concurrent_deliveries_end_on_latest_merge() {
        let first = MemoryExtension::new("polkadot-js", true, vec![]);
        let second = MemoryExtension::new("subwallet-js", true, vec![]);
        let discovery = ExtensionDiscovery::new(vec![first.clone(), second.clone()]);
        discovery.authorize("app").await.unwrap();

        // The first extension's delivery stalls inside the sink.
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let entered_tx = Mutex::new(entered_tx);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let inner = seen.clone();
        let sink = AccountSink::new(move |accounts: Vec<InjectedAccount>| {
            if addresses(&accounts) == vec![ALICE] {
                let _ = entered_tx.lock().unwrap().send(());
                std::thread::sleep(std::time::Duration::from_millis(50));
            }
            inner.lock().unwrap().push(accounts);
        });
        discovery
            .subscribe("app", &SubscribeOptions::default(), sink)
            .await
            .unwrap();

        let slow = {
            let first = first.clone();
            std::thread::spawn(move || first.accounts.set(vec![InjectedAccount::new(ALICE, "x")]))
        };
        entered_rx.recv().unwrap();
        let fast = {
            let second = second.clone();
            std::thread::spawn(move || second.accounts.set(vec![InjectedAccount::new(BOB, "x")]))
        };
        slow.join().unwrap();
        fast.join().unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert_eq!(addresses(seen.last().unwrap()), vec![ALICE, BOB]);
    }

    #[tokio::test]
    async fn test_one_shot_accounts() {
        let ext = MemoryExtension::new("polkadot-js", true, vec![InjectedAccount::new(ALICE, "x")]);
        let discovery = ExtensionDiscovery::new(vec![ext]);
        assert_eq!(
            discovery.accounts(&SubscribeOptions::default()).await.unwrap_err(),
            DiscoveryError::NotAuthorized
        );

        discovery.authorize("app").await.unwrap();
        let accounts = discovery.accounts(&SubscribeOptions::default()).await.unwrap();
        assert_eq!(addresses(&accounts), vec![ALICE]);
        assert_eq!(accounts[0].meta.source, "polkadot-js");
    }
}
