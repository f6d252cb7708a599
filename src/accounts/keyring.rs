//! Local keyring account store.
//!
//! # Responsibilities
//! - Hold development, persisted and externally discovered accounts
//! - Persist user-added accounts to a JSON file
//! - Publish the full ordered collection on every change
//!
//! # Data Flow
//! ```text
//! load_all(options, external)
//!     → development accounts (optional)
//!     → stored accounts (JSON file)
//!     → external accounts (wallet extensions)
//!     → watch channel (development, stored, external)
//! ```
//!
//! # Design Decisions
//! - One store per provider, injected; no process-wide singleton
//! - `load_all` succeeds once; later calls fail with `AlreadyLoaded`
//! - Accounts bound to another genesis hash are hidden, not deleted

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, watch};

use crate::accounts::discovery::AccountDiscovery;
use crate::accounts::types::{
    AccountSink, DiscoveryError, InjectedAccount, KeyType, KeyringError, SubscribeOptions, Unsubscribe,
};
use crate::config::AccountsConfig;

/// `meta.source` of accounts owned by the keyring.
pub const KEYRING_SOURCE: &str = "keyring";

/// Well-known development accounts (sr25519, `//Name` derivation).
pub const DEV_ACCOUNTS: [(&str, &str); 6] = [
    ("alice", "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY"),
    ("bob", "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty"),
    ("charlie", "5FLSigC9HGRKVhB9FiEo4Y3koPsNmBmLJbpXg2mp1hXcS59Y"),
    ("dave", "5DAAnrj7VHTznn2AWBemMuyBwZWs6FNFjdyVXUeYum3PTXFy"),
    ("eve", "5HGjWAeFDfFCWPsjFQdVV2Msvz2XtMktvgocEZcCj68kUMaw"),
    ("ferdie", "5CiPPseXPECbkjWCa6MnjNokrgYjMqmKndv2rSnekmSK2DjL"),
];

const STORE_VERSION: u32 = 1;

/// The development accounts, flagged as testing accounts.
pub fn development_accounts() -> Vec<InjectedAccount> {
    DEV_ACCOUNTS
        .iter()
        .map(|(name, address)| {
            let mut account = InjectedAccount::new(*address, KEYRING_SOURCE)
                .with_name(*name)
                .with_key_type(KeyType::Sr25519);
            account.meta.is_testing = true;
            account
        })
        .collect()
}

/// How the keyring is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyringOptions {
    pub load_development_accounts: bool,
    /// Hide accounts bound to a different chain.
    pub genesis_hash: Option<String>,
    /// JSON file holding user-added accounts.
    pub store_path: Option<PathBuf>,
}

impl KeyringOptions {
    pub fn from_config(config: &AccountsConfig) -> Self {
        Self {
            load_development_accounts: config.load_development_accounts,
            genesis_hash: config.genesis_hash.clone(),
            store_path: config.keyring_path.as_ref().map(PathBuf::from),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    accounts: Vec<InjectedAccount>,
}

fn read_store(path: &Path) -> Result<Vec<InjectedAccount>, KeyringError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| KeyringError::Persistence(format!("{}: {}", path.display(), e)))?;
    let file: StoreFile = serde_json::from_str(&content)
        .map_err(|e| KeyringError::Persistence(format!("{}: {}", path.display(), e)))?;
    Ok(file.accounts)
}

fn write_store(path: &Path, accounts: &[InjectedAccount]) -> Result<(), KeyringError> {
    let file = StoreFile {
        version: STORE_VERSION,
        accounts: accounts.to_vec(),
    };
    let content =
        serde_json::to_string_pretty(&file).map_err(|e| KeyringError::Persistence(e.to_string()))?;
    std::fs::write(path, content).map_err(|e| KeyringError::Persistence(format!("{}: {}", path.display(), e)))
}

#[derive(Clone)]
struct Loaded {
    options: KeyringOptions,
    development: Vec<InjectedAccount>,
    stored: Vec<InjectedAccount>,
    external: Vec<InjectedAccount>,
}

impl Loaded {
    fn contains(&self, address: &str) -> bool {
        self.development
            .iter()
            .chain(&self.stored)
            .chain(&self.external)
            .any(|a| a.address == address)
    }

    fn visible(&self, account: &InjectedAccount) -> bool {
        match (&self.options.genesis_hash, &account.meta.genesis_hash) {
            (Some(wanted), Some(bound)) => wanted == bound,
            _ => true,
        }
    }

    /// Development, then stored, then external; first address wins.
    fn collection(&self) -> Vec<InjectedAccount> {
        let mut out: Vec<InjectedAccount> = Vec::new();
        for account in self.development.iter().chain(&self.stored).chain(&self.external) {
            if self.visible(account) && !out.iter().any(|a| a.address == account.address) {
                out.push(account.clone());
            }
        }
        out
    }
}

/// Account store backing the keyring discovery strategy.
pub struct Keyring {
    state: Mutex<Option<Loaded>>,
    accounts: watch::Sender<Option<Arc<Vec<InjectedAccount>>>>,
}

impl Keyring {
    pub fn new() -> Self {
        let (accounts, _) = watch::channel(None);
        Self {
            state: Mutex::new(None),
            accounts,
        }
    }

    /// Load the store. Only the first call succeeds.
    pub fn load_all(&self, options: KeyringOptions, external: Vec<InjectedAccount>) -> Result<(), KeyringError> {
        let mut state = self.state.lock().expect("keyring mutex poisoned");
        if state.is_some() {
            return Err(KeyringError::AlreadyLoaded);
        }

        let development = if options.load_development_accounts {
            development_accounts()
        } else {
            Vec::new()
        };
        let stored = match &options.store_path {
            Some(path) => read_store(path)?,
            None => Vec::new(),
        };

        tracing::info!(
            development = development.len(),
            stored = stored.len(),
            external = external.len(),
            "Keyring loaded"
        );

        let loaded = Loaded {
            options,
            development,
            stored,
            external,
        };
        self.accounts.send_replace(Some(Arc::new(loaded.collection())));
        *state = Some(loaded);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.state.lock().expect("keyring mutex poisoned").is_some()
    }

    /// Current ordered collection.
    pub fn accounts(&self) -> Result<Vec<InjectedAccount>, KeyringError> {
        let state = self.state.lock().expect("keyring mutex poisoned");
        state.as_ref().map(Loaded::collection).ok_or(KeyringError::NotLoaded)
    }

    /// Add a user account and persist it.
    pub fn add_account(&self, mut account: InjectedAccount) -> Result<(), KeyringError> {
        account
            .validate()
            .map_err(|e| KeyringError::InvalidAccount(e.to_string()))?;
        account.meta.source = KEYRING_SOURCE.to_string();

        self.update(|loaded| {
            if loaded.contains(&account.address) {
                return Err(KeyringError::DuplicateAccount(account.address.clone()));
            }
            loaded.stored.push(account);
            Ok(true)
        })
    }

    /// Remove a development or stored account. Returns whether it existed.
    pub fn forget_account(&self, address: &str) -> Result<bool, KeyringError> {
        let mut removed = false;
        self.update(|loaded| {
            let before = loaded.development.len() + loaded.stored.len();
            loaded.development.retain(|a| a.address != address);
            loaded.stored.retain(|a| a.address != address);
            removed = loaded.development.len() + loaded.stored.len() != before;
            Ok(removed)
        })?;
        Ok(removed)
    }

    /// Replace the externally discovered accounts.
    pub fn set_external(&self, accounts: Vec<InjectedAccount>) -> Result<(), KeyringError> {
        self.update(|loaded| {
            loaded.external = accounts;
            Ok(false)
        })
    }

    /// Write stored accounts to the store file. Returns `false` without a path.
    pub fn save(&self) -> Result<bool, KeyringError> {
        let state = self.state.lock().expect("keyring mutex poisoned");
        let loaded = state.as_ref().ok_or(KeyringError::NotLoaded)?;
        match &loaded.options.store_path {
            Some(path) => {
                write_store(path, &loaded.stored)?;
                tracing::debug!(path = %path.display(), accounts = loaded.stored.len(), "Keyring saved");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Receive the collection now and after every change.
    ///
    /// Holds `None` until the keyring is loaded.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Vec<InjectedAccount>>>> {
        self.accounts.subscribe()
    }

    /// Apply `change`, persist when asked to, then publish the new collection.
    ///
    /// The change is staged on a copy and only committed once persisted.
    fn update<F>(&self, change: F) -> Result<(), KeyringError>
    where
        F: FnOnce(&mut Loaded) -> Result<bool, KeyringError>,
    {
        let mut state = self.state.lock().expect("keyring mutex poisoned");
        let loaded = state.as_mut().ok_or(KeyringError::NotLoaded)?;
        let mut next = loaded.clone();
        let persist = change(&mut next)?;

        if persist {
            if let Some(path) = &next.options.store_path {
                write_store(path, &next.stored)?;
            }
        }
        *loaded = next;
        self.accounts.send_replace(Some(Arc::new(loaded.collection())));
        Ok(())
    }
}

impl Default for Keyring {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Keyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyring").field("loaded", &self.is_loaded()).finish()
    }
}

/// Discovery serving accounts from a [`Keyring`].
///
/// With an upstream discovery (wallet extensions), upstream deliveries
/// become the keyring's external accounts.
pub struct KeyringDiscovery {
    keyring: Arc<Keyring>,
    options: KeyringOptions,
    upstream: Option<Arc<dyn AccountDiscovery>>,
    upstream_authorized: AtomicBool,
}

impl KeyringDiscovery {
    pub fn new(keyring: Arc<Keyring>, options: KeyringOptions, upstream: Option<Arc<dyn AccountDiscovery>>) -> Self {
        Self {
            keyring,
            options,
            upstream,
            upstream_authorized: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl AccountDiscovery for KeyringDiscovery {
    async fn authorize(&self, app_name: &str) -> Result<(), DiscoveryError> {
        if let Some(upstream) = &self.upstream {
            match upstream.authorize(app_name).await {
                Ok(()) => self.upstream_authorized.store(true, Ordering::SeqCst),
                Err(e) => tracing::warn!(error = %e, "Continuing without extension accounts"),
            }
        }

        match self.keyring.load_all(self.options.clone(), Vec::new()) {
            Ok(()) => Ok(()),
            Err(KeyringError::AlreadyLoaded) => {
                tracing::debug!("Keyring was loaded before discovery started");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn subscribe(
        &self,
        app_name: &str,
        options: &SubscribeOptions,
        sink: AccountSink,
    ) -> Result<Unsubscribe, DiscoveryError> {
        if !self.keyring.is_loaded() {
            return Err(DiscoveryError::NotAuthorized);
        }

        let upstream_release = match &self.upstream {
            Some(upstream) if self.upstream_authorized.load(Ordering::SeqCst) => {
                let keyring = self.keyring.clone();
                let external = AccountSink::new(move |accounts| {
                    if let Err(e) = keyring.set_external(accounts) {
                        tracing::warn!(error = %e, "Failed to merge extension accounts");
                    }
                });
                upstream.subscribe(app_name, options, external).await?
            }
            _ => Unsubscribe::noop(),
        };

        let mut changes = self.keyring.subscribe();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            loop {
                let current = changes.borrow_and_update().clone();
                if let Some(accounts) = current {
                    sink.deliver(accounts.as_ref().clone());
                }
                tokio::select! {
                    _ = &mut stop_rx => break,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Keyring subscription stopped");
        });

        let keyring_release = Unsubscribe::new(move || {
            let _ = stop_tx.send(());
        });
        Ok(Unsubscribe::all(vec![upstream_release, keyring_release]))
    }
}
