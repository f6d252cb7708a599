//! Account records and discovery error definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Characters allowed in an SS58 (base58) address.
const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Length bounds of an SS58 address with a one- or two-byte prefix.
const SS58_LEN: std::ops::RangeInclusive<usize> = 40..=52;

/// Signature scheme of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Ed25519,
    Sr25519,
    Ecdsa,
    Ethereum,
}

/// Display metadata attached to an account.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountMeta {
    /// User-facing name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Which extension or store supplied the account.
    pub source: String,
    /// Chain the account is bound to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genesis_hash: Option<String>,
    /// Well-known development account.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_testing: bool,
}

/// A signer account as delivered by an account source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectedAccount {
    pub address: String,
    pub meta: AccountMeta,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<KeyType>,
}

impl InjectedAccount {
    pub fn new(address: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            meta: AccountMeta {
                source: source.into(),
                ..AccountMeta::default()
            },
            key_type: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.meta.name = Some(name.into());
        self
    }

    pub fn with_key_type(mut self, key_type: KeyType) -> Self {
        self.key_type = Some(key_type);
        self
    }

    pub fn with_genesis_hash(mut self, genesis_hash: impl Into<String>) -> Self {
        self.meta.genesis_hash = Some(genesis_hash.into());
        self
    }

    /// Check the record is usable as a signer account.
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        let invalid = |reason: &str| DiscoveryError::InvalidAccount {
            address: self.address.clone(),
            reason: reason.to_string(),
        };

        if self.address.is_empty() {
            return Err(invalid("empty address"));
        }

        if let Some(hex) = self.address.strip_prefix("0x") {
            if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(invalid("expected 20 hex-encoded bytes"));
            }
            return Ok(());
        }

        if !self.address.chars().all(|c| BASE58_ALPHABET.contains(c)) {
            return Err(invalid("not a base58 string"));
        }
        if !SS58_LEN.contains(&self.address.len()) {
            return Err(invalid("unexpected SS58 length"));
        }
        Ok(())
    }
}

/// Errors from the keyring store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyringError {
    #[error("Keyring already loaded")]
    AlreadyLoaded,

    #[error("Keyring not loaded")]
    NotLoaded,

    #[error("Keyring source selected but no keyring store was provided")]
    NotProvided,

    #[error("Account {0} already exists")]
    DuplicateAccount(String),

    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    #[error("Keyring persistence error: {0}")]
    Persistence(String),
}

/// Errors from account discovery.
///
/// Stored verbatim in the account state; never interpreted by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    /// The host cannot run this discovery strategy at all.
    #[error("Environment unsupported: {0}")]
    EnvironmentUnsupported(String),

    /// No wallet extension authorized the application.
    #[error("No wallet extension authorized '{0}'")]
    NoExtension(String),

    /// Subscribe was called before a successful authorize.
    #[error("Account discovery not authorized")]
    NotAuthorized,

    /// An account record failed boundary validation.
    #[error("Invalid account '{address}': {reason}")]
    InvalidAccount { address: String, reason: String },

    #[error(transparent)]
    Keyring(#[from] KeyringError),

    /// Opaque rejection payload from the discovery service.
    #[error("{0}")]
    Rejected(String),
}

/// Options passed through to the discovery service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubscribeOptions {
    /// Requested SS58 prefix for delivered addresses.
    pub ss58_format: Option<u16>,
}

/// What the account tracker asks the discovery service for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryRequest {
    /// Application identity presented during authorization.
    pub app_name: String,
    pub options: SubscribeOptions,
}

/// Receives full account collections from a subscription.
#[derive(Clone)]
pub struct AccountSink(Arc<dyn Fn(Vec<InjectedAccount>) + Send + Sync>);

impl AccountSink {
    pub fn new(f: impl Fn(Vec<InjectedAccount>) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Deliver the complete current collection.
    pub fn deliver(&self, accounts: Vec<InjectedAccount>) {
        (self.0)(accounts)
    }
}

impl fmt::Debug for AccountSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccountSink")
    }
}

/// One-shot release of a live subscription.
pub struct Unsubscribe(Box<dyn FnOnce() + Send>);

impl Unsubscribe {
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self(Box::new(f))
    }

    /// A release that does nothing.
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    /// Release several subscriptions, in order.
    pub fn all(parts: Vec<Unsubscribe>) -> Self {
        Self::new(move || {
            for part in parts {
                part.call();
            }
        })
    }

    /// Release the subscription.
    pub fn call(self) {
        (self.0)()
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Unsubscribe")
    }
}
