//! Account discovery subsystem.
//!
//! # Responsibilities
//! - Define the account discovery contract (`discovery.rs`)
//! - Wallet extension strategy (`extension.rs`)
//! - Local keyring strategy and store (`keyring.rs`)
//! - Drive the account state machine (`tracker.rs`)
//!
//! # Design Decisions
//! - Strategies are selected by host capability, never by probing globals
//! - Subscription release goes through `subscription.rs` so it happens exactly once

pub mod discovery;
pub mod extension;
pub mod keyring;
pub mod subscription;
pub mod tracker;
pub mod types;

pub use discovery::{select_discovery, AccountDiscovery, HostEnvironment};
pub use extension::{ExtensionDiscovery, InjectedAccounts, InjectedExtension};
pub use keyring::{development_accounts, Keyring, KeyringDiscovery, KeyringOptions};
pub use subscription::SubscriptionSlot;
pub use tracker::AccountSourceTracker;
pub use types::{
    AccountMeta, AccountSink, DiscoveryError, DiscoveryRequest, InjectedAccount, KeyType, KeyringError,
    SubscribeOptions, Unsubscribe,
};
