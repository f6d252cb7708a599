//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the context host.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the substrate context host.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ContextConfig {
    /// Chain API connection settings.
    pub api: ApiConfig,

    /// Account source settings (wallet extension or keyring).
    pub accounts: AccountsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Chain API connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// WebSocket endpoint of the chain node (e.g., "ws://127.0.0.1:9944").
    pub endpoint: String,

    /// Optional network label, used in logs.
    pub network: Option<String>,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Per-request RPC timeout in seconds.
    pub request_timeout_secs: u64,

    /// Reconnect automatically after the socket drops.
    pub auto_reconnect: bool,

    /// Base delay for reconnect backoff in milliseconds.
    pub reconnect_base_delay_ms: u64,

    /// Maximum delay for reconnect backoff in milliseconds.
    pub reconnect_max_delay_ms: u64,

    /// Register the bundled NFT type definitions with the client.
    pub register_types: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:9944".to_string(),
            network: None,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            auto_reconnect: true,
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 30_000,
            register_types: true,
        }
    }
}

/// Where signer accounts come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccountSourceKind {
    /// Browser wallet extensions injected into the host.
    #[default]
    Extension,
    /// Local keyring, optionally merged with extension accounts.
    Keyring,
}

/// Account source configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccountsConfig {
    /// Application identity presented to wallet extensions.
    pub app_name: String,

    /// Discovery strategy.
    pub source: AccountSourceKind,

    /// Add the well-known development accounts to the keyring.
    pub load_development_accounts: bool,

    /// SS58 address prefix requested from the account source.
    pub ss58_format: Option<u16>,

    /// Only keep accounts bound to this genesis hash (or unbound ones).
    pub genesis_hash: Option<String>,

    /// JSON file where keyring accounts are persisted.
    pub keyring_path: Option<String>,

    /// Feed extension accounts into the keyring when extensions are available.
    pub merge_extension_accounts: bool,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            app_name: "Litentry dApp".to_string(),
            source: AccountSourceKind::Extension,
            load_development_accounts: false,
            ss58_format: None,
            genesis_hash: None,
            keyring_path: None,
            merge_extension_accounts: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log filter when `RUST_LOG` is not set.
    pub log_level: String,

    /// Emit logs as JSON lines instead of human-readable text.
    pub json_logs: bool,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "substrate_context=info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9100".to_string(),
        }
    }
}
