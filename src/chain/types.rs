//! Chain connection types and error definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::config::ApiConfig;
use crate::definitions::{nft, TypeDefinitions, TypeParseError};
use crate::resilience::ReconnectPolicy;

/// Errors reported by the chain client.
///
/// Stored verbatim in the connection state; never interpreted by the trackers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// Endpoint could not be parsed or uses an unsupported scheme.
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// Socket-level failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Connection attempt timed out.
    #[error("Connection timeout after {0} seconds")]
    Timeout(u64),

    /// A single RPC call timed out.
    #[error("RPC '{method}' timed out after {millis}ms")]
    RequestTimeout { method: String, millis: u64 },

    /// The node answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The node sent something that is not valid JSON-RPC.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No socket is currently open.
    #[error("Not connected")]
    NotConnected,

    /// Opaque payload from an external client.
    #[error("{0}")]
    Other(String),
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ConnectionError>;

/// Milestones emitted by an open connection, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    /// The transport is up.
    Connected,
    /// The client finished its initial handshake.
    Ready,
    /// The transport dropped.
    Disconnected,
    /// The client reported an error.
    Error(ConnectionError),
}

/// Runtime facts gathered during the handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeInfo {
    /// Chain name (`system_chain`).
    pub chain: String,
    /// Runtime spec name.
    pub spec_name: String,
    /// Runtime spec version.
    pub spec_version: u32,
    /// Raw `system_properties` (token symbol, decimals, ss58 format).
    pub properties: Value,
}

impl RuntimeInfo {
    /// SS58 prefix advertised by the chain, if any.
    pub fn ss58_format(&self) -> Option<u16> {
        self.properties
            .get("ss58Format")
            .and_then(Value::as_u64)
            .and_then(|v| u16::try_from(v).ok())
    }
}

/// Options for opening a chain connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiOptions {
    /// WebSocket endpoint.
    pub endpoint: String,
    /// Optional network label for logs.
    pub network: Option<String>,
    /// Connection establishment timeout.
    pub connect_timeout: Duration,
    /// Per-request RPC timeout.
    pub request_timeout: Duration,
    /// What the client does after the socket drops.
    pub reconnect: ReconnectPolicy,
    /// Custom types registered with the client.
    pub types: Option<TypeDefinitions>,
}

impl ApiOptions {
    /// Options for `endpoint` with default timeouts and reconnect policy.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            network: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            reconnect: ReconnectPolicy::default(),
            types: None,
        }
    }

    /// Build options from the `[api]` config section.
    pub fn from_config(config: &ApiConfig) -> Result<Self, TypeParseError> {
        let types = if config.register_types {
            Some(nft::definitions()?)
        } else {
            None
        };

        Ok(Self {
            endpoint: config.endpoint.clone(),
            network: config.network.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            reconnect: ReconnectPolicy {
                enabled: config.auto_reconnect,
                base_delay_ms: config.reconnect_base_delay_ms,
                max_delay_ms: config.reconnect_max_delay_ms,
            },
            types,
        })
    }
}
