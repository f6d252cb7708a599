//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, backoff bounds, SS58 prefix)
//! - Check endpoint URLs and bind addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ContextConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::ContextConfig;

/// Highest prefix representable in an SS58 address.
pub const MAX_SS58_PREFIX: u16 = 16_383;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    /// Human-readable explanation.
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &ContextConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.api.endpoint) {
        Ok(url) if matches!(url.scheme(), "ws" | "wss") => {}
        Ok(url) => errors.push(ValidationError::new(
            "api.endpoint",
            format!("unsupported scheme '{}', expected ws or wss", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(
            "api.endpoint",
            format!("invalid URL '{}': {}", config.api.endpoint, e),
        )),
    }

    if config.api.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("api.connect_timeout_secs", "must be greater than 0"));
    }
    if config.api.request_timeout_secs == 0 {
        errors.push(ValidationError::new("api.request_timeout_secs", "must be greater than 0"));
    }
    if config.api.reconnect_base_delay_ms > config.api.reconnect_max_delay_ms {
        errors.push(ValidationError::new(
            "api.reconnect_base_delay_ms",
            format!(
                "base delay {}ms exceeds max delay {}ms",
                config.api.reconnect_base_delay_ms, config.api.reconnect_max_delay_ms
            ),
        ));
    }

    if config.accounts.app_name.trim().is_empty() {
        errors.push(ValidationError::new("accounts.app_name", "must not be empty"));
    }
    if let Some(prefix) = config.accounts.ss58_format {
        if prefix > MAX_SS58_PREFIX {
            errors.push(ValidationError::new(
                "accounts.ss58_format",
                format!("prefix {} exceeds {}", prefix, MAX_SS58_PREFIX),
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
