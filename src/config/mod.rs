//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ContextConfig (validated, immutable)
//!     → split into ApiOptions / ProviderProps / keyring options
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{AccountSourceKind, AccountsConfig, ApiConfig, ContextConfig, ObservabilityConfig};
pub use validation::{validate_config, ValidationError};
