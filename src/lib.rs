//! Connection and account state for Substrate front-ends.

pub mod accounts;
pub mod chain;
pub mod config;
pub mod definitions;
pub mod lifecycle;
pub mod observability;
pub mod provider;
pub mod resilience;
pub mod state;

pub use config::ContextConfig;
pub use lifecycle::Shutdown;
pub use provider::{ProviderProps, SubstrateProvider};
pub use state::Snapshot;
