//! Account source state machine.
//!
//! # State Transitions
//! ```text
//! Uninitialized → Loading → Ready ⟲ (every delivery re-enters Ready)
//! Loading → Error
//! ```
//!
//! A delivery replaces the whole collection; nothing from an earlier
//! delivery survives. An error carries no collection at all.

use std::sync::Arc;

use crate::accounts::{DiscoveryError, InjectedAccount};

/// Immutable, cheaply clonable account collection.
pub type AccountCollection = Arc<[InjectedAccount]>;

/// Milestones driving the account state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountEvent {
    /// The single discovery attempt was issued.
    Init,
    /// The subscription delivered the full current collection.
    Delivered(Vec<InjectedAccount>),
    /// Authorization or subscription was rejected.
    Failed(DiscoveryError),
}

/// Account source state as seen by consumers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AccountSourceState {
    #[default]
    Uninitialized,
    Loading,
    Ready(AccountCollection),
    Error(DiscoveryError),
}

impl AccountSourceState {
    /// Apply one milestone, producing the next state.
    pub fn apply(&self, event: AccountEvent) -> AccountSourceState {
        match event {
            AccountEvent::Init => AccountSourceState::Loading,
            AccountEvent::Delivered(accounts) => AccountSourceState::Ready(accounts.into()),
            AccountEvent::Failed(error) => AccountSourceState::Error(error),
        }
    }

    /// Stable lowercase label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            AccountSourceState::Uninitialized => "uninitialized",
            AccountSourceState::Loading => "loading",
            AccountSourceState::Ready(_) => "ready",
            AccountSourceState::Error(_) => "error",
        }
    }

    /// Current collection, present only when ready.
    pub fn accounts(&self) -> Option<&[InjectedAccount]> {
        match self {
            AccountSourceState::Ready(accounts) => Some(accounts.as_ref()),
            _ => None,
        }
    }

    /// Error payload, present only in the error state.
    pub fn error(&self) -> Option<&DiscoveryError> {
        match self {
            AccountSourceState::Error(e) => Some(e),
            _ => None,
        }
    }
}
