//! Merged, read-only snapshot and the reducer producing it.

use crate::chain::ApiHandle;
use crate::state::accounts::{AccountEvent, AccountSourceState};
use crate::state::connection::{ConnectionEvent, ConnectionState};

/// The two independent state machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tracker {
    Connection,
    Accounts,
}

impl Tracker {
    pub fn label(self) -> &'static str {
        match self {
            Tracker::Connection => "connection",
            Tracker::Accounts => "accounts",
        }
    }
}

/// One milestone for either tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Connection(ConnectionEvent),
    Accounts(AccountEvent),
}

impl Action {
    /// Which tracker produced the action.
    pub fn tracker(&self) -> Tracker {
        match self {
            Action::Connection(_) => Tracker::Connection,
            Action::Accounts(_) => Tracker::Accounts,
        }
    }
}

impl From<ConnectionEvent> for Action {
    fn from(event: ConnectionEvent) -> Self {
        Action::Connection(event)
    }
}

impl From<AccountEvent> for Action {
    fn from(event: AccountEvent) -> Self {
        Action::Accounts(event)
    }
}

/// What consumers render from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub connection: ConnectionState,
    pub accounts: AccountSourceState,
}

impl Snapshot {
    /// Pure transition: the next snapshot after `action`.
    pub fn reduce(&self, action: Action) -> Snapshot {
        match action {
            Action::Connection(event) => Snapshot {
                connection: self.connection.apply(event),
                accounts: self.accounts.clone(),
            },
            Action::Accounts(event) => Snapshot {
                connection: self.connection.clone(),
                accounts: self.accounts.apply(event),
            },
        }
    }

    /// API handle, once the connection came up.
    pub fn api(&self) -> Option<&ApiHandle> {
        self.connection.api.as_ref()
    }

    /// Label of the state the given tracker is in.
    pub fn label_for(&self, tracker: Tracker) -> &'static str {
        match tracker {
            Tracker::Connection => self.connection.status.label(),
            Tracker::Accounts => self.accounts.label(),
        }
    }
}
