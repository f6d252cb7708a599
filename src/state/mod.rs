//! Connection/account state subsystem.
//!
//! # Data Flow
//! ```text
//! connection milestones ─┐
//!                        ├→ store.rs (serialized queue → pure reducer) → Snapshot
//! account milestones ────┘
//! ```
//!
//! # Design Decisions
//! - Two independent machines (connection.rs, accounts.rs) merged only for reading
//! - Transitions are pure functions; the store is the only writer
//! - Tag and payload live in the same enum variant, so they cannot disagree

pub mod accounts;
pub mod connection;
pub mod snapshot;
pub mod store;

pub use accounts::{AccountCollection, AccountEvent, AccountSourceState};
pub use connection::{ApiStatus, ConnectionEvent, ConnectionState};
pub use snapshot::{Action, Snapshot, Tracker};
pub use store::{Dispatcher, Store};
