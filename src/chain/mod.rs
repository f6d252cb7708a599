//! Chain connection subsystem.
//!
//! # Responsibilities
//! - Define the chain client contract (`service.rs`)
//! - Provide a JSON-RPC WebSocket client (`ws.rs`)
//! - Drive the connection state machine from client milestones (`tracker.rs`)

pub mod service;
pub mod tracker;
pub mod types;
pub mod ws;

pub use service::{ApiHandle, ChainApi, ChainConnection, ChainConnector};
pub use tracker::ConnectionTracker;
pub use types::{ApiOptions, ChainEvent, ChainResult, ConnectionError, RuntimeInfo};
pub use ws::{WsApi, WsConnector};
