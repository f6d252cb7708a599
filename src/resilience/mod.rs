//! Resilience subsystem.
//!
//! # Components
//! - backoff.rs: Exponential backoff with jitter for chain reconnects
//!
//! # Design Decisions
//! - Reconnection belongs to the chain client, never to the trackers
//! - Jitter avoids reconnect storms against a restarted node

pub mod backoff;

pub use backoff::{calculate_backoff, ReconnectPolicy};
