//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Mount (provider.rs):
//!     Build store → Start connection tracker → Start account tracker
//!
//! Unmount (shutdown.rs):
//!     Freeze store → Release account subscription → Stop background tasks
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger unmount in the host binary
//! ```
//!
//! # Design Decisions
//! - Shutdown is sticky so late subscribers never miss it
//! - Background tasks never outlive the provider they report to

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
