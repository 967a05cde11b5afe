//! RPC contracts shared between the supervisor and whatever broker-backed
//! transport implements them.
//!
//! `control` defines the capability a node exposes to the supervisor
//! (`NodeControl`); `error` defines the disposition-bearing error taxonomy
//! the reconciliation engine matches on.

pub mod control;
pub mod error;

pub use control::{NodeControl, NodeStats, QueueInfo};
pub use error::SupervisorError;
