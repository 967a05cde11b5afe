//! Shared types and RPC contracts used by both the reconciliation engine
//! and whatever model-store/broker adapters back it in a given deployment.

pub mod config;
pub mod rpc;
pub mod state;

pub use config::SupervisorConfig;
pub use rpc::{NodeControl, SupervisorError};
pub use state::{ModelChange, Node, NodeId};
