//! Pod network-namespace isolation control
//!
//! This crate provides the core functionality for:
//! - Resolving the local Kubernetes node
//! - Building the inventory of eligible pods and their namespace PIDs
//! - Dispatching firewall inspect/flush commands into pod namespaces

pub mod config;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod inventory;
pub mod models;
pub mod node;
pub mod observability;
pub mod runtime;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{IsolationConfig, LogFormat};
pub use dispatch::{CommandRequest, Dispatcher, Verb};
pub use error::{ErrorKind, IsolationError, Result};
pub use models::*;
pub use observability::RunLogger;
