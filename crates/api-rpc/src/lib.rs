//! JSON-RPC API Layer
//!
//! Exposes the procwatch supervisor over JSON-RPC 2.0: target commands,
//! status/metrics/event queries, log tails, configuration and a live
//! snapshot subscription.

pub mod error;
pub mod handler;
pub mod sanitize;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerConfig};
