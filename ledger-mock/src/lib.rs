/// Ledger Mock Node Library
///
/// This crate provides both a standalone binary and library components
/// for emulating a wallet-connected node that hosts the ledger contract.

pub mod handlers;
pub mod node;
pub mod server;
pub mod types;

// Re-export commonly used types
pub use node::{MiningMode, MockNode, NodeConfig, RpcError};
pub use server::{create_router, run_server, serve};
pub use types::*;
