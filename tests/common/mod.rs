//! Shared fixtures for ledger ATM integration tests
//!
//! The wallet provider here calls straight into an in-memory [`MockNode`],
//! yielding once per request so concurrent triggers interleave the way they
//! would against a real wallet.

#![allow(dead_code)]

use ledger_atm::{
    AtmConfig, ProviderError, TransactionController, WalletHost, WalletProvider,
};
use ledger_mock::{MiningMode, MockNode, NodeConfig};
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Load environment variables (e.g. RUST_LOG) from the crate's .env file
pub fn load_env() {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push(".env");
    dotenv::from_path(&path).ok();
}

pub fn init_logging() {
    load_env();
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}

/// Wallet provider backed by an in-process mock node
#[derive(Clone)]
pub struct InProcessProvider {
    node: Arc<MockNode>,
    stalled: Arc<Mutex<HashSet<String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl InProcessProvider {
    pub fn new(node: Arc<MockNode>) -> Self {
        Self {
            node,
            stalled: Arc::new(Mutex::new(HashSet::new())),
            failing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Make every later `method` request hang forever
    pub fn stall(&self, method: &str) {
        self.stalled.lock().unwrap().insert(method.to_string());
    }

    /// Make every later `method` request fail at the transport level
    pub fn fail(&self, method: &str) {
        self.failing.lock().unwrap().insert(method.to_string());
    }

    /// Undo [`Self::stall`] and [`Self::fail`]
    pub fn heal(&self) {
        self.stalled.lock().unwrap().clear();
        self.failing.lock().unwrap().clear();
    }

    fn is_stalled(&self, method: &str) -> bool {
        self.stalled.lock().unwrap().contains(method)
    }

    fn is_failing(&self, method: &str) -> bool {
        self.failing.lock().unwrap().contains(method)
    }
}

impl WalletProvider for InProcessProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        tokio::task::yield_now().await;

        if self.is_stalled(method) {
            std::future::pending::<()>().await;
        }
        if self.is_failing(method) {
            return Err(ProviderError::Transport("connection reset".to_string()));
        }

        self.node
            .dispatch(method, &params)
            .map_err(|e| ProviderError::Rpc {
                code: e.code,
                message: e.message,
                data: e.data,
            })
    }
}

/// Host environment with a fixed (or no) wallet
pub struct StaticHost(pub Option<InProcessProvider>);

impl WalletHost for StaticHost {
    type Provider = InProcessProvider;

    async fn detect(&self) -> Option<InProcessProvider> {
        self.0.clone()
    }
}

pub fn node_with_balance(balance: u64, mining: MiningMode) -> Arc<MockNode> {
    Arc::new(MockNode::new(NodeConfig {
        initial_balance: ledger_atm::U256::from(balance),
        mining,
        ..Default::default()
    }))
}

/// Controller configuration with short waits, pointed at `node`'s ledger
pub fn test_config(node: &MockNode) -> AtmConfig {
    AtmConfig {
        contract_address: node.config().contract,
        finality_timeout: Duration::from_millis(500),
        rate_fetch_timeout: Duration::from_millis(200),
        receipt_poll_interval: Duration::from_millis(5),
        ..Default::default()
    }
}

/// A controller whose wallet has been detected but not connected
pub async fn detected_controller(
    node: &Arc<MockNode>,
) -> (InProcessProvider, TransactionController<InProcessProvider>) {
    let provider = InProcessProvider::new(node.clone());
    let controller = TransactionController::new(test_config(node));
    controller
        .probe(&StaticHost(Some(provider.clone())))
        .await;
    (provider, controller)
}

/// A controller with the owner account connected and its balance loaded
pub async fn connected_controller(
    node: &Arc<MockNode>,
) -> (InProcessProvider, TransactionController<InProcessProvider>) {
    let (provider, controller) = detected_controller(node).await;
    controller
        .connect()
        .await
        .expect("Failed to connect wallet");
    (provider, controller)
}
