/// Ledger Mock Node
///
/// A lightweight JSON-RPC node that emulates a wallet provider and the
/// ledger contract in memory. Designed for local development and tests.

use alloy_primitives::{Address, U256};
use anyhow::{Context, Result};
use std::env;
use std::sync::Arc;

use ledger_mock::{run_server, MiningMode, MockNode, NodeConfig};

#[derive(Debug)]
struct Config {
    // Ledger
    node: NodeConfig,

    // Server
    server_host: String,
    server_port: u16,
}

impl Config {
    fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let defaults = NodeConfig::default();

        let owner = match env::var("MOCK_OWNER") {
            Ok(raw) => raw
                .parse::<Address>()
                .context("Invalid MOCK_OWNER")?,
            Err(_) => defaults.owner,
        };

        let account = match env::var("MOCK_ACCOUNT") {
            Ok(raw) => raw
                .parse::<Address>()
                .context("Invalid MOCK_ACCOUNT")?,
            Err(_) => owner,
        };

        let contract = match env::var("MOCK_CONTRACT") {
            Ok(raw) => raw
                .parse::<Address>()
                .context("Invalid MOCK_CONTRACT")?,
            Err(_) => defaults.contract,
        };

        let initial_balance = match env::var("MOCK_INITIAL_BALANCE") {
            Ok(raw) => raw
                .parse::<U256>()
                .context("Invalid MOCK_INITIAL_BALANCE")?,
            Err(_) => defaults.initial_balance,
        };

        let gas_price = match env::var("MOCK_GAS_PRICE") {
            Ok(raw) => raw.parse::<u128>().context("Invalid MOCK_GAS_PRICE")?,
            Err(_) => defaults.gas_price,
        };

        // "manual" waits for POST /mock/mine
        let mining = match env::var("MOCK_CONFIRMATION_POLLS").as_deref() {
            Ok("manual") => MiningMode::Manual,
            Ok(raw) => MiningMode::AfterPolls(
                raw.parse()
                    .context("Invalid MOCK_CONFIRMATION_POLLS")?,
            ),
            Err(_) => defaults.mining,
        };

        let server_host = env::var("SERVER_HOST")
            .unwrap_or_else(|_| "127.0.0.1".to_string());

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8545".to_string())
            .parse()
            .context("Invalid SERVER_PORT")?;

        Ok(Self {
            node: NodeConfig {
                account,
                owner,
                contract,
                initial_balance,
                gas_price,
                mining,
                ..defaults
            },
            server_host,
            server_port,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    log::info!("Starting Ledger Mock Node...");

    // Load configuration
    let config = Config::from_env()
        .context("Failed to load configuration")?;

    log::info!("Wallet account: {}, ledger owner: {}", config.node.account, config.node.owner);
    log::info!("Server will listen on {}:{}", config.server_host, config.server_port);

    let node = Arc::new(MockNode::new(config.node));

    // Run server
    run_server(node, config.server_host, config.server_port)
        .await
        .context("Server error")?;

    Ok(())
}
