/// ATM configuration from environment variables
///
/// Controls the wallet provider endpoint, the ledger contract binding and the
/// bounds placed on remote waits. Defaults target a local development node.
use alloy_primitives::{address, Address};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::AtmError;

/// Ledger contract deployed first on a fresh local development node
pub const DEFAULT_CONTRACT_ADDRESS: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");

/// Gas limit attached to deposit/withdraw submissions
pub const DEFAULT_GAS_LIMIT: u64 = 100_000;

#[derive(Clone, Debug)]
pub struct AtmConfig {
    /// Wallet provider JSON-RPC endpoint
    pub rpc_url: String,
    /// Ledger contract address
    pub contract_address: Address,
    /// Gas limit for state-mutating calls
    pub gas_limit: u64,
    /// Upper bound on waiting for a submitted transaction to become final
    pub finality_timeout: Duration,
    /// Upper bound on fetching the network fee rate
    pub rate_fetch_timeout: Duration,
    /// Delay between receipt polls
    pub receipt_poll_interval: Duration,
    /// HTTP request timeout for a single JSON-RPC call
    pub request_timeout: Duration,
}

impl AtmConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `ATM_RPC_URL`: wallet provider endpoint (default `http://127.0.0.1:8545`)
    /// - `ATM_CONTRACT_ADDRESS`: ledger contract address
    /// - `ATM_GAS_LIMIT`: gas limit for deposit/withdraw (default 100000)
    /// - `ATM_FINALITY_TIMEOUT_SECS`: finality wait bound (default 60)
    /// - `ATM_RATE_FETCH_TIMEOUT_SECS`: fee rate fetch bound (default 10)
    /// - `ATM_RECEIPT_POLL_MS`: receipt poll interval (default 500)
    /// - `ATM_REQUEST_TIMEOUT_SECS`: per-request HTTP timeout (default 30)
    ///
    /// # Examples
    ///
    /// ```bash
    /// ATM_RPC_URL=http://localhost:3000 ATM_FINALITY_TIMEOUT_SECS=5 cargo test
    /// ```
    pub fn from_env() -> Result<Self, AtmError> {
        let defaults = Self::default();

        let rpc_url = env::var("ATM_RPC_URL").unwrap_or(defaults.rpc_url);
        log::info!("📡 Wallet provider URL: {}", rpc_url);

        let contract_address = match env::var("ATM_CONTRACT_ADDRESS") {
            Ok(raw) => parse_address(&raw)?,
            Err(_) => defaults.contract_address,
        };
        log::info!("📜 Ledger contract: {}", contract_address);

        let gas_limit = env_number("ATM_GAS_LIMIT")?.unwrap_or(defaults.gas_limit);
        let finality_timeout = env_number("ATM_FINALITY_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.finality_timeout);
        let rate_fetch_timeout = env_number("ATM_RATE_FETCH_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.rate_fetch_timeout);
        let receipt_poll_interval = env_number("ATM_RECEIPT_POLL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.receipt_poll_interval);
        let request_timeout = env_number("ATM_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        log::debug!(
            "⏱️  gas_limit={}, finality_timeout={:?}, rate_fetch_timeout={:?}, poll={:?}",
            gas_limit,
            finality_timeout,
            rate_fetch_timeout,
            receipt_poll_interval
        );

        Ok(Self {
            rpc_url,
            contract_address,
            gas_limit,
            finality_timeout,
            rate_fetch_timeout,
            receipt_poll_interval,
            request_timeout,
        })
    }
}

impl Default for AtmConfig {
    /// Local development node defaults
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            contract_address: DEFAULT_CONTRACT_ADDRESS,
            gas_limit: DEFAULT_GAS_LIMIT,
            finality_timeout: Duration::from_secs(60),
            rate_fetch_timeout: Duration::from_secs(10),
            receipt_poll_interval: Duration::from_millis(500),
            request_timeout: Duration::from_secs(30),
        }
    }
}

fn parse_address(raw: &str) -> Result<Address, AtmError> {
    Address::from_str(raw.trim())
        .map_err(|e| AtmError::InvalidConfig(format!("ATM_CONTRACT_ADDRESS '{}': {}", raw, e)))
}

fn env_number(key: &str) -> Result<Option<u64>, AtmError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| AtmError::InvalidConfig(format!("{} '{}': {}", key, raw, e))),
        Err(_) => Ok(None),
    }
}
