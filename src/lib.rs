//! Ledger ATM: wallet-driven deposits and withdrawals against a ledger contract
//!
//! This crate connects a wallet, reads the account balance held by a remote
//! ledger contract, and submits deposit/withdraw transactions through an
//! explicit state machine. It also carries a purely local loan calculator.
//!
//! # Architecture
//!
//! - **WalletSession**: detects the wallet capability and authorizes one account
//! - **LedgerClient**: `getBalance` / `deposit` / `withdraw` / finality, bound to the signer
//! - **TransactionController**: the orchestrating state machine, one transaction in flight
//! - **FeeEstimator**: advisory 0.5% display fee, distinct from the network fee rate
//! - **Amortization**: monthly payment for a compounded loan, independent of the rest
//!
//! # Example
//!
//! ```ignore
//! use ledger_atm::{AtmConfig, HttpWalletHost, TransactionController, TransactionKind};
//!
//! let config = AtmConfig::from_env()?;
//! let host = HttpWalletHost::new(config.rpc_url.clone(), config.request_timeout);
//! let controller = TransactionController::new(config);
//!
//! controller.probe(&host).await;
//! let account = controller.connect().await?;
//! println!("Account {} balance {:?}", account, controller.balance());
//!
//! controller.enter_amount("100")?;
//! let pending = controller.select(TransactionKind::Deposit)?;
//! println!("Estimated fee: {}", pending.estimated_fee);
//!
//! let confirmation = controller.confirm().await?;
//! println!("New balance: {}", confirmation.balance);
//! ```

// Public modules
pub mod amortization;
pub mod config;
pub mod controller;
pub mod error;
pub mod fee;
pub mod input;
pub mod ledger;
pub mod provider;
pub mod wallet;

// Re-exports for convenience
pub use amortization::{monthly_payment, LoanInputs, LoanResult};
pub use config::AtmConfig;
pub use controller::{
    Confirmation, ControllerState, PendingTransaction, TransactionController, TransactionKind,
};
pub use error::{AtmError, FailureCause};
pub use fee::{FeeEstimate, FeeEstimator, NetworkFeeParams};
pub use input::{parse_amount, Amount};
pub use ledger::{Finality, LedgerClient, TransactionRef};
pub use provider::{HttpWalletHost, HttpWalletProvider, ProviderError, WalletHost, WalletProvider};
pub use wallet::{Account, SessionState, WalletSession};

// Re-export commonly used EVM types
pub use alloy_primitives::{Address, U256};

// Common result type
pub type Result<T> = std::result::Result<T, AtmError>;
