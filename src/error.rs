//! Error types for ledger ATM operations
//!
//! Input validation, wallet connection, ledger calls and the bounded waits
//! around them all report through [`AtmError`]. Remote failures carry a
//! [`FailureCause`] so callers can tell a rejected signature from a contract
//! revert or a network problem.

use alloy_primitives::{TxHash, U256};
use std::time::Duration;
use thiserror::Error;

/// Core error type for ledger ATM operations
#[derive(Clone, Debug, PartialEq, Error)]
pub enum AtmError {
    /// No wallet capability detected in the host environment
    #[error("No wallet found. Please install a wallet provider in order to use this ATM")]
    WalletUnavailable,

    /// User refused to authorize an account
    #[error("Wallet connection declined: {0}")]
    ConnectionDeclined(String),

    /// Non-numeric or out-of-range user input, rejected before any remote call
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A ledger or wallet call failed
    #[error("Remote call `{call}` failed: {cause}")]
    RemoteCallFailed { call: String, cause: FailureCause },

    /// The submitted transaction did not reach finality in time
    #[error("Transaction {tx_ref} not final after {waited:?}")]
    FinalityTimeout { tx_ref: TxHash, waited: Duration },

    /// The network fee rate could not be fetched in time
    #[error("Fee rate fetch timed out after {0:?}")]
    RateFetchTimeout(Duration),

    /// A wallet authorization request is already pending
    #[error("A wallet connection request is already pending")]
    ConnectPending,

    /// A transaction is already being submitted or awaiting finality
    #[error("A transaction is already in flight")]
    TransactionPending,

    /// The caller stopped waiting before the submission settled; the
    /// transaction may still reach the ledger
    #[error("Submission cancelled before it settled")]
    SubmissionCancelled,

    /// Operation not permitted in the current controller state
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// Malformed configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Why a remote call failed
#[derive(Clone, Debug, PartialEq, Error)]
pub enum FailureCause {
    /// The wallet refused to sign (EIP-1193 code 4001)
    #[error("signature rejected: {0}")]
    SigningRejected(String),

    /// The ledger refused a withdrawal larger than the balance
    #[error("insufficient balance: balance {balance}, requested {requested}")]
    InsufficientBalance { balance: U256, requested: U256 },

    /// The contract reverted with a reason
    #[error("execution reverted: {0}")]
    Reverted(String),

    /// The transaction was mined but its execution failed
    #[error("transaction {0} failed on-chain")]
    TransactionFailed(TxHash),

    /// Any other JSON-RPC error
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Transport-level failure reaching the wallet or node
    #[error("network error: {0}")]
    Network(String),

    /// The response could not be interpreted
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl AtmError {
    /// Create a remote call failure
    pub fn remote(call: impl Into<String>, cause: FailureCause) -> Self {
        Self::RemoteCallFailed {
            call: call.into(),
            cause,
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether the user can recover by returning to an earlier step
    ///
    /// Every error in this crate is recoverable; this only separates the
    /// ones caused by the user's own input or choices.
    pub fn is_user_caused(&self) -> bool {
        matches!(
            self,
            Self::ConnectionDeclined(_)
                | Self::InvalidInput(_)
                | Self::SubmissionCancelled
                | Self::RemoteCallFailed {
                    cause: FailureCause::SigningRejected(_),
                    ..
                }
        )
    }
}
