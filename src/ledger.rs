//! Ledger contract client
//!
//! Thin capability over the remote ledger contract, bound to one signer
//! account and one contract address:
//!
//! - `getBalance()` is read with `eth_call`
//! - `deposit(uint256)` / `withdraw(uint256)` are submitted with
//!   `eth_sendTransaction`, carrying the caller's gas limit and gas price
//! - finality is observed by polling `eth_getTransactionReceipt`
//!
//! Every call can fail independently. Failures are returned as
//! [`AtmError::RemoteCallFailed`] with the revert decoded where possible.

use alloy_primitives::{Address, Bytes, TxHash, U128, U256};
use alloy_rpc_types_eth::{TransactionInput, TransactionReceipt, TransactionRequest};
use alloy_sol_types::{sol, Revert, SolCall, SolError};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::FailureCause;
use crate::fee::NetworkFeeParams;
use crate::input::Amount;
use crate::provider::{ProviderError, WalletProvider};
use crate::wallet::Account;
use crate::AtmError;

sol! {
    /// Call interface of the ledger contract
    interface ILedger {
        function getBalance() external view returns (uint256);
        function deposit(uint256 _amount) external payable;
        function withdraw(uint256 _withdrawAmount) external;

        error InsufficientBalance(uint256 balance, uint256 withdrawAmount);
    }
}

/// Reference to a submitted transaction
pub type TransactionRef = TxHash;

/// A transaction that reached finality successfully
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Finality {
    pub tx_ref: TransactionRef,
    pub block_number: u64,
    pub gas_used: U256,
}

/// Ledger contract bound to a signer
#[derive(Clone, Debug)]
pub struct LedgerClient<P> {
    provider: P,
    account: Account,
    contract: Address,
    gas_limit: u64,
    poll_interval: Duration,
}

impl<P: WalletProvider> LedgerClient<P> {
    /// Bind the contract at `contract` to the signer `account`
    pub fn bind(
        provider: P,
        account: Account,
        contract: Address,
        gas_limit: u64,
        poll_interval: Duration,
    ) -> Self {
        log::info!("📜 Ledger {} bound to signer {}", contract, account);
        Self {
            provider,
            account,
            contract,
            gas_limit,
            poll_interval,
        }
    }

    pub fn account(&self) -> Account {
        self.account
    }

    fn call_request(&self, data: Vec<u8>) -> TransactionRequest {
        TransactionRequest::default()
            .from(self.account.address())
            .to(self.contract)
            .input(TransactionInput::new(Bytes::from(data)))
    }

    /// Query the signer's balance held by the ledger
    pub async fn get_balance(&self) -> Result<U256, AtmError> {
        let request = self.call_request(ILedger::getBalanceCall {}.abi_encode());
        let result = self
            .provider
            .request("eth_call", json!([request, "latest"]))
            .await
            .map_err(|e| call_failed("getBalance", e))?;

        let bytes: Bytes = decode("getBalance", result)?;
        let balance = ILedger::getBalanceCall::abi_decode_returns(&bytes, true)
            .map_err(|e| AtmError::remote("getBalance", FailureCause::Malformed(e.to_string())))?
            ._0;

        log::info!("📊 Ledger balance: {}", balance);
        Ok(balance)
    }

    /// Fetch the network's current fee rate
    pub async fn network_fee_params(&self) -> Result<NetworkFeeParams, AtmError> {
        let result = self
            .provider
            .request("eth_gasPrice", json!([]))
            .await
            .map_err(|e| call_failed("eth_gasPrice", e))?;
        let gas_price: U128 = decode("eth_gasPrice", result)?;

        Ok(NetworkFeeParams {
            gas_limit: self.gas_limit,
            gas_price: gas_price.to::<u128>(),
        })
    }

    /// Submit `deposit(amount)`
    pub async fn deposit(
        &self,
        amount: Amount,
        fee: &NetworkFeeParams,
    ) -> Result<TransactionRef, AtmError> {
        let call = ILedger::depositCall {
            _amount: U256::from(amount.units()),
        };
        self.submit("deposit", call.abi_encode(), fee).await
    }

    /// Submit `withdraw(amount)`
    pub async fn withdraw(
        &self,
        amount: Amount,
        fee: &NetworkFeeParams,
    ) -> Result<TransactionRef, AtmError> {
        let call = ILedger::withdrawCall {
            _withdrawAmount: U256::from(amount.units()),
        };
        self.submit("withdraw", call.abi_encode(), fee).await
    }

    async fn submit(
        &self,
        call: &str,
        data: Vec<u8>,
        fee: &NetworkFeeParams,
    ) -> Result<TransactionRef, AtmError> {
        log::info!("📞 Submitting '{}' to ledger {}", call, self.contract);
        let mut request = self.call_request(data).gas_limit(fee.gas_limit);
        request.gas_price = Some(fee.gas_price);

        let result = self
            .provider
            .request("eth_sendTransaction", json!([request]))
            .await
            .map_err(|e| call_failed(call, e))?;

        let tx_ref: TransactionRef = decode(call, result)?;
        log::info!("   ✅ Submitted! Tx: {}", tx_ref);
        Ok(tx_ref)
    }

    /// Wait until `tx_ref` is mined
    ///
    /// Polls without bound; callers needing a deadline wrap this in a timeout.
    pub async fn await_finality(&self, tx_ref: TransactionRef) -> Result<Finality, AtmError> {
        log::info!("⏳ Waiting for finality of {}", tx_ref);
        loop {
            let result = self
                .provider
                .request("eth_getTransactionReceipt", json!([tx_ref]))
                .await
                .map_err(|e| call_failed("eth_getTransactionReceipt", e))?;

            match decode::<Option<TransactionReceipt>>("eth_getTransactionReceipt", result)? {
                Some(receipt) => {
                    let finality = finality_of(tx_ref, &receipt)
                        .map_err(|cause| AtmError::remote("eth_getTransactionReceipt", cause))?;
                    log::info!("   ✅ Final in block {}", finality.block_number);
                    return Ok(finality);
                }
                None => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }
}

/// Convert a provider error into a remote call failure, decoding revert data
fn call_failed(call: &str, err: ProviderError) -> AtmError {
    let decoded = err
        .revert_data()
        .and_then(|data| data.parse::<Bytes>().ok())
        .and_then(|bytes| decode_revert(&bytes));

    let cause = match decoded {
        Some(cause) => cause,
        None => match err {
            ProviderError::Rpc { code, message, .. }
                if code != crate::provider::USER_REJECTED && message.contains("revert") =>
            {
                FailureCause::Reverted(message)
            }
            other => other.into(),
        },
    };
    AtmError::remote(call, cause)
}

fn decode_revert(data: &[u8]) -> Option<FailureCause> {
    if let Ok(err) = ILedger::InsufficientBalance::abi_decode(data, true) {
        return Some(FailureCause::InsufficientBalance {
            balance: err.balance,
            requested: err.withdrawAmount,
        });
    }
    if let Ok(revert) = Revert::abi_decode(data, true) {
        return Some(FailureCause::Reverted(revert.reason));
    }
    None
}

/// Deserialize a JSON-RPC result, reporting failures against `call`
fn decode<T: DeserializeOwned>(call: &str, value: Value) -> Result<T, AtmError> {
    serde_json::from_value(value)
        .map_err(|e| AtmError::remote(call, FailureCause::Malformed(e.to_string())))
}

fn finality_of(
    tx_ref: TransactionRef,
    receipt: &TransactionReceipt,
) -> Result<Finality, FailureCause> {
    if !receipt.status() {
        return Err(FailureCause::TransactionFailed(tx_ref));
    }
    Ok(Finality {
        tx_ref,
        block_number: receipt.block_number.unwrap_or_default(),
        gas_used: U256::from(receipt.gas_used),
    })
}
