/// Emulated wallet provider and ledger contract
///
/// `MockNode` answers the JSON-RPC methods a wallet-connected ATM uses and
/// keeps the ledger contract's state in memory:
///
/// - account authorization with a user-approval switch
/// - signing approval, owner check and insufficient-balance revert
/// - receipts that appear after a configurable number of polls
use alloy_consensus::{Receipt, ReceiptEnvelope, ReceiptWithBloom};
use alloy_primitives::{address, keccak256, Address, Bloom, Bytes, TxKind, B256, U256};
use alloy_rpc_types_eth::{TransactionReceipt, TransactionRequest};
use alloy_sol_types::{sol, Revert, SolCall, SolError};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

use crate::types::SubmittedTransaction;

sol! {
    interface ILedger {
        function getBalance() external view returns (uint256);
        function deposit(uint256 _amount) external payable;
        function withdraw(uint256 _withdrawAmount) external;

        error InsufficientBalance(uint256 balance, uint256 withdrawAmount);
    }
}

pub const USER_REJECTED: i64 = 4001;
pub const UNAUTHORIZED: i64 = 4100;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const EXECUTION_REVERTED: i64 = 3;
pub const SERVER_ERROR: i64 = -32000;

const INTRINSIC_GAS: u64 = 21_000;
const LEDGER_CALL_GAS: u64 = 30_000;

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error("{code}: {message}")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    fn reverted(data: Vec<u8>) -> Self {
        Self {
            code: EXECUTION_REVERTED,
            message: "execution reverted".to_string(),
            data: Some(json!(Bytes::from(data))),
        }
    }
}

/// When submitted transactions are mined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiningMode {
    /// Mined on the n-th receipt poll (0 mines at submission)
    AfterPolls(u32),
    /// Only via [`MockNode::mine`]
    Manual,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub chain_id: u64,
    /// Account the wallet authorizes and signs for
    pub account: Address,
    /// Ledger contract owner; only it may deposit or withdraw
    pub owner: Address,
    pub contract: Address,
    pub initial_balance: U256,
    pub gas_price: u128,
    pub mining: MiningMode,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            chain_id: 31337,
            account: Address::repeat_byte(0x11),
            owner: Address::repeat_byte(0x11),
            contract: address!("5FbDB2315678afecb367f032d93F642f64180aa3"),
            initial_balance: U256::from(1),
            gas_price: 1_875_000_000,
            mining: MiningMode::AfterPolls(1),
        }
    }
}

#[derive(Debug)]
struct PendingTx {
    hash: B256,
    polls_left: u32,
}

/// An accepted transaction waiting to be mined
#[derive(Debug)]
struct Unmined {
    from: Address,
    gas_used: u64,
    gas_price: u128,
}

#[derive(Debug)]
struct NodeState {
    authorized: bool,
    approve_connect: bool,
    approve_sign: bool,
    gas_price: u128,
    mining: MiningMode,
    balance: U256,
    block_number: u64,
    nonce: u64,
    pending: VecDeque<PendingTx>,
    unmined: HashMap<B256, Unmined>,
    receipts: HashMap<B256, TransactionReceipt>,
    submitted: Vec<SubmittedTransaction>,
    calls: HashMap<String, usize>,
}

/// In-memory wallet provider + ledger contract
#[derive(Debug)]
pub struct MockNode {
    config: NodeConfig,
    state: Mutex<NodeState>,
}

impl MockNode {
    pub fn new(config: NodeConfig) -> Self {
        let state = NodeState {
            authorized: false,
            approve_connect: true,
            approve_sign: true,
            gas_price: config.gas_price,
            mining: config.mining,
            balance: config.initial_balance,
            block_number: 1,
            nonce: 0,
            pending: VecDeque::new(),
            unmined: HashMap::new(),
            receipts: HashMap::new(),
            submitted: Vec::new(),
            calls: HashMap::new(),
        };
        log::info!(
            "🏦 Mock ledger {} owned by {} with balance {}",
            config.contract,
            config.owner,
            config.initial_balance
        );
        Self {
            config,
            state: Mutex::new(state),
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, NodeState> {
        // Recover from poisoning
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Handle one JSON-RPC call
    pub fn dispatch(&self, method: &str, params: &Value) -> Result<Value, RpcError> {
        let mut state = self.lock();
        *state.calls.entry(method.to_string()).or_insert(0) += 1;
        log::debug!("➡️  {} {}", method, params);

        let outcome = match method {
            "eth_chainId" => Ok(json!(format!("0x{:x}", self.config.chain_id))),
            "eth_blockNumber" => Ok(json!(format!("0x{:x}", state.block_number))),
            "eth_gasPrice" => Ok(json!(U256::from(state.gas_price))),
            "eth_accounts" => Ok(self.accounts(&state)),
            "eth_requestAccounts" => self.request_accounts(&mut state),
            "eth_call" => self.call(&state, params),
            "eth_sendTransaction" => self.send_transaction(&mut state, params),
            "eth_getTransactionReceipt" => self.receipt(&mut state, params),
            other => Err(RpcError::new(
                METHOD_NOT_FOUND,
                format!("Method {} not found", other),
            )),
        };

        match &outcome {
            Ok(result) => log::debug!("⬅️  {} → {}", method, result),
            Err(e) => log::info!("⬅️  {} → error {}", method, e),
        }
        outcome
    }

    fn accounts(&self, state: &NodeState) -> Value {
        if state.authorized {
            json!([self.config.account])
        } else {
            json!([])
        }
    }

    fn request_accounts(&self, state: &mut NodeState) -> Result<Value, RpcError> {
        if !state.approve_connect {
            return Err(RpcError::new(USER_REJECTED, "User rejected the request."));
        }
        state.authorized = true;
        Ok(self.accounts(state))
    }

    fn call(&self, state: &NodeState, params: &Value) -> Result<Value, RpcError> {
        let tx = transaction_param(params)?;
        let data = self.calldata(&tx)?;

        if data.starts_with(&ILedger::getBalanceCall::SELECTOR) {
            let encoded =
                <ILedger::getBalanceCall as SolCall>::abi_encode_returns(&(state.balance,));
            return Ok(json!(Bytes::from(encoded)));
        }
        Err(RpcError::reverted(Vec::new()))
    }

    fn send_transaction(&self, state: &mut NodeState, params: &Value) -> Result<Value, RpcError> {
        let tx = transaction_param(params)?;
        let data = self.calldata(&tx)?;

        let from = tx
            .from
            .ok_or_else(|| RpcError::invalid_params("missing 'from'"))?;
        if !state.authorized || from != self.config.account {
            return Err(RpcError::new(
                UNAUTHORIZED,
                "The requested account has not been authorized by the user.",
            ));
        }
        if !state.approve_sign {
            return Err(RpcError::new(
                USER_REJECTED,
                "User denied transaction signature.",
            ));
        }

        let gas = tx.gas.unwrap_or(INTRINSIC_GAS + LEDGER_CALL_GAS);
        if gas < INTRINSIC_GAS {
            return Err(RpcError::new(SERVER_ERROR, "intrinsic gas too low"));
        }
        let gas_price = tx.gas_price.unwrap_or(state.gas_price);
        if gas_price < state.gas_price {
            return Err(RpcError::new(
                SERVER_ERROR,
                format!(
                    "transaction underpriced: gas price {} below current {}",
                    gas_price, state.gas_price
                ),
            ));
        }

        if from != self.config.owner {
            return Err(RpcError::reverted(
                Revert {
                    reason: "You are not the owner of this account".to_string(),
                }
                .abi_encode(),
            ));
        }

        let (method, amount) = if data.starts_with(&ILedger::depositCall::SELECTOR) {
            let call = ILedger::depositCall::abi_decode(&data, true)
                .map_err(|e| RpcError::invalid_params(format!("deposit calldata: {}", e)))?;
            state.balance = state.balance.saturating_add(call._amount);
            ("deposit", call._amount)
        } else if data.starts_with(&ILedger::withdrawCall::SELECTOR) {
            let call = ILedger::withdrawCall::abi_decode(&data, true)
                .map_err(|e| RpcError::invalid_params(format!("withdraw calldata: {}", e)))?;
            if state.balance < call._withdrawAmount {
                return Err(RpcError::reverted(
                    ILedger::InsufficientBalance {
                        balance: state.balance,
                        withdrawAmount: call._withdrawAmount,
                    }
                    .abi_encode(),
                ));
            }
            state.balance -= call._withdrawAmount;
            ("withdraw", call._withdrawAmount)
        } else {
            return Err(RpcError::reverted(
                Revert {
                    reason: "unknown function selector".to_string(),
                }
                .abi_encode(),
            ));
        };

        state.nonce += 1;
        let mut preimage = state.nonce.to_be_bytes().to_vec();
        preimage.extend_from_slice(&data);
        let hash = keccak256(&preimage);

        log::info!("📝 {} of {} accepted as {}", method, amount, hash);
        state.submitted.push(SubmittedTransaction {
            hash,
            from,
            method: method.to_string(),
            amount,
            gas,
            gas_price,
        });

        let gas_used = (INTRINSIC_GAS + LEDGER_CALL_GAS).min(gas);
        state.unmined.insert(
            hash,
            Unmined {
                from,
                gas_used,
                gas_price,
            },
        );

        match state.mining {
            MiningMode::AfterPolls(0) => {
                mine_one(state, self.config.contract, hash);
            }
            MiningMode::AfterPolls(polls) => state.pending.push_back(PendingTx {
                hash,
                polls_left: polls,
            }),
            MiningMode::Manual => state.pending.push_back(PendingTx {
                hash,
                polls_left: u32::MAX,
            }),
        }

        Ok(json!(hash))
    }

    fn receipt(&self, state: &mut NodeState, params: &Value) -> Result<Value, RpcError> {
        let hash: B256 = params
            .get(0)
            .cloned()
            .ok_or_else(|| RpcError::invalid_params("missing transaction hash"))
            .and_then(|v| {
                serde_json::from_value(v)
                    .map_err(|e| RpcError::invalid_params(format!("transaction hash: {}", e)))
            })?;

        if let Some(receipt) = state.receipts.get(&hash) {
            return Ok(json!(receipt));
        }

        let manual = state.mining == MiningMode::Manual;
        let due = match state.pending.iter_mut().find(|p| p.hash == hash) {
            Some(pending) if !manual => {
                pending.polls_left = pending.polls_left.saturating_sub(1);
                pending.polls_left == 0
            }
            _ => false,
        };
        if due {
            mine_one(state, self.config.contract, hash);
            return Ok(state.receipts.get(&hash).map(|r| json!(r)).unwrap_or(Value::Null));
        }
        Ok(Value::Null)
    }

    /// Calldata of a transaction addressed to the ledger contract
    fn calldata<'a>(&self, tx: &'a TransactionRequest) -> Result<&'a [u8], RpcError> {
        match tx.to {
            Some(TxKind::Call(to)) if to == self.config.contract => {}
            Some(TxKind::Call(to)) => {
                return Err(RpcError::invalid_params(format!(
                    "no contract deployed at {}",
                    to
                )))
            }
            _ => return Err(RpcError::invalid_params("contract creation is not supported")),
        }
        Ok(tx.input.input().map(|data| &data[..]).unwrap_or_default())
    }

    // ------------------------------------------------------------------
    // Control surface
    // ------------------------------------------------------------------

    /// Mine up to `count` pending transactions (all when `None`)
    pub fn mine(&self, count: Option<usize>) -> Vec<B256> {
        let mut state = self.lock();
        let take = count.unwrap_or(state.pending.len()).min(state.pending.len());
        let hashes: Vec<B256> = state.pending.iter().take(take).map(|p| p.hash).collect();
        for hash in &hashes {
            mine_one(&mut state, self.config.contract, *hash);
        }
        log::info!("⛏️  Mined {} transaction(s)", hashes.len());
        hashes
    }

    /// Switch user approval of connect and signing requests
    pub fn set_approvals(&self, connect: Option<bool>, sign: Option<bool>) -> (bool, bool) {
        let mut state = self.lock();
        if let Some(connect) = connect {
            state.approve_connect = connect;
        }
        if let Some(sign) = sign {
            state.approve_sign = sign;
        }
        (state.approve_connect, state.approve_sign)
    }

    pub fn set_gas_price(&self, gas_price: u128) {
        self.lock().gas_price = gas_price;
    }

    pub fn set_mining(&self, mining: MiningMode) {
        self.lock().mining = mining;
    }

    /// Drop the user's authorization, as a wallet does on disconnect
    pub fn revoke_authorization(&self) {
        self.lock().authorized = false;
    }

    pub fn balance(&self) -> U256 {
        self.lock().balance
    }

    pub fn block_number(&self) -> u64 {
        self.lock().block_number
    }

    /// Number of times `method` was called
    pub fn call_count(&self, method: &str) -> usize {
        self.lock().calls.get(method).copied().unwrap_or(0)
    }

    pub fn submitted(&self) -> Vec<SubmittedTransaction> {
        self.lock().submitted.clone()
    }
}

fn mine_one(state: &mut NodeState, contract: Address, hash: B256) {
    state.pending.retain(|p| p.hash != hash);
    let Some(tx) = state.unmined.remove(&hash) else {
        return;
    };
    state.block_number += 1;

    let receipt = Receipt {
        status: true.into(),
        cumulative_gas_used: u128::from(tx.gas_used),
        logs: vec![],
    };
    let block_hash = keccak256(state.block_number.to_be_bytes());
    state.receipts.insert(
        hash,
        TransactionReceipt {
            inner: ReceiptEnvelope::Legacy(ReceiptWithBloom {
                receipt,
                logs_bloom: Bloom::ZERO,
            }),
            transaction_hash: hash,
            transaction_index: Some(0),
            block_hash: Some(block_hash),
            block_number: Some(state.block_number),
            gas_used: u128::from(tx.gas_used),
            effective_gas_price: tx.gas_price,
            blob_gas_used: None,
            blob_gas_price: None,
            from: tx.from,
            to: Some(contract),
            contract_address: None,
            authorization_list: None,
        },
    );
}

fn transaction_param(params: &Value) -> Result<TransactionRequest, RpcError> {
    let raw = params
        .get(0)
        .cloned()
        .ok_or_else(|| RpcError::invalid_params("missing transaction object"))?;
    serde_json::from_value(raw)
        .map_err(|e| RpcError::invalid_params(format!("transaction object: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(mining: MiningMode) -> MockNode {
        MockNode::new(NodeConfig {
            initial_balance: U256::from(50),
            mining,
            ..Default::default()
        })
    }

    fn tx(node: &MockNode, data: Vec<u8>) -> Value {
        let request = TransactionRequest::default()
            .from(node.config().account)
            .to(node.config().contract)
            .input(Bytes::from(data).into())
            .gas_limit(100_000)
            .gas_price(node.config().gas_price);
        json!([request])
    }

    fn revert_data(err: RpcError) -> Bytes {
        serde_json::from_value(err.data.unwrap()).unwrap()
    }

    fn connect(node: &MockNode) {
        node.dispatch("eth_requestAccounts", &json!([])).unwrap();
    }

    #[test]
    fn test_accounts_require_authorization() {
        let node = node(MiningMode::AfterPolls(0));
        assert_eq!(node.dispatch("eth_accounts", &json!([])).unwrap(), json!([]));

        node.set_approvals(Some(false), None);
        let err = node.dispatch("eth_requestAccounts", &json!([])).unwrap_err();
        assert_eq!(err.code, USER_REJECTED);

        node.set_approvals(Some(true), None);
        connect(&node);
        assert_eq!(
            node.dispatch("eth_accounts", &json!([])).unwrap(),
            json!([node.config().account])
        );
    }

    #[test]
    fn test_get_balance_call() {
        let node = node(MiningMode::AfterPolls(0));
        let request = TransactionRequest::default()
            .to(node.config().contract)
            .input(Bytes::from(ILedger::getBalanceCall {}.abi_encode()).into());
        let result = node
            .dispatch("eth_call", &json!([request, "latest"]))
            .unwrap();
        let bytes: Bytes = serde_json::from_value(result).unwrap();
        let balance = ILedger::getBalanceCall::abi_decode_returns(&bytes, true).unwrap()._0;
        assert_eq!(balance, U256::from(50));
    }

    #[test]
    fn test_deposit_then_receipt() {
        let node = node(MiningMode::AfterPolls(2));
        connect(&node);

        let data = ILedger::depositCall {
            _amount: U256::from(25),
        }
        .abi_encode();
        let hash = node.dispatch("eth_sendTransaction", &tx(&node, data)).unwrap();
        assert_eq!(node.balance(), U256::from(75));

        assert_eq!(
            node.dispatch("eth_getTransactionReceipt", &json!([hash.clone()])).unwrap(),
            Value::Null
        );
        let receipt: TransactionReceipt = serde_json::from_value(
            node.dispatch("eth_getTransactionReceipt", &json!([hash])).unwrap(),
        )
        .unwrap();
        assert!(receipt.status());
        assert_eq!(receipt.block_number, Some(node.block_number()));
        assert_eq!(receipt.to, Some(node.config().contract));
        assert_eq!(node.call_count("eth_getTransactionReceipt"), 2);
    }

    #[test]
    fn test_withdraw_beyond_balance_reverts() {
        let node = node(MiningMode::AfterPolls(0));
        connect(&node);

        let data = ILedger::withdrawCall {
            _withdrawAmount: U256::from(80),
        }
        .abi_encode();
        let err = node
            .dispatch("eth_sendTransaction", &tx(&node, data))
            .unwrap_err();
        assert_eq!(err.code, EXECUTION_REVERTED);

        let revert = revert_data(err);
        let decoded = ILedger::InsufficientBalance::abi_decode(&revert, true).unwrap();
        assert_eq!(decoded.balance, U256::from(50));
        assert_eq!(decoded.withdrawAmount, U256::from(80));
        assert_eq!(node.balance(), U256::from(50));
        assert!(node.submitted().is_empty());
    }

    #[test]
    fn test_signing_rejection_and_stale_gas_price() {
        let node = node(MiningMode::AfterPolls(0));
        connect(&node);
        let data = ILedger::depositCall {
            _amount: U256::from(1),
        }
        .abi_encode();

        node.set_approvals(None, Some(false));
        let err = node
            .dispatch("eth_sendTransaction", &tx(&node, data.clone()))
            .unwrap_err();
        assert_eq!(err.code, USER_REJECTED);

        node.set_approvals(None, Some(true));
        node.set_gas_price(node.config().gas_price * 2);
        let err = node
            .dispatch("eth_sendTransaction", &tx(&node, data))
            .unwrap_err();
        assert!(err.message.contains("underpriced"));
        assert_eq!(node.balance(), U256::from(50));
    }

    #[test]
    fn test_unauthorized_sender_is_refused() {
        let node = node(MiningMode::AfterPolls(0));
        let data = ILedger::depositCall {
            _amount: U256::from(1),
        }
        .abi_encode();
        let err = node
            .dispatch("eth_sendTransaction", &tx(&node, data))
            .unwrap_err();
        assert_eq!(err.code, UNAUTHORIZED);
    }

    #[test]
    fn test_only_owner_may_mutate() {
        let node = MockNode::new(NodeConfig {
            account: Address::repeat_byte(0x22),
            ..Default::default()
        });
        connect(&node);
        let data = ILedger::depositCall {
            _amount: U256::from(1),
        }
        .abi_encode();
        let err = node
            .dispatch("eth_sendTransaction", &tx(&node, data))
            .unwrap_err();
        assert_eq!(err.code, EXECUTION_REVERTED);

        let revert = revert_data(err);
        assert_eq!(
            Revert::abi_decode(&revert, true).unwrap().reason,
            "You are not the owner of this account"
        );
    }

    #[test]
    fn test_manual_mining() {
        let node = node(MiningMode::Manual);
        connect(&node);
        let data = ILedger::depositCall {
            _amount: U256::from(5),
        }
        .abi_encode();
        let hash = node.dispatch("eth_sendTransaction", &tx(&node, data)).unwrap();

        for _ in 0..5 {
            assert_eq!(
                node.dispatch("eth_getTransactionReceipt", &json!([hash.clone()])).unwrap(),
                Value::Null
            );
        }
        let before = node.block_number();
        assert_eq!(node.mine(None).len(), 1);
        assert_eq!(node.block_number(), before + 1);
        assert!(!node
            .dispatch("eth_getTransactionReceipt", &json!([hash]))
            .unwrap()
            .is_null());
    }

    #[test]
    fn test_unknown_method() {
        let node = node(MiningMode::AfterPolls(0));
        let err = node.dispatch("eth_mining", &json!([])).unwrap_err();
        assert_eq!(err.code, METHOD_NOT_FOUND);
    }
}
