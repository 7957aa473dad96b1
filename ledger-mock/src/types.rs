/// JSON-RPC wire types
///
/// Envelopes follow JSON-RPC 2.0 so any wallet client can consume them
/// transparently.
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::node::RpcError;

/// Request envelope accepted on `POST /`
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Response envelope; exactly one of `result`/`error` is present
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl JsonRpcResponse {
    pub fn from_outcome(id: Value, outcome: Result<Value, RpcError>) -> Self {
        match outcome {
            Ok(result) => Self {
                jsonrpc: "2.0",
                id,
                result: Some(result),
                error: None,
            },
            Err(error) => Self {
                jsonrpc: "2.0",
                id,
                result: None,
                error: Some(error),
            },
        }
    }
}

/// A submitted ledger call, recorded for inspection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedTransaction {
    pub hash: B256,
    pub from: Address,
    pub method: String,
    pub amount: U256,
    pub gas: u64,
    pub gas_price: u128,
}

// ============================================================================
// MOCK CONTROL ENDPOINTS (not part of the JSON-RPC surface)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct MineRequest {
    /// Mine only this many pending transactions (all when absent)
    #[serde(default)]
    pub count: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MineResponse {
    pub mined: Vec<B256>,
    pub block_number: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApprovalsRequest {
    /// Whether account authorization requests are approved
    #[serde(default)]
    pub connect: Option<bool>,
    /// Whether signing requests are approved
    #[serde(default)]
    pub sign: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ApprovalsResponse {
    pub connect: bool,
    pub sign: bool,
}
