//! Wallet provider capability
//!
//! A wallet is reached through a single EIP-1193 style entry point:
//! `request(method, params) -> result`. Account authorization, fee-rate
//! lookup, contract reads and signed submissions all go through it.
//!
//! [`HttpWalletProvider`] speaks JSON-RPC 2.0 over HTTP to a node or wallet
//! daemon that holds the signing key.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::error::FailureCause;

/// EIP-1193: the user rejected the request
pub const USER_REJECTED: i64 = 4001;

/// Transport-level failure from a wallet provider
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("JSON-RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, Self::Rpc { code, .. } if *code == USER_REJECTED)
    }

    /// Hex-encoded revert data attached to an RPC error, if any
    pub fn revert_data(&self) -> Option<&str> {
        match self {
            Self::Rpc {
                data: Some(Value::String(data)),
                ..
            } => Some(data.as_str()),
            Self::Rpc {
                data: Some(Value::Object(obj)),
                ..
            } => obj.get("data").and_then(Value::as_str),
            _ => None,
        }
    }
}

impl From<ProviderError> for FailureCause {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Rpc { code, message, .. } if code == USER_REJECTED => {
                FailureCause::SigningRejected(message)
            }
            ProviderError::Rpc { code, message, .. } => FailureCause::Rpc { code, message },
            ProviderError::Transport(msg) => FailureCause::Network(msg),
            ProviderError::Malformed(msg) => FailureCause::Malformed(msg),
        }
    }
}

/// The wallet capability: one request entry point
pub trait WalletProvider: Clone {
    fn request(
        &self,
        method: &str,
        params: Value,
    ) -> impl Future<Output = Result<Value, ProviderError>>;
}

/// The host environment a wallet may be discovered in
pub trait WalletHost {
    type Provider: WalletProvider;

    /// Look for a wallet capability; `None` when the host exposes none
    fn detect(&self) -> impl Future<Output = Option<Self::Provider>>;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl JsonRpcResponse {
    fn into_result(self) -> Result<Value, ProviderError> {
        match (self.error, self.result) {
            (Some(err), _) => Err(ProviderError::Rpc {
                code: err.code,
                message: err.message,
                data: err.data,
            }),
            (None, Some(result)) => Ok(result),
            // `null` results deserialize to None, e.g. a receipt that is not yet available
            (None, None) => Ok(Value::Null),
        }
    }
}

/// JSON-RPC 2.0 wallet provider over HTTP
///
/// Cheap to clone: the reqwest client and request counter are shared.
#[derive(Clone, Debug)]
pub struct HttpWalletProvider {
    url: String,
    http_client: reqwest::Client,
    next_id: Arc<AtomicU64>,
}

impl HttpWalletProvider {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ProviderError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            http_client,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }
}

impl WalletProvider for HttpWalletProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        log::debug!("   ➡️  JSON-RPC #{} {} {}", id, method, body.params);

        let response = self
            .http_client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Transport(format!("HTTP {}", response.status())));
        }

        let envelope: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("Invalid JSON-RPC response: {}", e)))?;
        envelope.into_result()
    }
}

/// Host that looks for a wallet daemon at a fixed URL
#[derive(Clone, Debug)]
pub struct HttpWalletHost {
    url: String,
    request_timeout: Duration,
}

impl HttpWalletHost {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            request_timeout,
        }
    }
}

impl WalletHost for HttpWalletHost {
    type Provider = HttpWalletProvider;

    /// A wallet is present when the endpoint answers `eth_chainId`
    async fn detect(&self) -> Option<HttpWalletProvider> {
        let provider = match HttpWalletProvider::new(self.url.clone(), self.request_timeout) {
            Ok(provider) => provider,
            Err(e) => {
                log::warn!("⚠️  Wallet provider unusable: {}", e);
                return None;
            }
        };

        match provider.request("eth_chainId", json!([])).await {
            Ok(chain_id) => {
                log::info!("🔌 Wallet provider detected at {} (chain {})", self.url, chain_id);
                Some(provider)
            }
            Err(e) => {
                log::warn!("⚠️  No wallet provider at {}: {}", self.url, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_error_wins_over_result() {
        let response: JsonRpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": 4001, "message": "User rejected the request."}
        }))
        .unwrap();
        let err = response.into_result().unwrap_err();
        assert!(err.is_user_rejection());
    }

    #[test]
    fn test_null_result_is_value_null() {
        let response: JsonRpcResponse =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 7, "result": null})).unwrap();
        assert_eq!(response.into_result().unwrap(), Value::Null);
    }

    #[test]
    fn test_revert_data_from_string_or_object() {
        let flat = ProviderError::Rpc {
            code: 3,
            message: "execution reverted".into(),
            data: Some(json!("0xdeadbeef")),
        };
        assert_eq!(flat.revert_data(), Some("0xdeadbeef"));

        let nested = ProviderError::Rpc {
            code: -32603,
            message: "Internal error".into(),
            data: Some(json!({"message": "reverted", "data": "0xcafe"})),
        };
        assert_eq!(nested.revert_data(), Some("0xcafe"));

        assert_eq!(ProviderError::Transport("down".into()).revert_data(), None);
    }

    #[test]
    fn test_failure_cause_mapping() {
        let rejected = ProviderError::Rpc {
            code: USER_REJECTED,
            message: "User denied transaction signature.".into(),
            data: None,
        };
        assert_eq!(
            FailureCause::from(rejected),
            FailureCause::SigningRejected("User denied transaction signature.".into())
        );
        assert_eq!(
            FailureCause::from(ProviderError::Transport("refused".into())),
            FailureCause::Network("refused".into())
        );
    }
}
