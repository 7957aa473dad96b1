/// Axum HTTP handlers for the JSON-RPC endpoint and mock controls

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::node::MockNode;
use crate::types::*;

/// Shared application state
pub type AppState = Arc<MockNode>;

/// Custom error type for handlers
pub enum ApiError {
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        (status, message).into_response()
    }
}

/// POST /
/// Dispatches one JSON-RPC 2.0 request to the node
pub async fn json_rpc(
    State(node): State<AppState>,
    body: String,
) -> Result<Json<JsonRpcResponse>, ApiError> {
    let request: JsonRpcRequest = serde_json::from_str(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON-RPC request: {}", e)))?;

    if let Some(version) = request.jsonrpc.as_deref() {
        if version != "2.0" {
            return Err(ApiError::BadRequest(format!(
                "Unsupported JSON-RPC version: {}",
                version
            )));
        }
    }

    let outcome = node.dispatch(&request.method, &request.params);
    Ok(Json(JsonRpcResponse::from_outcome(request.id, outcome)))
}

// ============================================================================
// MOCK CONTROL ENDPOINTS (not part of the JSON-RPC surface)
// ============================================================================

/// POST /mock/mine
/// Mine pending transactions so their receipts become available
pub async fn mine(
    State(node): State<AppState>,
    Json(req): Json<MineRequest>,
) -> Json<MineResponse> {
    let mined = node.mine(req.count);
    Json(MineResponse {
        mined,
        block_number: node.block_number(),
    })
}

/// POST /mock/approvals
/// Switch whether the simulated user approves connect and signing requests
pub async fn set_approvals(
    State(node): State<AppState>,
    Json(req): Json<ApprovalsRequest>,
) -> Json<ApprovalsResponse> {
    let (connect, sign) = node.set_approvals(req.connect, req.sign);
    log::info!("🔧 Approvals: connect={} sign={}", connect, sign);
    Json(ApprovalsResponse { connect, sign })
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}
