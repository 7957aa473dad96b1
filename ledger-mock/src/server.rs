/// Axum HTTP server setup and routing

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::*;
use crate::node::MockNode;

pub fn create_router(node: Arc<MockNode>) -> Router {
    // Browser wallets call the node cross-origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // JSON-RPC
        .route("/", post(json_rpc))

        // Health check
        .route("/health", get(health_check))

        // Mock control endpoints
        .route("/mock/mine", post(mine))
        .route("/mock/approvals", post(set_approvals))

        // Shared state
        .with_state(node)

        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Serve on an already bound listener
pub async fn serve(listener: TcpListener, node: Arc<MockNode>) -> anyhow::Result<()> {
    axum::serve(listener, create_router(node)).await?;
    Ok(())
}

pub async fn run_server(node: Arc<MockNode>, host: String, port: u16) -> anyhow::Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await?;

    log::info!("🚀 Ledger mock node listening on http://{}", addr);
    log::info!("📜 Ledger contract at {}", node.config().contract);
    log::info!("🔨 Mining endpoint: POST /mock/mine");

    serve(listener, node).await
}
