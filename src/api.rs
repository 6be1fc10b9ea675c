//! JSON HTTP API for a TallyChain node
//!
//! Thin routing over [`Node`]: every handler calls one node operation and
//! serializes its result. `GET /chain` is also what peers poll during
//! consensus.

use axum::{
    extract::{Path, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::error::ChainError;
use crate::network::ChainResponse;
use crate::node::{MineOutcome, Node};
use crate::transaction::Transaction;

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Chain(ChainError),
    InvalidInput(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Chain(e) => {
                let status = match &e {
                    ChainError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
                    ChainError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
                    ChainError::InvalidTransaction(_) | ChainError::InvalidFaultMode(_) => StatusCode::BAD_REQUEST,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string())
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::Chain(err)
    }
}

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterPeersRequest {
    pub nodes: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct FaultRequest {
    pub mode: Option<String>,
}

#[derive(Debug, Serialize)]
struct TransactionList {
    transactions: Vec<Transaction>,
    count: usize,
}

impl From<Vec<Transaction>> for TransactionList {
    fn from(transactions: Vec<Transaction>) -> Self {
        let count = transactions.len();
        TransactionList { transactions, count }
    }
}

fn require_text(body: TextRequest) -> Result<String, ApiError> {
    body.text
        .ok_or_else(|| ApiError::InvalidInput("Missing text field".to_string()))
}

// ============================================================================
// Middleware
// ============================================================================

/// Logs method, path, status and duration of every request.
async fn logging_middleware(State(node): State<Arc<Node>>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    tracing::info!(
        node = %node.id(),
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the router with every endpoint.
pub fn build_api_router(node: Arc<Node>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::PUT,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE]);

    Router::new()
        // Ledger endpoints
        .route("/chain", get(get_chain))
        .route("/mine", get(mine))
        // Transaction endpoints
        .route("/transactions/new", post(new_transaction))
        .route("/transactions/pending", get(pending_transactions))
        .route("/transactions/all", get(all_transactions))
        .route("/transactions/:id", put(update_transaction))
        // Peer endpoints
        .route("/nodes/register", post(register_nodes))
        .route("/nodes", get(list_nodes))
        .route("/nodes/resolve", get(resolve_conflicts))
        // Fault injection
        .route("/faults", post(set_fault_mode))
        // System endpoints
        .route("/health", get(health_check))
        .layer(middleware::from_fn_with_state(node.clone(), logging_middleware))
        .with_state(node)
        .layer(cors)
}

/// Serve the API until `shutdown` resolves.
pub async fn run_api_server(
    node: Arc<Node>,
    port: u16,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), ChainError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(node = %node.id(), %addr, "api.listening");

    axum::serve(listener, build_api_router(node))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

async fn get_chain(State(node): State<Arc<Node>>) -> Result<Json<ChainResponse>, ApiError> {
    let chain = node.get_chain().await?;
    Ok(Json(ChainResponse::new(chain)))
}

async fn mine(State(node): State<Arc<Node>>) -> Result<Response, ApiError> {
    let response = match node.mine_now().await? {
        MineOutcome::Mined(block) => Json(serde_json::json!({
            "message": "New Block Forged",
            "index": block.index,
            "transactions": block.transactions,
            "proof": block.proof,
            "previous_hash": block.previous_hash,
        }))
        .into_response(),
        MineOutcome::NothingToMine => Json(serde_json::json!({
            "message": "No transactions to mine"
        }))
        .into_response(),
        MineOutcome::Stale => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "message": "Chain advanced while mining; transactions stay pending"
            })),
        )
            .into_response(),
    };
    Ok(response)
}

async fn new_transaction(
    State(node): State<Arc<Node>>,
    Json(body): Json<TextRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let text = require_text(body)?;
    let tx_id = node.submit_transaction(text).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Transaction added to mempool",
            "tx_id": tx_id,
        })),
    ))
}

async fn pending_transactions(State(node): State<Arc<Node>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(TransactionList::from(node.list_pending().await?)))
}

async fn all_transactions(State(node): State<Arc<Node>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(TransactionList::from(node.list_all().await?)))
}

async fn update_transaction(
    State(node): State<Arc<Node>>,
    Path(id): Path<String>,
    Json(body): Json<TextRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let text = require_text(body)?;
    let transaction = node.update_transaction(&id, text).await?;
    Ok(Json(serde_json::json!({
        "message": "Transaction updated",
        "transaction": transaction,
    })))
}

async fn register_nodes(
    State(node): State<Arc<Node>>,
    Json(body): Json<RegisterPeersRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let nodes = body
        .nodes
        .ok_or_else(|| ApiError::InvalidInput("Missing nodes field".to_string()))?;
    let total_nodes = node.register_peers(&nodes[..]).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "New nodes have been added",
            "total_nodes": total_nodes,
        })),
    ))
}

async fn list_nodes(State(node): State<Arc<Node>>) -> Result<impl IntoResponse, ApiError> {
    let peers = node.list_peers().await?;
    let nodes: Vec<&str> = peers.iter().map(|p| p.peer.as_str()).collect();
    let reliability_scores: serde_json::Map<String, serde_json::Value> = peers
        .iter()
        .map(|p| (p.peer.clone(), serde_json::json!(p.record)))
        .collect();
    Ok(Json(serde_json::json!({
        "nodes": nodes,
        "reliability_scores": reliability_scores,
    })))
}

async fn resolve_conflicts(State(node): State<Arc<Node>>) -> Result<impl IntoResponse, ApiError> {
    let report = node.run_consensus_once().await?;
    let message = if report.outcome.replaced {
        "Our chain was replaced"
    } else {
        "Our chain is authoritative"
    };
    Ok(Json(serde_json::json!({
        "message": message,
        "replaced": report.outcome.replaced,
        "adopted_from": report.outcome.adopted_from,
        "chain": report.chain,
    })))
}

async fn set_fault_mode(
    State(node): State<Arc<Node>>,
    Json(body): Json<FaultRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mode = body
        .mode
        .ok_or_else(|| ApiError::InvalidInput("Missing mode field".to_string()))?;
    let mode = node.set_fault_mode(&mode).await?;
    Ok(Json(serde_json::json!({
        "message": format!("Fault mode set to {}", mode),
        "mode": mode,
    })))
}

async fn health_check(State(node): State<Arc<Node>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "node_id": node.id(),
        "fault_mode": node.fault_mode().await,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
