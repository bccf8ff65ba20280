//! REST API for the memory context manager
//!
//! Lets framework adapters written in any language fetch context before a
//! turn and store results after it, over plain JSON.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::memory::{MemoryContextManager, RawMessage};
use crate::models::ContextOptions;

const DEFAULT_SEARCH_RESULTS: usize = 10;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ContextRequest {
    #[serde(default)]
    pub prompt: String,
    pub actor_id: Option<String>,
    pub session_id: Option<String>,
    pub load_history: Option<bool>,
    pub load_relevant: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ConversationRequest {
    pub user_input: String,
    pub response: String,
    pub actor_id: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessagesRequest {
    pub messages: Vec<Value>,
    pub actor_id: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FactsRequest {
    pub facts: Vec<String>,
    pub actor_id: Option<String>,
    pub session_id: Option<String>,
    pub metadata: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub actor_id: Option<String>,
    pub max_results: Option<usize>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub manager: Arc<MemoryContextManager>,
}

/// =============================
/// Health & Stats
/// =============================

async fn health() -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn stats(State(state): State<ApiState>) -> Json<ApiResponse> {
    Json(ApiResponse::success(state.manager.statistics().await))
}

/// =============================
/// Read Path
/// =============================

async fn context_handler(
    State(state): State<ApiState>,
    Json(req): Json<ContextRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let defaults = ContextOptions::default();
    let options = ContextOptions {
        load_history: req.load_history.unwrap_or(defaults.load_history),
        load_relevant: req.load_relevant.unwrap_or(defaults.load_relevant),
    };

    let context = state
        .manager
        .get_context_with(
            &req.prompt,
            req.actor_id.as_deref(),
            req.session_id.as_deref(),
            options,
        )
        .await;

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "has_context": !context.is_empty(),
            "context": context,
        }))),
    )
}

async fn search_handler(
    State(state): State<ApiState>,
    Json(req): Json<SearchRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    if req.query.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("query must not be empty".into())),
        );
    }

    let result = state
        .manager
        .search_memories(
            &req.query,
            req.actor_id.as_deref(),
            req.max_results.unwrap_or(DEFAULT_SEARCH_RESULTS),
        )
        .await;

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({ "result": result }))),
    )
}

/// =============================
/// Write Path
/// =============================

async fn conversation_handler(
    State(state): State<ApiState>,
    Json(req): Json<ConversationRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    info!(
        "Storing conversation => actor_id={:?} session_id={:?}",
        req.actor_id, req.session_id
    );

    let stored = state
        .manager
        .store_conversation(
            &req.user_input,
            &req.response,
            req.actor_id.as_deref(),
            req.session_id.as_deref(),
        )
        .await;

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({ "stored": stored }))),
    )
}

async fn messages_handler(
    State(state): State<ApiState>,
    Json(req): Json<MessagesRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let raw: Vec<RawMessage> = req
        .messages
        .into_iter()
        .map(RawMessage::from_json)
        .collect();

    let outcome = state
        .manager
        .store_message_batch(&raw, req.actor_id.as_deref(), req.session_id.as_deref())
        .await;

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "stored": outcome.stored,
            "received": raw.len(),
            "normalized": outcome.normalized,
        }))),
    )
}

async fn facts_handler(
    State(state): State<ApiState>,
    Json(req): Json<FactsRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let stored = state
        .manager
        .store_facts(
            &req.facts,
            req.actor_id.as_deref(),
            req.session_id.as_deref(),
            req.metadata.as_ref(),
        )
        .await;

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "stored": stored,
            "count": req.facts.len(),
        }))),
    )
}

/// =============================
/// Router
/// =============================

pub fn create_router(manager: Arc<MemoryContextManager>) -> Router {
    let state = ApiState { manager };

    Router::new()
        .route("/health", get(health))
        .route("/api/memory/stats", get(stats))
        .route("/api/memory/context", post(context_handler))
        .route("/api/memory/search", post(search_handler))
        .route("/api/memory/conversations", post(conversation_handler))
        .route("/api/memory/messages", post(messages_handler))
        .route("/api/memory/facts", post(facts_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    manager: Arc<MemoryContextManager>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(manager);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("Memory API listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
