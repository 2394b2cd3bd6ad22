//! Inkwell HTTP API
//!
//! Axum server exposing the chat relay and the writing tools over HTTP.
//!
//! Each JSON endpoint has a thin axum handler that delegates to an inner
//! function returning `(StatusCode, serde_json::Value)`, testable without
//! axum dispatch.
//!
//! Endpoints:
//! - GET  /health   health check with relay and assistant status
//! - GET  /version  server version info
//! - POST /seo      score a draft against the SEO rules
//! - POST /assist   AI writing suggestions
//! - GET  /chat     WebSocket upgrade into the chat relay

use std::sync::Arc;

use anyhow::Result;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use inkwell_core::seo::{self, SeoInput};
use inkwell_core::{InkwellConfig, SuggestionBackend, SuggestionRequest, SuggestionResponse};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

use crate::subsystems::assist;
use crate::subsystems::relay::{ConnectionId, RelayHandle};

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub config: InkwellConfig,
    pub relay: RelayHandle,
    pub assistant: Option<Arc<dyn SuggestionBackend>>,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/seo", post(seo_handler))
        .route("/assist", post(assist_handler))
        .route("/chat", get(chat_handler))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(state: HttpState, shutdown: broadcast::Receiver<()>) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Inkwell HTTP API listening on http://{}", addr);

    serve(listener, state, shutdown).await
}

/// Serve on an already-bound listener.
pub async fn serve(listener: TcpListener, state: HttpState, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
    let app = build_router(Arc::new(state));

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChatQuery {
    pub collaboration_id: Option<String>,
}

fn error_body(message: impl Into<String>) -> serde_json::Value {
    serde_json::json!({ "error": message.into() })
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health check: reports which optional services are wired up.
pub fn health_inner(state: &HttpState) -> (StatusCode, serde_json::Value) {
    (
        StatusCode::OK,
        serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "relay_scope": state.config.relay.scope,
            "assistant": state.assistant.as_ref().map(|a| a.name().to_string()),
        }),
    )
}

/// Inner version: returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "inkwell/1",
    })
}

/// Inner SEO check: pure scoring, never fails.
pub fn seo_inner(input: SeoInput) -> (StatusCode, serde_json::Value) {
    let report = seo::score(&input);
    match serde_json::to_value(&report) {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())),
    }
}

/// Inner assist: validates the payload and runs the backend.
///
/// Contract failures come back as `{ "error": ... }` so clients can fall
/// back to "no suggestions".
pub async fn assist_inner(
    backend: Option<&dyn SuggestionBackend>,
    payload: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request: SuggestionRequest = match serde_json::from_value(payload) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "Rejecting assist request");
            return (StatusCode::BAD_REQUEST, error_body(format!("Invalid request: {}", e)));
        }
    };

    let Some(backend) = backend else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_body("AI service not configured. Set OPENAI_API_KEY for the server."),
        );
    };

    let response = assist::run_suggestions(backend, &request).await;
    let status = match response {
        SuggestionResponse::Suggestions { .. } => StatusCode::OK,
        SuggestionResponse::Error { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    match serde_json::to_value(&response) {
        Ok(body) => (status, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())),
    }
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state);
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn seo_handler(Json(input): Json<SeoInput>) -> impl IntoResponse {
    let (status, body) = seo_inner(input);
    (status, Json(body))
}

pub async fn assist_handler(
    State(state): State<Arc<HttpState>>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    let (status, body) = assist_inner(state.assistant.as_deref(), payload).await;
    (status, Json(body))
}

pub async fn chat_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<ChatQuery>,
    State(state): State<Arc<HttpState>>,
) -> impl IntoResponse {
    let relay = state.relay.clone();
    ws.on_upgrade(move |socket| handle_chat_socket(socket, relay, query.collaboration_id))
}

// ============================================================================
// WebSocket bridge
// ============================================================================

/// Pump frames between one socket and the relay until either side closes.
async fn handle_chat_socket(socket: WebSocket, relay: RelayHandle, room: Option<String>) {
    let (id, mut outbound) = match relay.join(room).await {
        Ok(joined) => joined,
        Err(e) => {
            tracing::warn!(error = %e, "Refusing chat connection");
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if sink.send(Message::Text(frame.to_json())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(incoming) = stream.next().await {
        let text = match incoming {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(connection = %id, error = %e, "Chat socket error");
                break;
            }
        };
        if forward(&relay, id, text).await.is_err() {
            break;
        }
    }

    relay.leave(id).await;
    writer.abort();
}

async fn forward(relay: &RelayHandle, id: ConnectionId, text: String) -> Result<()> {
    relay.send(id, text).await?;
    Ok(())
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================
